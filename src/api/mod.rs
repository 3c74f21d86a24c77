// Browser-facing HTTP routes

pub mod auth;
pub mod error;
pub mod proxy;
pub mod session_gate;

pub use auth::{create_auth_router, AuthAppState};
pub use error::AppError;
pub use proxy::{create_proxy_router, ProxyAppState};
pub use session_gate::{require_session, SessionGate, SessionIdentity};
