//! Session gate for proxy routes.
//!
//! Allows a request only when it carries a live session marker. Whether the
//! server holds Spotify credentials is a separate question answered by the
//! token manager; a browser without a session is refused even if tokens
//! exist.

use crate::api::error::AppError;
use crate::error::AuthError;
use crate::session::{SessionCookie, SessionStore};
use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::Response,
};
use tracing::debug;

/// Identity the caller's session is bound to. Inserted into request
/// extensions for downstream handlers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionIdentity(pub String);

#[derive(Clone)]
pub struct SessionGate {
    sessions: SessionStore,
    cookie: SessionCookie,
}

impl SessionGate {
    pub fn new(sessions: SessionStore, cookie: SessionCookie) -> Self {
        Self { sessions, cookie }
    }

    /// Resolve the caller's session.
    ///
    /// # Errors
    /// `NotAuthorized` when the cookie is missing or names no live session.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<SessionIdentity, AuthError> {
        let session_id = self
            .cookie
            .session_id(headers)
            .ok_or(AuthError::NotAuthorized)?;

        self.sessions
            .identity_for(&session_id)
            .map(SessionIdentity)
            .ok_or(AuthError::NotAuthorized)
    }
}

/// Middleware: 403 unless the request has a session marker.
pub async fn require_session(
    State(gate): State<SessionGate>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = gate.authorize(request.headers()).map_err(|e| {
        debug!(path = %request.uri().path(), "Rejected request without session");
        AppError::from(e)
    })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
