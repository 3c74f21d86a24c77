//! Spotify OAuth 2.0 authorization code flow, provider side.
//!
//! The browser-facing routes live in `api::auth`; this module holds the
//! pieces they drive:
//! - provider endpoints, scopes and the authorize URL
//! - the token endpoint client (code exchange and refresh)
//! - CSRF `state` nonces and the consumed-code replay guard

mod exchange;
mod provider;
mod state_manager;
mod used_codes;

pub use exchange::{TokenClient, TokenGrant};
pub use provider::{OAuthProviderConfig, SPOTIFY_SCOPES};
pub use state_manager::StateManager;
pub use used_codes::UsedCodes;

/// Shortens a code or state for log output.
pub(crate) fn log_prefix(value: &str) -> String {
    let prefix: String = value.chars().take(6).collect();
    format!("{}…", prefix)
}
