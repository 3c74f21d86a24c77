//! Error taxonomy for the auth/proxy core.
//!
//! `AuthError` is what the token, OAuth and proxy layers return. The HTTP
//! layer converts it into a status code and a `{ "error": ... }` body.
//! Upstream non-2xx responses are not errors here: the proxy relays them as-is.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// No usable credential record for the identity
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Caller has no valid session marker
    #[error("Not authorized")]
    NotAuthorized,

    /// Provider sent `error` back on the callback
    #[error("Spotify auth error: {0}")]
    AuthorizationDenied(String),

    /// Token endpoint rejected the authorization code
    #[error("Spotify authentication failed: {0}")]
    CodeExchangeFailed(String),

    /// Token endpoint rejected the refresh token
    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    /// Transport failure talking to the resource API
    #[error("Spotify API error: {0}")]
    Upstream(String),

    #[error("Credential storage error: {0}")]
    Storage(String),
}
