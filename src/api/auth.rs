//! Browser-facing OAuth routes.
//!
//! Implements the authorization code flow:
//! 1. Dashboard sends the browser to GET /auth/login → 302 to Spotify
//! 2. User consents on Spotify
//! 3. Spotify redirects to GET /callback?code=...&state=...
//! 4. Code is exchanged once, credentials stored, session cookie issued
//! 5. Browser lands back on the dashboard origin
//!
//! Plus GET /auth/status and POST /auth/logout for the dashboard to poll and
//! sign out.

use crate::api::error::AppError;
use crate::credentials::CredentialStore;
use crate::error::AuthError;
use crate::oauth::{log_prefix, OAuthProviderConfig, StateManager, TokenClient, UsedCodes};
use crate::session::{SessionCookie, SessionStore};
use axum::{
    extract::{OriginalUri, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Shared application state for auth routes
#[derive(Clone)]
pub struct AuthAppState {
    /// Identity this deployment authorizes
    pub identity: String,
    pub frontend_origin: String,
    pub provider: Arc<OAuthProviderConfig>,
    pub token_client: TokenClient,
    pub credential_store: Arc<dyn CredentialStore>,
    pub sessions: SessionStore,
    pub session_cookie: SessionCookie,
    pub state_manager: StateManager,
    pub used_codes: UsedCodes,
}

impl AuthAppState {
    fn session_identity(&self, headers: &HeaderMap) -> Option<String> {
        self.session_cookie
            .session_id(headers)
            .and_then(|sid| self.sessions.identity_for(&sid))
    }

    fn has_refresh_token(&self, identity: &str) -> bool {
        self.credential_store
            .load(identity)
            .is_some_and(|creds| creds.refresh_token.is_some())
    }

    /// Replaces any session the browser already had with a fresh one.
    /// Returns the `Set-Cookie` value.
    fn open_session(&self, headers: &HeaderMap) -> String {
        if let Some(previous) = self.session_cookie.session_id(headers) {
            self.sessions.destroy(&previous);
        }
        let session_id = self.sessions.create(&self.identity);
        self.session_cookie.issue(&session_id)
    }
}

/// OAuth callback query parameters
#[derive(Deserialize)]
pub struct OAuthCallback {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Serialize)]
pub struct AuthStatus {
    pub authed: bool,
}

#[derive(Serialize)]
pub struct LogoutResponse {
    pub ok: bool,
}

/// Create auth router
pub fn create_auth_router(state: AuthAppState) -> Router {
    Router::new()
        .route("/auth/login", get(login))
        .route("/callback", get(callback))
        .route("/auth/status", get(status))
        .route("/auth/logout", post(logout))
        // Dashboard builds that prefixed API paths with the callback path
        .route("/callback/api/*rest", get(strip_callback_prefix))
        .route("/callback/auth/*rest", get(strip_callback_prefix))
        .with_state(Arc::new(state))
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

fn found_with_cookie(location: &str, set_cookie: String) -> Response {
    (
        StatusCode::FOUND,
        [
            (header::LOCATION, location.to_string()),
            (header::SET_COOKIE, set_cookie),
        ],
    )
        .into_response()
}

/// GET /auth/login
///
/// Redirects to Spotify's authorize page with a fresh `state` nonce.
async fn login(State(state): State<Arc<AuthAppState>>) -> Response {
    let csrf_state = state.state_manager.create_state();
    debug!(state = %log_prefix(&csrf_state), "Redirecting to Spotify authorize");
    found(&state.provider.build_auth_url(&csrf_state))
}

/// GET /callback
///
/// Exchanges the authorization code, stores credentials and marks this
/// browser's session.
///
/// # Replay
/// A code seen within the replay window is not exchanged again. The browser
/// is still sent to the dashboard, and gets a session if the server already
/// holds credentials.
async fn callback(
    State(state): State<Arc<AuthAppState>>,
    headers: HeaderMap,
    Query(callback): Query<OAuthCallback>,
) -> Result<Response, AppError> {
    info!(
        has_code = callback.code.is_some(),
        error = ?callback.error,
        state = ?callback.state.as_deref().map(log_prefix),
        "Callback received"
    );

    if let Some(error) = callback.error {
        let reason = match callback.error_description {
            Some(description) => format!("{} - {}", error, description),
            None => error,
        };
        warn!(reason = %reason, "Spotify authorization denied");
        return Err(AuthError::AuthorizationDenied(reason).into());
    }

    let code = callback
        .code
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing Spotify authorization code".to_string()))?;

    // Claimed before the state check: a concurrent duplicate carrying the
    // same single-use state must land here, not on the state rejection
    if !state.used_codes.mark_consumed(&code) {
        return Ok(replayed_callback(&state, &headers, &code));
    }

    if let Some(csrf_state) = callback.state.as_deref() {
        if !state.state_manager.validate_and_consume(csrf_state) {
            warn!(state = %log_prefix(csrf_state), "Invalid or expired OAuth state");
            return Err(AppError::BadRequest(
                "Invalid or expired OAuth state".to_string(),
            ));
        }
    }

    let credentials = state
        .token_client
        .exchange_code(&code)
        .await
        .map_err(|e| {
            error!(code = %log_prefix(&code), error = %e, "Spotify token exchange failed");
            AppError::from(e)
        })?;

    state
        .credential_store
        .save(&state.identity, &credentials)
        .map_err(|e| {
            error!(identity = %state.identity, error = %e, "Failed to store credentials");
            AppError::from(AuthError::Storage(e.to_string()))
        })?;

    let set_cookie = state.open_session(&headers);

    info!(
        identity = %state.identity,
        "Tokens saved and session authorized, redirecting to frontend"
    );

    Ok(found_with_cookie(&state.frontend_origin, set_cookie))
}

fn replayed_callback(state: &AuthAppState, headers: &HeaderMap, code: &str) -> Response {
    warn!(code = %log_prefix(code), "Duplicate callback code, skipping exchange");

    if state.has_refresh_token(&state.identity) {
        let set_cookie = state.open_session(headers);
        return found_with_cookie(&state.frontend_origin, set_cookie);
    }

    found(&state.frontend_origin)
}

/// GET /auth/status
///
/// `authed` requires both a live session marker and stored credentials.
async fn status(State(state): State<Arc<AuthAppState>>, headers: HeaderMap) -> Json<AuthStatus> {
    let authed = state
        .session_identity(&headers)
        .is_some_and(|identity| state.has_refresh_token(&identity));

    Json(AuthStatus { authed })
}

/// POST /auth/logout
///
/// Clears stored credentials and every session bound to the identity,
/// then expires the caller's cookie.
async fn logout(
    State(state): State<Arc<AuthAppState>>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let identity = state
        .session_identity(&headers)
        .unwrap_or_else(|| state.identity.clone());

    if let Some(session_id) = state.session_cookie.session_id(&headers) {
        state.sessions.destroy(&session_id);
    }
    let revoked = state.sessions.revoke_identity(&identity);

    state.credential_store.clear(&identity).map_err(|e| {
        error!(identity = %identity, error = %e, "Failed to clear credentials");
        AppError::from(AuthError::Storage(e.to_string()))
    })?;

    info!(identity = %identity, sessions_revoked = revoked, "Logged out");

    Ok((
        [(header::SET_COOKIE, state.session_cookie.expire())],
        Json(LogoutResponse { ok: true }),
    )
        .into_response())
}

/// GET /callback/api/* and /callback/auth/* → 307 without the prefix
async fn strip_callback_prefix(OriginalUri(uri): OriginalUri) -> Response {
    let path = uri.path().strip_prefix("/callback").unwrap_or(uri.path());
    let target = match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    };

    (
        StatusCode::TEMPORARY_REDIRECT,
        [(header::LOCATION, target)],
    )
        .into_response()
}
