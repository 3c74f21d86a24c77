//! Service wiring: builds every shared component once from `ServerConfig`
//! and assembles the top-level router.

use crate::api::{
    create_auth_router, create_proxy_router, AuthAppState, ProxyAppState, SessionGate,
};
use crate::config::ServerConfig;
use crate::credentials::CredentialStore;
use crate::oauth::{OAuthProviderConfig, StateManager, TokenClient, UsedCodes};
use crate::proxy::SpotifyProxy;
use crate::session::{SessionCookie, SessionStore};
use crate::token::TokenManager;
use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use chrono::Duration;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::debug;

/// Shared components. Cloning is cheap; every field is reference counted.
#[derive(Clone)]
pub struct AppServices {
    pub identity: String,
    pub credential_store: Arc<dyn CredentialStore>,
    pub provider: Arc<OAuthProviderConfig>,
    pub token_client: TokenClient,
    pub tokens: Arc<TokenManager>,
    pub proxy: Arc<SpotifyProxy>,
    pub sessions: SessionStore,
    pub session_cookie: SessionCookie,
    pub state_manager: StateManager,
    pub used_codes: UsedCodes,
}

impl AppServices {
    /// # Errors
    /// Fails when the HTTP client cannot be built.
    pub fn new(
        config: &ServerConfig,
        credential_store: Arc<dyn CredentialStore>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.spotify.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;
        let provider = Arc::new(OAuthProviderConfig::spotify(&config.spotify));
        let token_client = TokenClient::new(http.clone(), Arc::clone(&provider));

        let tokens = Arc::new(TokenManager::new(
            Arc::clone(&credential_store),
            token_client.clone(),
            Duration::seconds(config.auth.refresh_margin_seconds),
        ));
        let proxy = Arc::new(SpotifyProxy::new(
            http,
            config.spotify.api_base_url.clone(),
            Arc::clone(&tokens),
        ));

        Ok(Self {
            identity: config.auth.identity.clone(),
            credential_store,
            provider,
            token_client,
            tokens,
            proxy,
            sessions: SessionStore::new(
                Duration::seconds(config.session.max_age_seconds),
                config.session.max_sessions,
            ),
            session_cookie: SessionCookie::from_config(&config.session),
            state_manager: StateManager::new(
                Duration::seconds(config.auth.state_ttl_seconds),
                config.auth.state_capacity,
            ),
            used_codes: UsedCodes::new(
                Duration::seconds(config.auth.used_code_ttl_seconds),
                config.auth.used_code_capacity,
            ),
        })
    }
}

/// Build the full application router.
///
/// # Errors
/// Fails when the frontend origin is not a valid header value.
pub fn create_app(config: &ServerConfig, services: &AppServices) -> Result<Router> {
    let frontend_origin = config.server.frontend_origin.clone();

    let auth_state = AuthAppState {
        identity: services.identity.clone(),
        frontend_origin: frontend_origin.clone(),
        provider: Arc::clone(&services.provider),
        token_client: services.token_client.clone(),
        credential_store: Arc::clone(&services.credential_store),
        sessions: services.sessions.clone(),
        session_cookie: services.session_cookie.clone(),
        state_manager: services.state_manager.clone(),
        used_codes: services.used_codes.clone(),
    };

    let gate = SessionGate::new(services.sessions.clone(), services.session_cookie.clone());
    let proxy_state = ProxyAppState {
        proxy: Arc::clone(&services.proxy),
    };

    let allowed_origin = HeaderValue::from_str(&frontend_origin)
        .with_context(|| format!("Invalid frontend origin: {}", frontend_origin))?;
    // Foreign origins get no Access-Control-Allow-Origin at all
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list([allowed_origin]))
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE]);

    let root_target = frontend_origin;
    let app = Router::new()
        .route(
            "/",
            get(move || async move {
                (StatusCode::FOUND, [(header::LOCATION, root_target)]).into_response()
            }),
        )
        .route("/health", get(health))
        .merge(create_auth_router(auth_state))
        .merge(create_proxy_router(proxy_state, gate))
        .layer(cors);

    Ok(app)
}

async fn health() -> Response {
    Json(json!({ "ok": true })).into_response()
}

/// Periodically drop expired states, consumed codes and sessions.
pub async fn run_cache_cleanup(services: AppServices, interval_seconds: u64) {
    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_secs(interval_seconds.max(1)));

    loop {
        interval.tick().await;
        let states = services.state_manager.cleanup_expired();
        let codes = services.used_codes.cleanup_expired();
        let sessions = services.sessions.cleanup_expired();
        debug!(
            states_purged = states,
            codes_purged = codes,
            sessions_purged = sessions,
            sessions_live = services.sessions.count(),
            "Cache cleanup complete"
        );
    }
}
