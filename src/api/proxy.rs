//! `/api/*` routes: one per supported Spotify capability.
//!
//! Every route sits behind the session gate, passes the query string
//! through and relays the upstream response as-is. Responses are marked
//! uncacheable so the dashboard's polling always sees live state.

use crate::api::error::AppError;
use crate::api::session_gate::{require_session, SessionGate, SessionIdentity};
use crate::proxy::{SpotifyProxy, UpstreamResponse};
use axum::{
    body::Bytes,
    extract::{Path, Query, RawQuery, State},
    http::{header, HeaderValue},
    middleware,
    routing::{get, on, put, MethodFilter, MethodRouter},
    Extension, Router,
};
use reqwest::Method;
use serde::Deserialize;
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;

/// Shared application state for proxy routes
#[derive(Clone)]
pub struct ProxyAppState {
    pub proxy: Arc<SpotifyProxy>,
}

impl ProxyAppState {
    async fn relay(
        &self,
        session: &SessionIdentity,
        method: Method,
        upstream_path: &str,
        query: Option<String>,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, AppError> {
        self.proxy
            .forward(&session.0, method, upstream_path, query.as_deref(), body)
            .await
            .map_err(AppError::from)
    }
}

/// Create proxy router, gated by `gate`
pub fn create_proxy_router(state: ProxyAppState, gate: SessionGate) -> Router {
    Router::new()
        .route("/api/me", passthrough(MethodFilter::GET, Method::GET, "/me"))
        .route(
            "/api/player/state",
            passthrough(MethodFilter::GET, Method::GET, "/me/player"),
        )
        .route(
            "/api/player/devices",
            passthrough(MethodFilter::GET, Method::GET, "/me/player/devices"),
        )
        .route(
            "/api/player/queue",
            passthrough(MethodFilter::GET, Method::GET, "/me/player/queue"),
        )
        .route(
            "/api/top-tracks",
            passthrough(MethodFilter::GET, Method::GET, "/me/top/tracks"),
        )
        .route(
            "/api/top-artists",
            passthrough(MethodFilter::GET, Method::GET, "/me/top/artists"),
        )
        .route(
            "/api/recently-played",
            passthrough(MethodFilter::GET, Method::GET, "/me/player/recently-played"),
        )
        .route(
            "/api/playlists",
            passthrough(MethodFilter::GET, Method::GET, "/me/playlists"),
        )
        .route("/api/playlists/:id/tracks", get(playlist_tracks))
        .route("/api/like", put(like))
        .route(
            "/api/player/next",
            passthrough(MethodFilter::POST, Method::POST, "/me/player/next"),
        )
        .route(
            "/api/player/previous",
            passthrough(MethodFilter::POST, Method::POST, "/me/player/previous"),
        )
        .route(
            "/api/player/play",
            passthrough(MethodFilter::PUT, Method::PUT, "/me/player/play"),
        )
        .route(
            "/api/player/pause",
            passthrough(MethodFilter::PUT, Method::PUT, "/me/player/pause"),
        )
        .route(
            "/api/player/shuffle",
            passthrough(MethodFilter::PUT, Method::PUT, "/me/player/shuffle"),
        )
        .route(
            "/api/player/repeat",
            passthrough(MethodFilter::PUT, Method::PUT, "/me/player/repeat"),
        )
        .route(
            "/api/player/transfer",
            passthrough(MethodFilter::PUT, Method::PUT, "/me/player"),
        )
        .route_layer(middleware::from_fn_with_state(gate, require_session))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store, no-cache, must-revalidate, proxy-revalidate"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::PRAGMA,
            HeaderValue::from_static("no-cache"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::EXPIRES,
            HeaderValue::from_static("0"),
        ))
        .with_state(Arc::new(state))
}

/// Route that forwards to a fixed upstream path with query and body intact
fn passthrough(
    filter: MethodFilter,
    method: Method,
    upstream_path: &'static str,
) -> MethodRouter<Arc<ProxyAppState>> {
    on(
        filter,
        move |State(state): State<Arc<ProxyAppState>>,
              Extension(session): Extension<SessionIdentity>,
              RawQuery(query): RawQuery,
              body: Bytes| async move {
            state
                .relay(&session, method, upstream_path, query, Some(body))
                .await
        },
    )
}

/// GET /api/playlists/:id/tracks
async fn playlist_tracks(
    State(state): State<Arc<ProxyAppState>>,
    Extension(session): Extension<SessionIdentity>,
    Path(playlist_id): Path<String>,
    RawQuery(query): RawQuery,
) -> Result<UpstreamResponse, AppError> {
    let upstream_path = format!("/playlists/{}/tracks", urlencoding::encode(&playlist_id));
    state
        .relay(&session, Method::GET, &upstream_path, query, None)
        .await
}

#[derive(Deserialize)]
struct LikeParams {
    #[serde(default)]
    ids: Option<String>,
}

/// PUT /api/like?ids=... → save tracks to the library
async fn like(
    State(state): State<Arc<ProxyAppState>>,
    Extension(session): Extension<SessionIdentity>,
    Query(params): Query<LikeParams>,
) -> Result<UpstreamResponse, AppError> {
    let ids = params.ids.unwrap_or_default();
    let ids = ids.trim();
    if ids.is_empty() {
        return Err(AppError::BadRequest("Missing ids".to_string()));
    }

    let query = format!("ids={}", urlencoding::encode(ids));
    state
        .relay(&session, Method::PUT, "/me/tracks", Some(query), None)
        .await
}
