//! Bearer-authenticated pass-through to the Spotify Web API.
//!
//! Each call is independent: no retries, no caching. Whatever status and
//! body Spotify returns (204 included, error payloads included) is handed
//! back unchanged.

use crate::error::AuthError;
use crate::token::TokenManager;
use axum::body::Bytes;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use reqwest::Method;
use std::sync::Arc;
use tracing::{debug, error};

/// Upstream reply, relayed verbatim
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl IntoResponse for UpstreamResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, self.body).into_response();
        let headers = response.headers_mut();
        match self
            .content_type
            .and_then(|ct| HeaderValue::from_str(&ct).ok())
        {
            Some(content_type) => {
                headers.insert(header::CONTENT_TYPE, content_type);
            }
            None => {
                headers.remove(header::CONTENT_TYPE);
            }
        }
        response
    }
}

pub struct SpotifyProxy {
    http: reqwest::Client,
    api_base_url: String,
    tokens: Arc<TokenManager>,
}

impl SpotifyProxy {
    pub fn new(
        http: reqwest::Client,
        api_base_url: impl Into<String>,
        tokens: Arc<TokenManager>,
    ) -> Self {
        Self {
            http,
            api_base_url: api_base_url.into(),
            tokens,
        }
    }

    /// Forward one call to the Web API on behalf of `identity`.
    ///
    /// # Errors
    /// * `NotAuthenticated` - no usable credentials; upstream is not contacted
    /// * `TokenRefreshFailed` - the access token could not be renewed
    /// * `Upstream` - transport failure (no HTTP response at all)
    pub async fn forward(
        &self,
        identity: &str,
        method: Method,
        upstream_path: &str,
        query: Option<&str>,
        body: Option<Bytes>,
    ) -> Result<UpstreamResponse, AuthError> {
        let token = self
            .tokens
            .get_valid_access_token(identity)
            .await?
            .ok_or(AuthError::NotAuthenticated)?;

        let url = self.upstream_url(upstream_path, query);
        debug!(method = %method, url = %url, "Forwarding to Spotify");

        let mut request = self.http.request(method.clone(), &url).bearer_auth(&token);

        if method != Method::GET {
            request = match body.filter(|b| !b.is_empty()) {
                Some(body) => request
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body),
                // Spotify rejects body-less PUT/POST without a length
                None => request.body(Bytes::new()),
            };
        }

        let response = request.send().await.map_err(|e| {
            error!(url = %url, error = %e, "Spotify API request failed");
            AuthError::Upstream(e.to_string())
        })?;

        let status = StatusCode::from_u16(response.status().as_u16())
            .map_err(|e| AuthError::Upstream(e.to_string()))?;
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| AuthError::Upstream(e.to_string()))?;

        debug!(status = status.as_u16(), bytes = body.len(), "Spotify responded");

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    fn upstream_url(&self, upstream_path: &str, query: Option<&str>) -> String {
        match query.filter(|q| !q.is_empty()) {
            Some(query) => format!("{}{}?{}", self.api_base_url, upstream_path, query),
            None => format!("{}{}", self.api_base_url, upstream_path),
        }
    }
}
