// Shared harness: a router wired against a mockito server standing in for
// both the Spotify accounts service and the Web API.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use chrono::{Duration, Utc};
use spotdash::app::{create_app, AppServices};
use spotdash::config::{SameSite, ServerConfig};
use spotdash::credentials::{CredentialStore, Credentials, MemoryCredentialStore};
use std::sync::Arc;
use tower::ServiceExt;

pub const FRONTEND: &str = "http://dash.test";
pub const IDENTITY: &str = "default";

pub struct TestApp {
    pub router: Router,
    pub services: AppServices,
    pub store: Arc<MemoryCredentialStore>,
}

impl TestApp {
    pub fn new(server: &mockito::Server) -> Self {
        let mut config = ServerConfig::default();
        config.server.frontend_origin = FRONTEND.to_string();
        config.spotify.client_id = "cid".to_string();
        config.spotify.client_secret = "csecret".to_string();
        config.spotify.redirect_uri = "http://localhost:10000/callback".to_string();
        config.spotify.accounts_base_url = server.url();
        config.spotify.api_base_url = format!("{}/v1", server.url());
        config.session.secure = false;
        config.session.same_site = SameSite::Lax;

        let store = Arc::new(MemoryCredentialStore::new());
        let services = AppServices::new(&config, store.clone()).unwrap();
        let router = create_app(&config, &services).unwrap();

        Self {
            router,
            services,
            store,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, cookie, Body::empty())).await
    }

    /// Session cookie pair (`sid=...`) for a browser already signed in
    pub fn signed_in_cookie(&self) -> String {
        format!("sid={}", self.services.sessions.create(IDENTITY))
    }

    pub fn store_credentials(&self, access_token: &str, expires_in: Duration) {
        self.store
            .save(
                IDENTITY,
                &Credentials {
                    access_token: access_token.to_string(),
                    refresh_token: Some("stored_refresh".to_string()),
                    expires_at: Some(Utc::now() + expires_in),
                },
            )
            .unwrap();
    }
}

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(body).unwrap()
}

/// `name=value` part of the response's Set-Cookie header
pub fn set_cookie_pair(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|pair| pair.trim().to_string())
}

pub fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION]
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_bytes(response: Response<Body>) -> axum::body::Bytes {
    axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub async fn mock_code_exchange(server: &mut mockito::Server, code: &str) -> mockito::Mock {
    server
        .mock("POST", "/api/token")
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("grant_type".into(), "authorization_code".into()),
            mockito::Matcher::UrlEncoded("code".into(), code.into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"access_token":"fresh_access","token_type":"Bearer","expires_in":3600,"refresh_token":"fresh_refresh","scope":"user-read-private"}"#,
        )
        .create_async()
        .await
}
