// Integration tests for the browser authorization flow:
// /auth/login, /callback, /auth/status, /auth/logout

mod common;

use axum::{body::Body, http::StatusCode};
use common::*;
use mockito::Matcher;
use spotdash::credentials::CredentialStore;

fn query_param(url: &str, name: &str) -> Option<String> {
    let query = url.split_once('?')?.1;
    let params: Vec<(String, String)> = serde_urlencoded::from_str(query).ok()?;
    params
        .into_iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value)
}

/// GET /auth/login redirects to Spotify with client id, scopes and a state nonce.
#[tokio::test]
async fn test_login_redirects_to_authorize() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);

    let response = app.get("/auth/login", None).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let target = location(&response);
    assert!(target.starts_with(&format!("{}/authorize?", server.url())));
    assert_eq!(query_param(&target, "response_type").as_deref(), Some("code"));
    assert_eq!(query_param(&target, "client_id").as_deref(), Some("cid"));
    assert_eq!(
        query_param(&target, "redirect_uri").as_deref(),
        Some("http://localhost:10000/callback")
    );

    let scope = query_param(&target, "scope").unwrap();
    for expected in [
        "user-read-playback-state",
        "user-modify-playback-state",
        "user-read-currently-playing",
        "user-top-read",
        "user-read-recently-played",
        "user-library-modify",
    ] {
        assert!(scope.split(' ').any(|s| s == expected), "missing scope {}", expected);
    }

    let state = query_param(&target, "state").unwrap();
    assert_eq!(state.len(), 24);
    assert_eq!(app.services.state_manager.count(), 1);
}

/// Full flow: login state round-trips, code is exchanged, cookie issued.
#[tokio::test]
async fn test_callback_with_issued_state_signs_in() {
    let mut server = mockito::Server::new_async().await;
    let exchange = mock_code_exchange(&mut server, "good_code").await;
    let app = TestApp::new(&server);

    let login = app.get("/auth/login", None).await;
    let state = query_param(&location(&login), "state").unwrap();

    let response = app
        .get(&format!("/callback?code=good_code&state={}", state), None)
        .await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), FRONTEND);

    let set_cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("sid="));
    assert!(set_cookie.contains("HttpOnly"));
    assert!(set_cookie.contains("SameSite=Lax"));

    let stored = app.store.load(IDENTITY).unwrap();
    assert_eq!(stored.access_token, "fresh_access");
    assert_eq!(stored.refresh_token.as_deref(), Some("fresh_refresh"));
    assert!(stored.expires_at.is_some());

    let cookie = set_cookie_pair(&response).unwrap();
    let status = body_json(app.get("/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authed"], true);

    // State is single-use
    assert_eq!(app.services.state_manager.count(), 0);
    exchange.assert_async().await;
}

/// Scenario C: the same code delivered twice is exchanged once, and both
/// deliveries land on the dashboard.
#[tokio::test]
async fn test_duplicate_callback_exchanges_once() {
    let mut server = mockito::Server::new_async().await;
    let exchange = mock_code_exchange(&mut server, "code_c").await;
    let app = TestApp::new(&server);

    let first = app.get("/callback?code=code_c", None).await;
    assert_eq!(first.status(), StatusCode::FOUND);
    assert_eq!(location(&first), FRONTEND);

    let second = app.get("/callback?code=code_c", None).await;
    assert_eq!(second.status(), StatusCode::FOUND);
    assert_eq!(location(&second), FRONTEND);

    // Replayed delivery still gets a usable session since tokens exist
    let cookie = set_cookie_pair(&second).unwrap();
    let status = body_json(app.get("/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authed"], true);

    exchange.assert_async().await;
}

/// A replayed code before any credentials exist redirects without a session.
#[tokio::test]
async fn test_duplicate_callback_after_failed_exchange_has_no_session() {
    let mut server = mockito::Server::new_async().await;
    let exchange = server
        .mock("POST", "/api/token")
        .with_status(400)
        .with_body(r#"{"error":"invalid_grant"}"#)
        .expect(1)
        .create_async()
        .await;
    let app = TestApp::new(&server);

    let first = app.get("/callback?code=bad_code", None).await;
    assert_eq!(first.status(), StatusCode::BAD_GATEWAY);
    let json = body_json(first).await;
    assert_eq!(json["error"], "Spotify authentication failed");

    let second = app.get("/callback?code=bad_code", None).await;
    assert_eq!(second.status(), StatusCode::FOUND);
    assert_eq!(location(&second), FRONTEND);
    assert!(set_cookie_pair(&second).is_none());

    exchange.assert_async().await;
}

/// A state that was never issued is refused before any exchange.
#[tokio::test]
async fn test_callback_with_unknown_state_rejected() {
    let mut server = mockito::Server::new_async().await;
    let exchange = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;
    let app = TestApp::new(&server);

    let response = app.get("/callback?code=abc&state=forged", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid or expired OAuth state");

    exchange.assert_async().await;
}

#[tokio::test]
async fn test_callback_error_param_rejected() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);

    let response = app.get("/callback?error=access_denied", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Spotify auth error: access_denied");
    assert!(app.store.load(IDENTITY).is_none());
}

#[tokio::test]
async fn test_callback_without_code_rejected() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);

    let response = app.get("/callback", None).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Missing Spotify authorization code");
}

/// An exchange response without a refresh token leaves the store empty.
#[tokio::test]
async fn test_exchange_without_refresh_token_not_stored() {
    let mut server = mockito::Server::new_async().await;
    let _exchange = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"only_access","expires_in":3600}"#)
        .create_async()
        .await;
    let app = TestApp::new(&server);

    let response = app.get("/callback?code=no_refresh", None).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(app.store.load(IDENTITY).is_none());
}

#[tokio::test]
async fn test_status_requires_session_and_credentials() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);

    // Neither
    let status = body_json(app.get("/auth/status", None).await).await;
    assert_eq!(status["authed"], false);

    // Session only
    let cookie = app.signed_in_cookie();
    let status = body_json(app.get("/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authed"], false);

    // Credentials only
    app.store_credentials("at", chrono::Duration::hours(1));
    let status = body_json(app.get("/auth/status", None).await).await;
    assert_eq!(status["authed"], false);

    // Both
    let status = body_json(app.get("/auth/status", Some(&cookie)).await).await;
    assert_eq!(status["authed"], true);
}

/// Scenario D: logout clears credentials, then status reports signed out.
#[tokio::test]
async fn test_logout_then_status_signed_out() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);
    app.store_credentials("at", chrono::Duration::hours(1));
    let cookie = app.signed_in_cookie();
    let other_browser = app.signed_in_cookie();

    let response = app
        .send(request("POST", "/auth/logout", Some(&cookie), Body::empty()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response.headers()["set-cookie"].to_str().unwrap().to_string();
    assert!(set_cookie.starts_with("sid=;"));
    assert!(set_cookie.contains("Max-Age=0"));
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({ "ok": true }));

    assert!(app.store.load(IDENTITY).is_none());
    assert_eq!(app.services.sessions.count(), 0);

    for browser in [&cookie, &other_browser] {
        let status = body_json(app.get("/auth/status", Some(browser)).await).await;
        assert_eq!(status["authed"], false);
    }
}

/// Logout without a session still clears the deployment's credentials.
#[tokio::test]
async fn test_logout_without_session() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);
    app.store_credentials("at", chrono::Duration::hours(1));

    let response = app
        .send(request("POST", "/auth/logout", None, Body::empty()))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(app.store.load(IDENTITY).is_none());
}

/// Signing in again replaces the browser's previous session.
#[tokio::test]
async fn test_callback_replaces_existing_session() {
    let mut server = mockito::Server::new_async().await;
    let _exchange = server
        .mock("POST", "/api/token")
        .match_body(Matcher::UrlEncoded(
            "grant_type".into(),
            "authorization_code".into(),
        ))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"a","expires_in":3600,"refresh_token":"r"}"#)
        .create_async()
        .await;
    let app = TestApp::new(&server);
    let old_cookie = app.signed_in_cookie();

    let response = app.get("/callback?code=again", Some(&old_cookie)).await;
    assert_eq!(response.status(), StatusCode::FOUND);

    let new_cookie = set_cookie_pair(&response).unwrap();
    assert_ne!(new_cookie, old_cookie);
    assert_eq!(app.services.sessions.count(), 1);

    let status = body_json(app.get("/auth/status", Some(&old_cookie)).await).await;
    assert_eq!(status["authed"], false);
}

#[tokio::test]
async fn test_callback_prefixed_paths_redirect() {
    let server = mockito::Server::new_async().await;
    let app = TestApp::new(&server);

    let response = app.get("/callback/api/top-tracks?limit=5", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/api/top-tracks?limit=5");

    let response = app.get("/callback/auth/status", None).await;
    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(location(&response), "/auth/status");
}

/// Concurrent deliveries of one code and its state: one exchange, and every
/// delivery is redirected rather than refused for the already-used state.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_duplicate_callbacks_all_redirect() {
    let mut server = mockito::Server::new_async().await;
    let exchange = mock_code_exchange(&mut server, "racy_code").await;
    let app = TestApp::new(&server);

    let login = app.get("/auth/login", None).await;
    let state = query_param(&location(&login), "state").unwrap();
    let uri = format!("/callback?code=racy_code&state={}", state);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let router = app.router.clone();
            let request = request("GET", &uri, None, Body::empty());
            tokio::spawn(async move {
                use tower::ServiceExt;
                router.oneshot(request).await.unwrap()
            })
        })
        .collect();

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(location(&response), FRONTEND);
    }

    exchange.assert_async().await;
}

/// A code is claimed before its state is checked, so a retry of a refused
/// delivery is treated as a replay rather than exchanged.
#[tokio::test]
async fn test_code_claimed_before_state_check() {
    let mut server = mockito::Server::new_async().await;
    let exchange = server
        .mock("POST", "/api/token")
        .expect(0)
        .create_async()
        .await;
    let app = TestApp::new(&server);

    let first = app.get("/callback?code=claimed&state=forged", None).await;
    assert_eq!(first.status(), StatusCode::BAD_REQUEST);

    let retry = app.get("/callback?code=claimed", None).await;
    assert_eq!(retry.status(), StatusCode::FOUND);
    assert_eq!(location(&retry), FRONTEND);
    assert!(set_cookie_pair(&retry).is_none());

    exchange.assert_async().await;
}
