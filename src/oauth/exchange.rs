//! Client for the Spotify token endpoint.
//!
//! Handles both grants: `authorization_code` on callback and
//! `refresh_token` when an access token goes stale. Client credentials go
//! in an HTTP Basic header.

use super::provider::OAuthProviderConfig;
use crate::credentials::Credentials;
use crate::error::AuthError;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;

/// OAuth token response (standard OAuth 2.0)
#[derive(Deserialize, Debug)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    scope: Option<String>,
}

/// Result of a successful refresh
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: String,
    /// Set only when the provider rotated the refresh token
    pub refresh_token: Option<String>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct TokenClient {
    http: reqwest::Client,
    provider: Arc<OAuthProviderConfig>,
}

impl TokenClient {
    pub fn new(http: reqwest::Client, provider: Arc<OAuthProviderConfig>) -> Self {
        Self { http, provider }
    }

    /// Exchange an authorization code for a full credential record.
    ///
    /// A response without a refresh token is rejected: the record would be
    /// unusable once the access token expired.
    pub async fn exchange_code(&self, code: &str) -> Result<Credentials, AuthError> {
        let form = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.provider.redirect_uri.as_str()),
        ];

        let token = self
            .request_token(&form)
            .await
            .map_err(AuthError::CodeExchangeFailed)?;

        debug!(
            expires_in = ?token.expires_in,
            scope = ?token.scope,
            "Authorization code exchanged"
        );

        let refresh_token = token.refresh_token.ok_or_else(|| {
            AuthError::CodeExchangeFailed(
                "token response did not include a refresh token".to_string(),
            )
        })?;

        Ok(Credentials {
            access_token: token.access_token,
            refresh_token: Some(refresh_token),
            expires_at: Some(expiry_from(token.expires_in)),
        })
    }

    /// Mint a new access token from a refresh token.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, AuthError> {
        let form = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        let token = self
            .request_token(&form)
            .await
            .map_err(AuthError::TokenRefreshFailed)?;

        debug!(
            expires_in = ?token.expires_in,
            rotated = token.refresh_token.is_some(),
            "Access token refreshed"
        );

        Ok(TokenGrant {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: expiry_from(token.expires_in),
        })
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenResponse, String> {
        let response = self
            .http
            .post(&self.provider.token_url)
            .basic_auth(&self.provider.client_id, Some(&self.provider.client_secret))
            .header("Accept", "application/json")
            .form(form)
            .send()
            .await
            .map_err(|e| format!("token request failed: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<failed to read body>".to_string());
            return Err(format!("status {}: {}", status.as_u16(), body));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| format!("invalid token response: {}", e))
    }
}

/// Spotify access tokens live one hour; used when `expires_in` is omitted
const DEFAULT_EXPIRES_IN_SECS: i64 = 3600;

fn expiry_from(expires_in: Option<i64>) -> DateTime<Utc> {
    Utc::now() + Duration::seconds(expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS))
}
