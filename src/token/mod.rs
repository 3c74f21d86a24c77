//! Access token lifecycle.
//!
//! `get_valid_access_token` returns the stored access token while it is
//! comfortably inside its lifetime and refreshes it against the token
//! endpoint otherwise. Refresh is lazy: it only happens when a request
//! needs a token.
//!
//! Refreshes are serialised behind an async mutex and the record is
//! re-read once the lock is held, so concurrent callers that all found a
//! stale token share one refresh instead of each issuing their own.

use crate::credentials::{CredentialStore, Credentials};
use crate::error::AuthError;
use crate::oauth::TokenClient;
use chrono::{Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};


pub struct TokenManager {
    store: Arc<dyn CredentialStore>,
    client: TokenClient,
    refresh_margin: Duration,
    refresh_lock: Mutex<()>,
}

impl TokenManager {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        client: TokenClient,
        refresh_margin: Duration,
    ) -> Self {
        Self {
            store,
            client,
            refresh_margin,
            refresh_lock: Mutex::new(()),
        }
    }

    /// Returns a usable access token for `identity`.
    ///
    /// * `Ok(None)` - no record, or the record has no refresh token
    /// * `Err(TokenRefreshFailed)` - the token endpoint rejected the refresh;
    ///   the stored record is left untouched
    pub async fn get_valid_access_token(
        &self,
        identity: &str,
    ) -> Result<Option<String>, AuthError> {
        let Some((credentials, _)) = self.usable_record(identity) else {
            return Ok(None);
        };

        if credentials.is_fresh(Utc::now(), self.refresh_margin) {
            return Ok(Some(credentials.access_token));
        }

        let _guard = self.refresh_lock.lock().await;

        // Another caller may have refreshed (or logged out) while we waited
        let Some((credentials, refresh_token)) = self.usable_record(identity) else {
            return Ok(None);
        };
        if credentials.is_fresh(Utc::now(), self.refresh_margin) {
            debug!(identity = %identity, "Access token refreshed by concurrent request");
            return Ok(Some(credentials.access_token));
        }

        info!(identity = %identity, "Refreshing Spotify access token");

        let grant = self.client.refresh(&refresh_token).await.map_err(|e| {
            warn!(identity = %identity, error = %e, "Token refresh failed");
            e
        })?;

        let updated = Credentials {
            access_token: grant.access_token,
            refresh_token: Some(grant.refresh_token.unwrap_or(refresh_token)),
            expires_at: Some(grant.expires_at),
        };

        if let Err(e) = self.store.save(identity, &updated) {
            // The fresh token is still good for this request
            warn!(identity = %identity, error = %e, "Failed to persist refreshed credentials");
        }

        Ok(Some(updated.access_token))
    }

    fn usable_record(&self, identity: &str) -> Option<(Credentials, String)> {
        let credentials = self.store.load(identity)?;
        let refresh_token = credentials.refresh_token.clone()?;
        Some((credentials, refresh_token))
    }
}
