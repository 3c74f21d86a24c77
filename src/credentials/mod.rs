//! Durable holder of the Spotify credential record.
//!
//! The record is keyed by identity so the identity-to-credential relation
//! stays explicit even though a deployment normally authorizes one identity.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │       CredentialStore (trait)            │
//! │  - load / save / clear                   │
//! └─────────────────────────────────────────┘
//!          ↓                      ↓
//! ┌────────────────────┐  ┌────────────────────┐
//! │ SqliteCredential-  │  │ MemoryCredential-  │
//! │ Store              │  │ Store              │
//! │ - AES-256-GCM      │  │ - DashMap          │
//! │ - UPSERT per row   │  │ - tests/ephemeral  │
//! └────────────────────┘  └────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use spotdash::credentials::{CredentialStore, Credentials, SqliteCredentialStore};
//! use chrono::{Utc, Duration};
//!
//! # fn main() -> anyhow::Result<()> {
//! let encryption_key = std::env::var("SPOTDASH_ENCRYPTION_KEY")?;
//! let store = SqliteCredentialStore::new("credentials.db", &encryption_key)?;
//!
//! store.save("default", &Credentials {
//!     access_token: "BQD...".to_string(),
//!     refresh_token: Some("AQB...".to_string()),
//!     expires_at: Some(Utc::now() + Duration::hours(1)),
//! })?;
//!
//! if let Some(creds) = store.load("default") {
//!     assert!(creds.refresh_token.is_some());
//! }
//!
//! store.clear("default")?;
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use std::fmt;

mod encryption;
mod memory;
mod storage;

pub use encryption::{SealedToken, TokenCipher};
pub use memory::MemoryCredentialStore;
pub use storage::SqliteCredentialStore;

/// OAuth tokens for one authorized identity.
///
/// The refresh token never leaves the server. `access_token` and
/// `expires_at` may be stale and are only trusted after `is_fresh`.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Short-lived bearer token for the Web API
    pub access_token: String,

    /// Long-lived token used to mint new access tokens
    pub refresh_token: Option<String>,

    /// When the access token expires (UTC)
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    /// True if the access token is still valid for more than `margin`.
    ///
    /// A record with no expiry is treated as stale.
    pub fn is_fresh(&self, now: DateTime<Utc>, margin: Duration) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now + margin,
            None => false,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Storage seam for the credential record.
///
/// `load` never fails: a missing, corrupt or undecryptable record reads as
/// `None`, which callers treat as "not authenticated".
pub trait CredentialStore: Send + Sync {
    fn load(&self, identity: &str) -> Option<Credentials>;

    /// Atomically replaces the record for `identity`.
    fn save(&self, identity: &str, credentials: &Credentials) -> Result<()>;

    /// Removes the record entirely. Clearing a missing record is not an error.
    fn clear(&self, identity: &str) -> Result<()>;
}
