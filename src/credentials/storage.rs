//! Encrypted credential storage using SQLite.
//!
//! One row per identity. Tokens are sealed with AES-256-GCM before they
//! touch the database.

use super::{CredentialStore, Credentials, SealedToken, TokenCipher};
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::warn;

/// Raw row as read from the `credentials` table
struct CredentialRow {
    access_token: String,
    access_token_nonce: String,
    refresh_token: Option<String>,
    refresh_token_nonce: Option<String>,
    expires_at: Option<String>,
}

/// Encrypted credential storage backed by SQLite.
///
/// # Schema
/// ```sql
/// CREATE TABLE credentials (
///     identity TEXT PRIMARY KEY,
///     access_token TEXT NOT NULL,       -- Encrypted
///     access_token_nonce TEXT NOT NULL,
///     refresh_token TEXT,               -- Encrypted (optional)
///     refresh_token_nonce TEXT,
///     expires_at TEXT,                  -- RFC 3339 (optional)
///     created_at TEXT NOT NULL,
///     updated_at TEXT NOT NULL
/// );
/// ```
///
/// `save` is a single UPSERT statement, so a reader sees either the old
/// record or the new one, never a mix.
pub struct SqliteCredentialStore {
    conn: Mutex<Connection>,
    cipher: TokenCipher,
}

impl SqliteCredentialStore {
    /// Creates or opens a credential store.
    ///
    /// # Arguments
    /// * `db_path` - Path to SQLite database file (`:memory:` for tests)
    /// * `encryption_key` - Base64-encoded 32-byte master key
    pub fn new<P: AsRef<Path>>(db_path: P, encryption_key: &str) -> Result<Self> {
        let cipher = TokenCipher::from_base64_key(encryption_key)
            .context("Invalid encryption key")?;

        let conn = Connection::open(db_path).context("Failed to open database")?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS credentials (
                identity TEXT PRIMARY KEY,
                access_token TEXT NOT NULL,
                access_token_nonce TEXT NOT NULL,
                refresh_token TEXT,
                refresh_token_nonce TEXT,
                expires_at TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
            [],
        )
        .context("Failed to create credentials table")?;

        Ok(Self {
            conn: Mutex::new(conn),
            cipher,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("Credential database lock poisoned"))
    }

    fn try_load(&self, identity: &str) -> Result<Option<Credentials>> {
        let row = self
            .conn()?
            .query_row(
                r#"
                SELECT access_token, access_token_nonce,
                       refresh_token, refresh_token_nonce,
                       expires_at
                FROM credentials
                WHERE identity = ?1
                "#,
                params![identity],
                |row| {
                    Ok(CredentialRow {
                        access_token: row.get(0)?,
                        access_token_nonce: row.get(1)?,
                        refresh_token: row.get(2)?,
                        refresh_token_nonce: row.get(3)?,
                        expires_at: row.get(4)?,
                    })
                },
            )
            .optional()
            .context("Failed to query credentials")?;

        let Some(row) = row else {
            return Ok(None);
        };

        let access_token = self
            .cipher
            .open(&SealedToken {
                ciphertext: row.access_token,
                nonce: row.access_token_nonce,
            })
            .context("Failed to decrypt access token")?;

        let refresh_token = match (row.refresh_token, row.refresh_token_nonce) {
            (Some(ciphertext), Some(nonce)) => Some(
                self.cipher
                    .open(&SealedToken { ciphertext, nonce })
                    .context("Failed to decrypt refresh token")?,
            ),
            _ => None,
        };

        let expires_at = row
            .expires_at
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)))
            .transpose()
            .context("Failed to parse expires_at timestamp")?;

        Ok(Some(Credentials {
            access_token,
            refresh_token,
            expires_at,
        }))
    }
}

impl CredentialStore for SqliteCredentialStore {
    fn load(&self, identity: &str) -> Option<Credentials> {
        match self.try_load(identity) {
            Ok(record) => record,
            Err(e) => {
                warn!(
                    identity = %identity,
                    error = %e,
                    "Unreadable credential record, treating as absent"
                );
                None
            }
        }
    }

    fn save(&self, identity: &str, credentials: &Credentials) -> Result<()> {
        let access = self
            .cipher
            .seal(&credentials.access_token)
            .context("Failed to encrypt access token")?;

        let refresh = credentials
            .refresh_token
            .as_deref()
            .map(|token| self.cipher.seal(token))
            .transpose()
            .context("Failed to encrypt refresh token")?;
        let (refresh_token, refresh_token_nonce) = match refresh {
            Some(sealed) => (Some(sealed.ciphertext), Some(sealed.nonce)),
            None => (None, None),
        };

        let expires_at = credentials.expires_at.map(|dt| dt.to_rfc3339());
        let now = Utc::now().to_rfc3339();

        self.conn()?
            .execute(
                r#"
                INSERT INTO credentials (
                    identity,
                    access_token, access_token_nonce,
                    refresh_token, refresh_token_nonce,
                    expires_at, created_at, updated_at
                )
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(identity) DO UPDATE SET
                    access_token = excluded.access_token,
                    access_token_nonce = excluded.access_token_nonce,
                    refresh_token = excluded.refresh_token,
                    refresh_token_nonce = excluded.refresh_token_nonce,
                    expires_at = excluded.expires_at,
                    updated_at = excluded.updated_at
                "#,
                params![
                    identity,
                    access.ciphertext,
                    access.nonce,
                    refresh_token,
                    refresh_token_nonce,
                    expires_at,
                    now,
                    now,
                ],
            )
            .context("Failed to store credentials")?;

        Ok(())
    }

    fn clear(&self, identity: &str) -> Result<()> {
        self.conn()?
            .execute(
                "DELETE FROM credentials WHERE identity = ?1",
                params![identity],
            )
            .context("Failed to delete credentials")?;

        Ok(())
    }
}
