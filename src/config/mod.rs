use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Complete server configuration.
///
/// Loaded from an optional TOML file, then overridden from the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpConfig,
    #[serde(default)]
    pub spotify: SpotifyConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Listener and browser-facing settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub host: String,
    pub port: u16,
    /// Where the dashboard lives; callbacks redirect here and CORS allows only it
    pub frontend_origin: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 10000,
            frontend_origin: "http://localhost:5173".to_string(),
        }
    }
}

/// Spotify application registration and endpoints
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpotifyConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    /// Accounts service hosting `/authorize` and `/api/token`
    pub accounts_base_url: String,
    /// Versioned Web API base
    pub api_base_url: String,
    /// Per-request timeout for calls to either service
    pub request_timeout_seconds: u64,
}

impl Default for SpotifyConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            redirect_uri: "http://localhost:10000/callback".to_string(),
            accounts_base_url: "https://accounts.spotify.com".to_string(),
            api_base_url: "https://api.spotify.com/v1".to_string(),
            request_timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub credentials_db: String,
    /// Base64-encoded 32-byte AES key
    pub encryption_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_db: "credentials.db".to_string(),
            encryption_key: String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

/// Session cookie settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub cookie_name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_seconds: i64,
    pub max_sessions: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: "sid".to_string(),
            secure: true,
            same_site: SameSite::None,
            max_age_seconds: 60 * 60 * 24 * 7,
            max_sessions: 10_000,
        }
    }
}

/// Token lifecycle and callback bookkeeping
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Identity the deployment authorizes (single-tenant)
    pub identity: String,
    /// Refresh when the access token expires within this many seconds
    pub refresh_margin_seconds: i64,
    /// How long a consumed authorization code is remembered
    pub used_code_ttl_seconds: i64,
    pub used_code_capacity: usize,
    pub state_ttl_seconds: i64,
    pub state_capacity: usize,
    pub cleanup_interval_seconds: u64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            identity: "default".to_string(),
            refresh_margin_seconds: 5,
            used_code_ttl_seconds: 5 * 60,
            used_code_capacity: 1024,
            state_ttl_seconds: 10 * 60,
            state_capacity: 1024,
            cleanup_interval_seconds: 60,
        }
    }
}

impl ServerConfig {
    /// Reads `path` if it exists, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<ServerConfig>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            ServerConfig::default()
        };

        config.apply_overrides(|name| std::env::var(name).ok());
        config.normalize();
        Ok(config)
    }

    /// Overrides fields from `lookup` (the process environment in production).
    ///
    /// Unparseable numeric or boolean values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("HOST") {
            self.server.host = v;
        }
        if let Some(port) = lookup("PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(v) = lookup("FRONTEND_ORIGIN") {
            self.server.frontend_origin = v;
        }
        if let Some(v) = lookup("SPOTIFY_CLIENT_ID") {
            self.spotify.client_id = v;
        }
        if let Some(v) = lookup("SPOTIFY_CLIENT_SECRET") {
            self.spotify.client_secret = v;
        }
        if let Some(v) = lookup("SPOTIFY_REDIRECT_URI") {
            self.spotify.redirect_uri = v;
        }
        if let Some(v) = lookup("SPOTDASH_ACCOUNTS_URL") {
            self.spotify.accounts_base_url = v;
        }
        if let Some(v) = lookup("SPOTDASH_API_URL") {
            self.spotify.api_base_url = v;
        }
        if let Some(secs) = lookup("SPOTDASH_REQUEST_TIMEOUT").and_then(|v| v.parse().ok()) {
            self.spotify.request_timeout_seconds = secs;
        }
        if let Some(v) = lookup("SPOTDASH_CREDENTIALS_DB") {
            self.storage.credentials_db = v;
        }
        if let Some(v) = lookup("SPOTDASH_ENCRYPTION_KEY") {
            self.storage.encryption_key = v;
        }
        if let Some(secure) = lookup("SPOTDASH_COOKIE_SECURE").and_then(|v| v.parse().ok()) {
            self.session.secure = secure;
        }
    }

    /// Strips trailing slashes so URLs can be joined with `format!`.
    pub fn normalize(&mut self) {
        for url in [
            &mut self.server.frontend_origin,
            &mut self.spotify.redirect_uri,
            &mut self.spotify.accounts_base_url,
            &mut self.spotify.api_base_url,
        ] {
            let trimmed = url.trim_end_matches('/').len();
            url.truncate(trimmed);
        }
    }

    /// Rejects configurations the server cannot start with.
    pub fn validate(&self) -> Result<()> {
        if self.spotify.client_id.is_empty() || self.spotify.client_secret.is_empty() {
            bail!("Missing SPOTIFY_CLIENT_ID or SPOTIFY_CLIENT_SECRET");
        }
        if self.storage.encryption_key.is_empty() {
            bail!("Missing SPOTDASH_ENCRYPTION_KEY (base64-encoded 32-byte key)");
        }
        if self.session.same_site == SameSite::None && !self.session.secure {
            bail!("SameSite=None cookies require secure = true");
        }
        if self.spotify.request_timeout_seconds == 0 {
            bail!("spotify.request_timeout_seconds must be greater than 0");
        }
        if self.auth.refresh_margin_seconds < 5 {
            bail!("auth.refresh_margin_seconds must be at least 5");
        }
        Ok(())
    }
}
