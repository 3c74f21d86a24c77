//! Spotify OAuth provider configuration.

use crate::config::SpotifyConfig;

/// Scopes the proxy routes need.
///
/// Playback state/control, identity, top items, recently played and
/// library writes. Anything missing here surfaces as an upstream 403.
pub const SPOTIFY_SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-read-private",
    "user-read-email",
    "user-top-read",
    "user-read-recently-played",
    "user-library-modify",
];

/// OAuth provider configuration
#[derive(Clone, Debug)]
pub struct OAuthProviderConfig {
    /// OAuth authorization endpoint URL
    pub auth_url: String,

    /// OAuth token endpoint URL
    pub token_url: String,

    pub scopes: Vec<String>,

    pub client_id: String,

    /// Only ever sent to the token endpoint
    pub client_secret: String,

    /// Registered callback URL
    pub redirect_uri: String,
}

impl OAuthProviderConfig {
    pub fn spotify(config: &SpotifyConfig) -> Self {
        Self {
            auth_url: format!("{}/authorize", config.accounts_base_url),
            token_url: format!("{}/api/token", config.accounts_base_url),
            scopes: SPOTIFY_SCOPES.iter().map(|s| s.to_string()).collect(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
        }
    }

    /// Build authorization URL carrying the anti-forgery `state`
    pub fn build_auth_url(&self, state: &str) -> String {
        let scopes = self.scopes.join(" ");
        format!(
            "{}?response_type=code&client_id={}&scope={}&redirect_uri={}&state={}",
            self.auth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&scopes),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> OAuthProviderConfig {
        OAuthProviderConfig::spotify(&SpotifyConfig {
            client_id: "test_client_id".to_string(),
            client_secret: "test_secret".to_string(),
            redirect_uri: "http://localhost:10000/callback".to_string(),
            ..SpotifyConfig::default()
        })
    }

    #[test]
    fn test_spotify_endpoints() {
        let config = test_config();
        assert_eq!(config.auth_url, "https://accounts.spotify.com/authorize");
        assert_eq!(config.token_url, "https://accounts.spotify.com/api/token");
    }

    #[test]
    fn test_build_auth_url() {
        let url = test_config().build_auth_url("random_state");

        assert!(url.starts_with("https://accounts.spotify.com/authorize?"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("client_id=test_client_id"));
        assert!(url.contains("redirect_uri=http%3A%2F%2Flocalhost%3A10000%2Fcallback"));
        assert!(url.contains("state=random_state"));
        assert!(!url.contains("test_secret"));
    }

    #[test]
    fn test_auth_url_lists_every_scope() {
        let url = test_config().build_auth_url("s");
        for scope in SPOTIFY_SCOPES {
            assert!(url.contains(scope), "missing scope {}", scope);
        }
        // Space-separated, percent-encoded
        assert!(url.contains("user-read-playback-state%20user-modify-playback-state"));
    }
}
