//! Session cookie parsing and `Set-Cookie` rendering.

use crate::config::{SameSite, SessionConfig};
use axum::http::{header, HeaderMap};

/// Find a cookie value by name across all `Cookie` headers.
///
/// Returns None for a missing or empty value.
pub fn extract_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value.trim().trim_matches('"').to_string())
        .filter(|value| !value.is_empty())
}

/// Attributes for the session marker cookie
#[derive(Clone, Debug)]
pub struct SessionCookie {
    pub name: String,
    pub secure: bool,
    pub same_site: SameSite,
    pub max_age_seconds: i64,
}

impl SessionCookie {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            name: config.cookie_name.clone(),
            secure: config.secure,
            same_site: config.same_site,
            max_age_seconds: config.max_age_seconds,
        }
    }

    pub fn session_id(&self, headers: &HeaderMap) -> Option<String> {
        extract_cookie(headers, &self.name)
    }

    /// `Set-Cookie` value carrying `session_id`
    pub fn issue(&self, session_id: &str) -> String {
        self.render(session_id, self.max_age_seconds)
    }

    /// `Set-Cookie` value that makes the browser drop the cookie
    pub fn expire(&self) -> String {
        self.render("", 0)
    }

    fn render(&self, value: &str, max_age: i64) -> String {
        let mut cookie = format!(
            "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite={}",
            self.name,
            value,
            max_age,
            self.same_site.as_str()
        );
        if self.secure {
            cookie.push_str("; Secure");
        }
        cookie
    }
}
