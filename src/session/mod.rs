//! Per-browser session markers.
//!
//! A session maps an opaque cookie value to the identity the browser has
//! completed authorization for. The credential store says "this server
//! holds tokens for X"; a session says "this browser may drive X".

mod cookie;

pub use cookie::{extract_cookie, SessionCookie};

use crate::cache::ExpiringCache;
use chrono::Duration;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<ExpiringCache<String>>,
}

impl SessionStore {
    pub fn new(max_age: Duration, capacity: usize) -> Self {
        Self {
            sessions: Arc::new(ExpiringCache::new(max_age, capacity)),
        }
    }

    /// Opens a session bound to `identity` and returns its id.
    pub fn create(&self, identity: &str) -> String {
        let session_id = Uuid::new_v4().to_string();
        self.sessions.insert(session_id.clone(), identity.to_string());
        session_id
    }

    pub fn identity_for(&self, session_id: &str) -> Option<String> {
        self.sessions.get(session_id)
    }

    pub fn destroy(&self, session_id: &str) -> bool {
        self.sessions.remove(session_id).is_some()
    }

    /// Drops every session bound to `identity`. Returns how many were dropped.
    pub fn revoke_identity(&self, identity: &str) -> usize {
        self.sessions.retain(|bound| bound != identity)
    }

    pub fn cleanup_expired(&self) -> usize {
        self.sessions.purge_expired()
    }

    pub fn count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SessionStore {
        SessionStore::new(Duration::days(7), 100)
    }

    #[test]
    fn test_create_and_lookup() {
        let sessions = store();
        let sid = sessions.create("default");

        assert_eq!(sessions.identity_for(&sid).as_deref(), Some("default"));
        assert!(sessions.identity_for("unknown").is_none());
    }

    #[test]
    fn test_session_ids_are_unique() {
        let sessions = store();
        assert_ne!(sessions.create("default"), sessions.create("default"));
    }

    #[test]
    fn test_destroy() {
        let sessions = store();
        let sid = sessions.create("default");

        assert!(sessions.destroy(&sid));
        assert!(sessions.identity_for(&sid).is_none());
        assert!(!sessions.destroy(&sid));
    }

    #[test]
    fn test_revoke_identity_drops_all_its_browsers() {
        let sessions = store();
        let laptop = sessions.create("default");
        let phone = sessions.create("default");
        let other = sessions.create("someone-else");

        assert_eq!(sessions.revoke_identity("default"), 2);
        assert!(sessions.identity_for(&laptop).is_none());
        assert!(sessions.identity_for(&phone).is_none());
        assert!(sessions.identity_for(&other).is_some());
    }

    #[test]
    fn test_expired_session_is_gone() {
        let sessions = SessionStore::new(Duration::seconds(-1), 10);
        let sid = sessions.create("default");
        assert!(sessions.identity_for(&sid).is_none());
    }
}
