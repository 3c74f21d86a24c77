//! OAuth `state` nonces for CSRF protection.

use crate::cache::ExpiringCache;
use chrono::Duration;
use rand::RngCore;
use std::fmt::Write;
use std::sync::Arc;

/// Issued state nonces, each valid once for `ttl`.
#[derive(Clone)]
pub struct StateManager {
    states: Arc<ExpiringCache<()>>,
}

impl StateManager {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            states: Arc::new(ExpiringCache::new(ttl, capacity)),
        }
    }

    /// Generate a new state nonce (12 random bytes, hex) and remember it
    pub fn create_state(&self) -> String {
        let mut bytes = [0u8; 12];
        rand::thread_rng().fill_bytes(&mut bytes);

        let state = bytes.iter().fold(String::with_capacity(24), |mut out, b| {
            let _ = write!(out, "{:02x}", b);
            out
        });

        self.states.insert(state.clone(), ());
        state
    }

    /// True if `state` was issued and has not expired. Consumes it.
    pub fn validate_and_consume(&self, state: &str) -> bool {
        self.states.take(state).is_some()
    }

    pub fn cleanup_expired(&self) -> usize {
        self.states.purge_expired()
    }

    pub fn count(&self) -> usize {
        self.states.len()
    }
}
