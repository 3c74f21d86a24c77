//! Replay guard for authorization codes.
//!
//! A code is remembered for a bounded window after its first use so a
//! duplicate callback delivery can be short-circuited instead of being
//! re-exchanged (the provider would reject it anyway).

use crate::cache::ExpiringCache;
use chrono::Duration;
use std::sync::Arc;

#[derive(Clone)]
pub struct UsedCodes {
    codes: Arc<ExpiringCache<()>>,
}

impl UsedCodes {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            codes: Arc::new(ExpiringCache::new(ttl, capacity)),
        }
    }

    /// Records `code` as consumed.
    ///
    /// Returns true for the first use inside the window, false for a replay.
    pub fn mark_consumed(&self, code: &str) -> bool {
        self.codes.insert_if_absent(code, ())
    }

    pub fn cleanup_expired(&self) -> usize {
        self.codes.purge_expired()
    }

    pub fn count(&self) -> usize {
        self.codes.len()
    }
}
