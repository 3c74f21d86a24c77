//! In-process credential store. Nothing survives a restart.

use super::{CredentialStore, Credentials};
use anyhow::Result;
use dashmap::DashMap;

#[derive(Default)]
pub struct MemoryCredentialStore {
    records: DashMap<String, Credentials>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, identity: &str) -> Option<Credentials> {
        self.records.get(identity).map(|entry| entry.value().clone())
    }

    fn save(&self, identity: &str, credentials: &Credentials) -> Result<()> {
        self.records
            .insert(identity.to_string(), credentials.clone());
        Ok(())
    }

    fn clear(&self, identity: &str) -> Result<()> {
        self.records.remove(identity);
        Ok(())
    }
}
