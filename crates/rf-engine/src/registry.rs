//! # SourceRegistry
//!
//! Tracks which identities are currently indexed for querying. The set is
//! owned by the engine instance and grows lazily; there is no removal in
//! this scope. Registration failures are surfaced for logging, never as
//! a crash: an unreachable identity simply stays unindexed.

use dashmap::DashSet;
use rf_core::{Identity, QueryIndex, Result};
use std::sync::Arc;

pub struct SourceRegistry {
    index: Arc<dyn QueryIndex>,
    indexed: DashSet<Identity>,
}

impl SourceRegistry {
    pub fn new(index: Arc<dyn QueryIndex>) -> Self {
        Self {
            index,
            indexed: DashSet::new(),
        }
    }

    /// Local membership test; no I/O.
    pub fn is_source(&self, identity: &Identity) -> bool {
        self.indexed.contains(identity)
    }

    /// Registers an identity for querying. Idempotent: an already-registered
    /// identity resolves immediately. The identity is recorded only after
    /// the index accepts it, so a failed add leaves `is_source` false.
    pub async fn add_source(&self, identity: &Identity) -> Result<()> {
        if self.indexed.contains(identity) {
            return Ok(());
        }
        self.index.add_source(identity).await?;
        self.indexed.insert(identity.clone());
        Ok(())
    }
}
