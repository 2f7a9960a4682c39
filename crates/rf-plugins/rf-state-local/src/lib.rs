//! # rf-state-local
//!
//! Local filesystem implementation of `StateStore`: one JSON file holding
//! the current user's identity. Read once at startup, written when a new
//! identity is provisioned.

use async_trait::async_trait;
use rf_core::{FeedError, Identity, Result, StateStore};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

#[derive(Debug, Default, Serialize, Deserialize)]
struct PersistedState {
    current_identity: Option<Identity>,
}

pub struct LocalStateStore {
    /// Path of the state file (e.g. "./data/state.json").
    path: PathBuf,
}

impl LocalStateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    async fn read_state(&self) -> Result<PersistedState> {
        match fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| FeedError::State(format!("corrupt state file: {e}"))),
            // A missing file is just a first run.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(PersistedState::default()),
            Err(e) => Err(FeedError::State(e.to_string())),
        }
    }

    async fn write_state(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| FeedError::State(e.to_string()))?;
        }
        let bytes = serde_json::to_vec_pretty(state)
            .map_err(|e| FeedError::State(e.to_string()))?;
        fs::write(&self.path, bytes)
            .await
            .map_err(|e| FeedError::State(e.to_string()))
    }
}

#[async_trait]
impl StateStore for LocalStateStore {
    async fn load_current_identity(&self) -> Result<Option<Identity>> {
        let state = self.read_state().await?;
        // Filter out empty identities left by older writes.
        Ok(state.current_identity.filter(|id| !id.is_empty()))
    }

    async fn store_current_identity(&self, identity: &Identity) -> Result<()> {
        let state = PersistedState {
            current_identity: Some(identity.clone()),
        };
        self.write_state(&state).await?;
        tracing::info!(%identity, path = %self.path.display(), "persisted current identity");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("rf-state-{}.json", Uuid::now_v7().simple()))
    }

    #[tokio::test]
    async fn missing_file_reads_as_no_user() {
        let store = LocalStateStore::new(temp_path());
        assert!(store.load_current_identity().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn round_trips_identity() {
        let path = temp_path();
        let store = LocalStateStore::new(path.clone());
        let id = Identity::from("feed://someone");

        store.store_current_identity(&id).await.unwrap();
        assert_eq!(store.load_current_identity().await.unwrap(), Some(id));

        let _ = tokio::fs::remove_file(path).await;
    }
}
