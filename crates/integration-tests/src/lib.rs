//! Shared fixtures for the integration test suites: a fully wired engine
//! over the in-memory archive network and a temp-file state store.

use rf_core::{Identity, NoopRenderHook, StateStore};
use rf_engine::FeedEngine;
use rf_state_local::LocalStateStore;
use rf_store_mem::MemStore;
use std::path::PathBuf;
use std::sync::Arc;

pub struct TestHarness {
    pub store: Arc<MemStore>,
    pub state: Arc<LocalStateStore>,
    pub engine: FeedEngine,
    state_path: PathBuf,
}

impl TestHarness {
    /// Engine over a fresh archive network with no persisted user.
    pub fn new() -> Self {
        let state_path = std::env::temp_dir().join(format!(
            "rf-it-{}.json",
            uuid::Uuid::now_v7().simple()
        ));
        Self::over(Arc::new(MemStore::new()), state_path)
    }

    /// Engine over an existing network and state file; models a restart.
    pub fn over(store: Arc<MemStore>, state_path: PathBuf) -> Self {
        let state = Arc::new(LocalStateStore::new(state_path.clone()));
        let engine = FeedEngine::new(
            store.clone(),
            store.clone(),
            state.clone(),
            Arc::new(NoopRenderHook),
        );
        Self {
            store,
            state,
            engine,
            state_path,
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_path.clone()
    }

    /// Persists an identity as the returning user, as a prior session
    /// would have.
    pub async fn persist_user(&self, identity: &Identity) {
        self.state
            .store_current_identity(identity)
            .await
            .expect("persist identity");
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for TestHarness {
    fn drop(&mut self) {
        // State files are uniquely named under the temp dir; restarts in
        // the restart scenarios reuse them, so they are not removed here.
        self.engine.shutdown();
    }
}
