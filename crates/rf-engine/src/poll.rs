//! # PollWatcher
//!
//! Periodically probes the active scope for content newer than what is on
//! screen. Detection only ever raises an affordance; the view is never
//! replaced without an explicit acknowledgement, so in-place reading is
//! never disrupted. The timer is an owned, cancellable task with explicit
//! start/stop rather than an ambient interval.

use rf_core::{FeedScope, RecordId};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aggregator::FeedAggregator;

/// Observable watcher state. `Polling` is transient within one tick;
/// `NewContent` is sticky until the baseline is reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Polling,
    NewContent,
}

pub struct PollWatcher {
    aggregator: Arc<FeedAggregator>,
    interval: Duration,
    scope: Mutex<FeedScope>,
    /// Record id of the top post currently rendered; `None` when no feed
    /// has been rendered yet, in which case ticks do nothing.
    baseline: Mutex<Option<RecordId>>,
    state_tx: watch::Sender<PollState>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl PollWatcher {
    pub fn new(aggregator: Arc<FeedAggregator>, interval: Duration) -> Self {
        let (state_tx, _) = watch::channel(PollState::Idle);
        Self {
            aggregator,
            interval,
            scope: Mutex::new(FeedScope::Global),
            baseline: Mutex::new(None),
            state_tx,
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> PollState {
        *self.state_tx.borrow()
    }

    /// Channel for the surrounding layer to observe affordance changes.
    pub fn subscribe(&self) -> watch::Receiver<PollState> {
        self.state_tx.subscribe()
    }

    /// Points the watcher at a new scope without touching the baseline.
    pub fn set_scope(&self, scope: FeedScope) {
        *self.scope.lock().expect("poll scope lock") = scope;
    }

    /// Records what the view currently shows on top and clears any raised
    /// affordance. `None` means nothing is rendered (no comparisons fire).
    pub fn set_baseline(&self, head: Option<RecordId>) {
        *self.baseline.lock().expect("poll baseline lock") = head;
        self.state_tx.send_replace(PollState::Idle);
    }

    /// Spawns the periodic task. Replaces (and cancels) any previous one.
    pub fn start(self: &Arc<Self>) {
        let watcher = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(watcher.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                watcher.tick().await;
            }
        });
        if let Some(previous) = self.task.lock().expect("poll task lock").replace(handle) {
            previous.abort();
        }
    }

    /// Cancels the periodic task. Tied to the engine's lifecycle, not to
    /// process exit.
    pub fn stop(&self) {
        if let Some(handle) = self.task.lock().expect("poll task lock").take() {
            handle.abort();
        }
    }

    /// One probe: compare the scope's newest record against the baseline.
    /// Exposed for deterministic tests; the spawned task calls this on the
    /// cadence.
    pub async fn tick(&self) {
        let Some(baseline) = self.baseline.lock().expect("poll baseline lock").clone() else {
            return;
        };
        if self.state() == PollState::NewContent {
            // Affordance already raised; nothing to add until it is acted on.
            return;
        }

        self.state_tx.send_replace(PollState::Polling);
        let scope = self.scope.lock().expect("poll scope lock").clone();
        match self.aggregator.peek_head(&scope).await {
            Ok(Some(head)) if head != baseline => {
                tracing::debug!(%head, "new content detected");
                self.state_tx.send_replace(PollState::NewContent);
            }
            Ok(_) => {
                self.state_tx.send_replace(PollState::Idle);
            }
            Err(e) => {
                // Probe failures are uninteresting to the view; try again
                // next tick.
                tracing::warn!(error = %e, "poll probe failed");
                self.state_tx.send_replace(PollState::Idle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rf_core::QueryIndex;
    use rf_store_mem::MemStore;

    use crate::graph::ProfileGraph;
    use crate::registry::SourceRegistry;

    fn ts(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    async fn watcher_over(store: &Arc<MemStore>) -> Arc<PollWatcher> {
        let registry = Arc::new(SourceRegistry::new(store.clone()));
        let graph = Arc::new(ProfileGraph::new(store.clone(), registry.clone()));
        let aggregator = Arc::new(FeedAggregator::new(store.clone(), graph, registry));
        Arc::new(PollWatcher::new(aggregator, Duration::from_secs(1)))
    }

    #[tokio::test]
    async fn no_baseline_means_no_affordance() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        store.seed_post(&a, "p", ts(1), None);

        let watcher = watcher_over(&store).await;
        watcher.set_scope(FeedScope::Author(a));
        watcher.tick().await;
        assert_eq!(watcher.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn unchanged_head_stays_idle() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        store.add_source(&a).await.unwrap();
        let top = store.seed_post(&a, "p", ts(1), None);

        let watcher = watcher_over(&store).await;
        watcher.set_scope(FeedScope::Author(a));
        watcher.set_baseline(Some(top));
        watcher.tick().await;
        assert_eq!(watcher.state(), PollState::Idle);
    }

    #[tokio::test]
    async fn changed_head_raises_new_content() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        store.add_source(&a).await.unwrap();
        let top = store.seed_post(&a, "old", ts(1), None);

        let watcher = watcher_over(&store).await;
        watcher.set_scope(FeedScope::Author(a.clone()));
        watcher.set_baseline(Some(top));

        store.seed_post(&a, "newer", ts(2), None);
        watcher.tick().await;
        assert_eq!(watcher.state(), PollState::NewContent);

        // Sticky until the baseline is reset.
        watcher.tick().await;
        assert_eq!(watcher.state(), PollState::NewContent);

        let newest = store.seed_post(&a, "newest", ts(3), None);
        watcher.set_baseline(Some(newest));
        assert_eq!(watcher.state(), PollState::Idle);
        watcher.tick().await;
        assert_eq!(watcher.state(), PollState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn started_task_probes_on_the_cadence() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        store.add_source(&a).await.unwrap();
        let top = store.seed_post(&a, "old", ts(1), None);

        let watcher = watcher_over(&store).await;
        watcher.set_scope(FeedScope::Author(a.clone()));
        watcher.set_baseline(Some(top));
        watcher.start();

        store.seed_post(&a, "newer", ts(2), None);
        let mut rx = watcher.subscribe();
        tokio::time::timeout(Duration::from_secs(5), async {
            while *rx.borrow_and_update() != PollState::NewContent {
                rx.changed().await.unwrap();
            }
        })
        .await
        .expect("watcher never raised the affordance");

        watcher.stop();
    }
}
