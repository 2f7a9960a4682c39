//! rusty-feed/crates/rf-engine/src/lib.rs
//!
//! The feed and social-graph aggregation engine. Wires the component
//! modules over whatever `ArchiveStore`/`QueryIndex`/`StateStore` plugins
//! the binary provides.

pub mod aggregator;
pub mod controller;
pub mod graph;
pub mod mutation;
pub mod poll;
pub mod registry;
pub mod thread;

pub use aggregator::FeedAggregator;
pub use controller::{FeedItem, View, ViewState, ViewStateController};
pub use graph::ProfileGraph;
pub use mutation::MutationCoordinator;
pub use poll::{PollState, PollWatcher};
pub use registry::SourceRegistry;
pub use thread::ThreadResolver;

use rf_core::{ArchiveStore, QueryIndex, RenderHook, StateStore};
use std::sync::Arc;
use std::time::Duration;

/// Reference poll cadence.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// One assembled engine instance: every component wired over shared plugin
/// handles. The source registry is owned here, per instance; there is no
/// ambient global registry.
pub struct FeedEngine {
    pub registry: Arc<SourceRegistry>,
    pub graph: Arc<ProfileGraph>,
    pub aggregator: Arc<FeedAggregator>,
    pub resolver: Arc<ThreadResolver>,
    pub poll: Arc<PollWatcher>,
    pub mutations: Arc<MutationCoordinator>,
    pub controller: Arc<ViewStateController>,
}

impl FeedEngine {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        index: Arc<dyn QueryIndex>,
        state: Arc<dyn StateStore>,
        render: Arc<dyn RenderHook>,
    ) -> Self {
        Self::with_poll_interval(store, index, state, render, DEFAULT_POLL_INTERVAL)
    }

    pub fn with_poll_interval(
        store: Arc<dyn ArchiveStore>,
        index: Arc<dyn QueryIndex>,
        state: Arc<dyn StateStore>,
        render: Arc<dyn RenderHook>,
        poll_interval: Duration,
    ) -> Self {
        let registry = Arc::new(SourceRegistry::new(index.clone()));
        let graph = Arc::new(ProfileGraph::new(store.clone(), registry.clone()));
        let aggregator = Arc::new(FeedAggregator::new(
            index.clone(),
            graph.clone(),
            registry.clone(),
        ));
        let resolver = Arc::new(ThreadResolver::new(index.clone(), graph.clone()));
        let poll = Arc::new(PollWatcher::new(aggregator.clone(), poll_interval));
        let mutations = Arc::new(MutationCoordinator::new(
            store.clone(),
            index,
            graph.clone(),
            state.clone(),
        ));
        let controller = Arc::new(ViewStateController::new(
            store,
            state,
            registry.clone(),
            graph.clone(),
            aggregator.clone(),
            resolver.clone(),
            poll.clone(),
            render,
        ));
        Self {
            registry,
            graph,
            aggregator,
            resolver,
            poll,
            mutations,
            controller,
        }
    }

    /// Stops background work. The engine stays usable; `setup` restarts
    /// the watcher.
    pub fn shutdown(&self) {
        self.poll.stop();
    }
}
