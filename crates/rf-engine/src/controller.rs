//! # ViewStateController
//!
//! Top-level orchestrator: maps a navigation target onto the engine
//! operations and holds the resulting view state for rendering. Every
//! navigation stamps a generation token; a load that resolves after a
//! newer navigation has started is discarded instead of clobbering the
//! fresher view.

use rf_core::{
    ArchiveStore, FeedScope, Identity, Post, Profile, RecordId, RenderHook, Result, StateStore,
    ThreadNode,
};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::aggregator::{join_logged, FeedAggregator};
use crate::graph::ProfileGraph;
use crate::poll::PollWatcher;
use crate::registry::SourceRegistry;
use crate::thread::ThreadResolver;

/// Navigation targets, matching the application's routes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum View {
    /// The aggregated home feed.
    Feed,
    /// All posts by one author.
    User(Identity),
    /// A single post with its ancestor chain.
    Thread(RecordId),
    /// The profile editor; loads nothing.
    Edit,
}

/// One feed row: the post plus the resolved ancestor context reply rows
/// carry in profile scope.
#[derive(Debug, Clone)]
pub struct FeedItem {
    pub post: Post,
    pub parent_context: Option<ThreadNode>,
}

/// Everything the rendering layer reads.
#[derive(Debug, Clone)]
pub struct ViewState {
    pub view: View,
    pub feed: Vec<FeedItem>,
    pub viewed_profile: Option<Profile>,
    pub viewed_thread: Option<ThreadNode>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            view: View::Feed,
            feed: Vec::new(),
            viewed_profile: None,
            viewed_thread: None,
        }
    }
}

pub struct ViewStateController {
    store: Arc<dyn ArchiveStore>,
    state_store: Arc<dyn StateStore>,
    registry: Arc<SourceRegistry>,
    graph: Arc<ProfileGraph>,
    aggregator: Arc<FeedAggregator>,
    resolver: Arc<ThreadResolver>,
    poll: Arc<PollWatcher>,
    render: Arc<dyn RenderHook>,
    state: RwLock<ViewState>,
    /// Bumped on every navigation; stale loads check it before committing.
    generation: AtomicU64,
}

impl ViewStateController {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        state_store: Arc<dyn StateStore>,
        registry: Arc<SourceRegistry>,
        graph: Arc<ProfileGraph>,
        aggregator: Arc<FeedAggregator>,
        resolver: Arc<ThreadResolver>,
        poll: Arc<PollWatcher>,
        render: Arc<dyn RenderHook>,
    ) -> Self {
        Self {
            store,
            state_store,
            registry,
            graph,
            aggregator,
            resolver,
            poll,
            render,
            state: RwLock::new(ViewState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Startup sequence: open the store, restore the persisted user, index
    /// everyone they follow (partial fan-out, dead peers logged and
    /// skipped), land on the feed, start polling.
    pub async fn setup(&self) -> Result<()> {
        self.store.open().await?;

        let persisted = self.state_store.load_current_identity().await?;
        self.graph.set_current_user(persisted).await?;

        if let Some(profile) = self.graph.current_profile().await {
            let follows = profile.follow_identities();
            join_logged(
                "index followed sources",
                follows
                    .iter()
                    .map(|identity| self.registry.add_source(identity)),
            )
            .await;
        }

        self.navigate(View::Feed).await?;
        self.poll.start();
        Ok(())
    }

    /// Loads the target view and commits it, unless a newer navigation
    /// started while the loads were in flight.
    pub async fn navigate(&self, view: View) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut next = ViewState {
            view: view.clone(),
            ..ViewState::default()
        };
        match &view {
            View::Feed => {
                next.feed = self.load_feed(&FeedScope::Global).await?;
            }
            View::User(identity) => {
                next.viewed_profile = self.load_viewed_profile(identity).await;
                next.feed = self.load_feed(&FeedScope::Author(identity.clone())).await?;
            }
            View::Thread(record) => {
                next.viewed_thread = self.resolver.resolve_thread(record).await?;
            }
            View::Edit => {}
        }

        self.commit(generation, next).await;
        Ok(())
    }

    /// Re-runs the active view's loads. This is the action behind the
    /// new-content affordance.
    pub async fn refresh(&self) -> Result<()> {
        let view = self.state.read().await.view.clone();
        self.navigate(view).await
    }

    /// Snapshot of the current view state.
    pub async fn view_state(&self) -> ViewState {
        self.state.read().await.clone()
    }

    /// The generation check happens under the state write lock: a stale
    /// load that queues on the lock behind a newer commit still gets
    /// discarded once it acquires it.
    async fn commit(&self, generation: u64, next: ViewState) {
        let mut state = self.state.write().await;
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(view = ?next.view, "discarding superseded navigation");
            return;
        }
        match &next.view {
            View::Feed => {
                self.poll.set_scope(FeedScope::Global);
                self.poll
                    .set_baseline(next.feed.first().map(|item| item.post.record_id.clone()));
            }
            View::User(identity) => {
                self.poll.set_scope(FeedScope::Author(identity.clone()));
                self.poll
                    .set_baseline(next.feed.first().map(|item| item.post.record_id.clone()));
            }
            // No feed rendered: the watcher has nothing to compare against.
            View::Thread(_) | View::Edit => self.poll.set_baseline(None),
        }
        *state = next;
        drop(state);
        self.render.render();
    }

    /// Lists the scope's posts and resolves ancestor context for reply
    /// rows. Context resolution fans out concurrently; a failed branch
    /// leaves that row without context rather than failing the page.
    async fn load_feed(&self, scope: &FeedScope) -> Result<Vec<FeedItem>> {
        let posts = self.aggregator.list_posts(scope).await?;
        let branches = posts.into_iter().map(|post| async move {
            let parent_context = match &post.thread_parent {
                Some(parent) => match self.resolver.resolve_thread(parent).await {
                    Ok(context) => context,
                    Err(e) => {
                        tracing::warn!(record = %parent, error = %e, "could not resolve parent context");
                        None
                    }
                },
                None => None,
            };
            Ok(FeedItem {
                post,
                parent_context,
            })
        });
        // Branches absorb their own failures; the join is for concurrency.
        Ok(join_logged("feed ancestor context", branches).await)
    }

    /// A remote profile that cannot be read degrades to an absent header,
    /// not a failed navigation.
    async fn load_viewed_profile(&self, identity: &Identity) -> Option<Profile> {
        match self.store.get_profile(identity).await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(%identity, error = %e, "could not load viewed profile");
                None
            }
        }
    }
}
