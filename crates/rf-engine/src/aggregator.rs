//! # FeedAggregator
//!
//! Shapes scoped queries against the indexed sources and normalizes the
//! results. The index does the author/vote/reply-count joins; the engine
//! enforces the ordering contract on top: reverse-chronological, ties
//! broken by record id descending, so two calls over the same data always
//! agree.

use futures_util::future::join_all;
use rf_core::{FeedError, FeedScope, Post, PostQuery, QueryIndex, RecordId, Result};
use std::future::Future;
use std::sync::Arc;

use crate::graph::ProfileGraph;
use crate::registry::SourceRegistry;

pub struct FeedAggregator {
    index: Arc<dyn QueryIndex>,
    graph: Arc<ProfileGraph>,
    registry: Arc<SourceRegistry>,
}

impl FeedAggregator {
    pub fn new(
        index: Arc<dyn QueryIndex>,
        graph: Arc<ProfileGraph>,
        registry: Arc<SourceRegistry>,
    ) -> Self {
        Self {
            index,
            graph,
            registry,
        }
    }

    /// Lists posts for a scope, fully hydrated and deterministically
    /// ordered. Global scope covers root posts from the author whitelist;
    /// author scope covers every post by that author, replies included.
    ///
    /// Fails only when the query mechanism itself errors. A source that
    /// cannot be reached just contributes nothing.
    pub async fn list_posts(&self, scope: &FeedScope) -> Result<Vec<Post>> {
        let query = self.scope_query(scope, None, true).await;
        let mut posts = self.index.list_posts(&query).await?;
        posts.sort_by(|a, b| {
            (b.created_at, &b.record_id).cmp(&(a.created_at, &a.record_id))
        });
        Ok(posts)
    }

    /// The narrow probe used by the poll watcher: newest record id in the
    /// scope, without hydration.
    pub async fn peek_head(&self, scope: &FeedScope) -> Result<Option<RecordId>> {
        let query = self.scope_query(scope, Some(1), false).await;
        let posts = self.index.list_posts(&query).await?;
        Ok(posts.into_iter().next().map(|p| p.record_id))
    }

    async fn scope_query(
        &self,
        scope: &FeedScope,
        limit: Option<usize>,
        hydrate: bool,
    ) -> PostQuery {
        match scope {
            FeedScope::Global => PostQuery {
                authors: self.graph.author_whitelist().await,
                root_only: true,
                reverse: true,
                limit,
                hydrate,
            },
            FeedScope::Author(identity) => {
                // Viewing a profile is what grows the source set over time.
                if let Err(e) = self.registry.add_source(identity).await {
                    tracing::warn!(author = %identity, error = %e, "author archive unreachable, feed will be empty");
                }
                PostQuery {
                    authors: vec![identity.clone()],
                    root_only: false,
                    reverse: true,
                    limit,
                    hydrate,
                }
            }
        }
    }
}

/// Joins fan-out branches with partial success: one dead branch cannot
/// blank the whole batch. Errors come back alongside the results so the
/// caller can log them.
pub async fn join_partial<T, F>(branches: impl IntoIterator<Item = F>) -> (Vec<T>, Vec<FeedError>)
where
    F: Future<Output = Result<T>>,
{
    let mut results = Vec::new();
    let mut errors = Vec::new();
    for outcome in join_all(branches).await {
        match outcome {
            Ok(value) => results.push(value),
            Err(e) => errors.push(e),
        }
    }
    (results, errors)
}

/// Convenience used at absorption boundaries: log every branch error at
/// warn level and keep the successes.
pub async fn join_logged<T, F>(context: &str, branches: impl IntoIterator<Item = F>) -> Vec<T>
where
    F: Future<Output = Result<T>>,
{
    let (results, errors) = join_partial(branches).await;
    for e in errors {
        tracing::warn!(context, error = %e, "fan-out branch failed");
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use mockall::mock;
    use rf_core::{ArchiveStore, Identity, VoteTally};
    use rf_store_mem::MemStore;

    mock! {
        Index {}

        #[async_trait]
        impl QueryIndex for Index {
            async fn add_source(&self, identity: &Identity) -> Result<()>;
            async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;
            async fn get_post(&self, record: &RecordId) -> Result<Option<Post>>;
            async fn count_votes(&self, subject: &RecordId) -> Result<VoteTally>;
        }
    }

    fn ts(secs: i64) -> chrono::DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    async fn engine_parts(
        store: &Arc<MemStore>,
    ) -> (Arc<SourceRegistry>, Arc<ProfileGraph>, FeedAggregator) {
        let registry = Arc::new(SourceRegistry::new(store.clone()));
        let graph = Arc::new(ProfileGraph::new(store.clone(), registry.clone()));
        let aggregator = FeedAggregator::new(store.clone(), graph.clone(), registry.clone());
        (registry, graph, aggregator)
    }

    #[tokio::test]
    async fn global_scope_merges_followed_feeds_in_order() {
        let store = Arc::new(MemStore::new());
        let me = store.seed_archive("U", "");
        let a = store.seed_archive("A", "");
        let b = store.seed_archive("B", "");
        store.seed_follow(&me, &a, "A");
        store.seed_follow(&me, &b, "B");

        let a1 = store.seed_post(&a, "a1", ts(1), None);
        let b1 = store.seed_post(&b, "b1", ts(2), None);
        let a2 = store.seed_post(&a, "a2", ts(3), None);

        let (registry, graph, aggregator) = engine_parts(&store).await;
        graph.set_current_user(Some(me)).await.unwrap();
        registry.add_source(&a).await.unwrap();
        registry.add_source(&b).await.unwrap();

        let posts = aggregator.list_posts(&FeedScope::Global).await.unwrap();
        let ids: Vec<_> = posts.iter().map(|p| p.record_id.clone()).collect();
        assert_eq!(ids, vec![a2, b1, a1]);
    }

    #[tokio::test]
    async fn global_scope_excludes_replies_and_strangers() {
        let store = Arc::new(MemStore::new());
        let me = store.seed_archive("U", "");
        let a = store.seed_archive("A", "");
        let stranger = store.seed_archive("S", "");
        store.seed_follow(&me, &a, "A");

        let root = store.seed_post(&a, "root", ts(1), None);
        store.seed_post(&a, "reply", ts(2), Some(root));
        store.seed_post(&stranger, "noise", ts(3), None);

        let (registry, graph, aggregator) = engine_parts(&store).await;
        graph.set_current_user(Some(me)).await.unwrap();
        registry.add_source(&a).await.unwrap();
        // The stranger is even indexed; the whitelist still excludes them.
        registry.add_source(&stranger).await.unwrap();

        let posts = aggregator.list_posts(&FeedScope::Global).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].body, "root");
    }

    #[tokio::test]
    async fn author_scope_includes_replies_and_registers_lazily() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        let root = store.seed_post(&a, "root", ts(1), None);
        store.seed_post(&a, "reply", ts(2), Some(root));

        let (registry, _graph, aggregator) = engine_parts(&store).await;
        assert!(!registry.is_source(&a));

        let posts = aggregator
            .list_posts(&FeedScope::Author(a.clone()))
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
        assert!(registry.is_source(&a));
        // Newest first.
        assert_eq!(posts[0].body, "reply");
    }

    #[tokio::test]
    async fn unreachable_author_degrades_to_empty_not_error() {
        let store = Arc::new(MemStore::new());
        let ghost = store.seed_archive("Ghost", "");
        store.seed_post(&ghost, "unseen", ts(1), None);
        store.set_unreachable(&ghost, true);

        let (_registry, _graph, aggregator) = engine_parts(&store).await;
        let posts = aggregator
            .list_posts(&FeedScope::Author(ghost))
            .await
            .unwrap();
        assert!(posts.is_empty());
    }

    #[tokio::test]
    async fn index_failure_surfaces_as_aggregation_error() {
        let store = Arc::new(MemStore::new());
        let mut index = MockIndex::new();
        index
            .expect_list_posts()
            .returning(|_| Err(FeedError::Aggregation("index offline".into())));
        let index: Arc<dyn QueryIndex> = Arc::new(index);

        let registry = Arc::new(SourceRegistry::new(index.clone()));
        let graph = Arc::new(ProfileGraph::new(
            store.clone() as Arc<dyn ArchiveStore>,
            registry.clone(),
        ));
        let aggregator = FeedAggregator::new(index, graph, registry);

        let err = aggregator.list_posts(&FeedScope::Global).await.unwrap_err();
        assert!(matches!(err, FeedError::Aggregation(_)));
    }

    #[tokio::test]
    async fn peek_head_returns_newest_record() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        store.seed_post(&a, "old", ts(1), None);
        let newest = store.seed_post(&a, "new", ts(2), None);

        let (_registry, _graph, aggregator) = engine_parts(&store).await;
        let head = aggregator
            .peek_head(&FeedScope::Author(a))
            .await
            .unwrap();
        assert_eq!(head, Some(newest));
    }

    #[tokio::test]
    async fn join_partial_keeps_successes() {
        let branches = (0..4).map(|i| async move {
            if i % 2 == 0 {
                Ok(i)
            } else {
                Err(FeedError::SourceUnavailable(format!("branch {i}")))
            }
        });
        let (results, errors) = join_partial(branches).await;
        assert_eq!(results, vec![0, 2]);
        assert_eq!(errors.len(), 2);
    }
}
