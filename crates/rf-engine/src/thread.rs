//! # ThreadResolver
//!
//! Walks a post's parent chain to materialize a full thread. The index
//! fetches single posts; recursing up the ancestry is this module's job.
//! A parent that cannot be found is a thread boundary, not an error, and
//! a visited set caps the walk if a chain ever loops back on itself.

use rf_core::{FeedError, Post, QueryIndex, RecordId, Result, ThreadNode};
use std::collections::HashSet;
use std::sync::Arc;

use crate::graph::ProfileGraph;

pub struct ThreadResolver {
    index: Arc<dyn QueryIndex>,
    graph: Arc<ProfileGraph>,
}

impl ThreadResolver {
    pub fn new(index: Arc<dyn QueryIndex>, graph: Arc<ProfileGraph>) -> Self {
        Self { index, graph }
    }

    /// Resolves the post at `record` together with its ancestor chain.
    /// Returns `None` when the post itself cannot be found. The chain ends
    /// at a root post, at a parent that cannot be found, or at a revisited
    /// record id.
    pub async fn resolve_thread(&self, record: &RecordId) -> Result<Option<ThreadNode>> {
        let Some(head) = self.index.get_post(record).await? else {
            return Ok(None);
        };

        let mut visited: HashSet<RecordId> = HashSet::from([record.clone()]);
        // Leaf first, root-most last.
        let mut chain: Vec<Post> = vec![self.annotate(head).await];

        loop {
            let Some(parent_id) = chain
                .last()
                .and_then(|post| post.thread_parent.clone())
            else {
                break;
            };
            if !visited.insert(parent_id.clone()) {
                tracing::warn!(record = %parent_id, "parent chain revisits a record, stopping");
                break;
            }
            match self.index.get_post(&parent_id).await {
                Ok(Some(parent)) => chain.push(self.annotate(parent).await),
                // Gap in the chain: treat as the top of the thread.
                Ok(None) => break,
                Err(FeedError::SourceUnavailable(source)) => {
                    tracing::warn!(%source, "parent archive unreachable, truncating thread");
                    break;
                }
                Err(e) => return Err(e),
            }
        }

        let mut node: Option<Box<ThreadNode>> = None;
        for post in chain.into_iter().rev() {
            node = Some(Box::new(ThreadNode { post, parent: node }));
        }
        Ok(node.map(|boxed| *boxed))
    }

    /// Marks the author profile when it belongs to the active user.
    async fn annotate(&self, mut post: Post) -> Post {
        if let Some(profile) = post.author_profile.as_mut() {
            let me = self.graph.current_identity().await;
            profile.is_current_user = me.as_ref() == Some(&profile.identity);
        }
        post
    }
}
