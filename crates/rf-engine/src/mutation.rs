//! # MutationCoordinator
//!
//! Applies user-initiated writes to the current user's own archive and
//! re-triggers the read path afterward. All mutations are serialized
//! behind one async mutex: the single current-user identity must never
//! see two interleaved writes, or a reload can observe a half-applied
//! pair. Write-path failures are always propagated; nothing here is
//! absorbed the way per-source read failures are.

use rf_core::{
    ArchiveMeta, ArchiveStore, AvatarPayload, FeedError, FollowTarget, Identity, Post, PostDraft,
    ProfileUpdate, QueryIndex, RecordId, Result, StateStore, Vote,
};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use crate::graph::ProfileGraph;

pub struct MutationCoordinator {
    store: Arc<dyn ArchiveStore>,
    index: Arc<dyn QueryIndex>,
    graph: Arc<ProfileGraph>,
    state: Arc<dyn StateStore>,
    /// Serializes all writes against the current identity.
    write_gate: Mutex<()>,
    /// Avatar payload staged for the next profile write.
    staged_avatar: StdMutex<Option<AvatarPayload>>,
}

impl MutationCoordinator {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        index: Arc<dyn QueryIndex>,
        graph: Arc<ProfileGraph>,
        state: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            store,
            index,
            graph,
            state,
            write_gate: Mutex::new(()),
            staged_avatar: StdMutex::new(None),
        }
    }

    /// Stages an avatar image; it is written alongside the next
    /// `update_profile` call and the staging is cleared after that write
    /// attempt regardless of its outcome.
    pub fn stage_avatar(&self, avatar: AvatarPayload) {
        *self.staged_avatar.lock().expect("avatar lock") = Some(avatar);
    }

    /// Writes the profile fields. When no current user exists yet, a fresh
    /// archive is provisioned first: its identity is persisted, made the
    /// current user, and registered as a source before the profile write.
    pub async fn update_profile(&self, update: ProfileUpdate) -> Result<()> {
        let _gate = self.write_gate.lock().await;

        let identity = match self.graph.current_identity().await {
            Some(identity) => identity,
            None => self.provision_identity(&update.name).await?,
        };

        self.store
            .set_profile(&identity, update)
            .await
            .map_err(as_mutation)?;

        let staged = self.staged_avatar.lock().expect("avatar lock").take();
        if let Some(avatar) = staged {
            self.store
                .set_avatar(&identity, avatar)
                .await
                .map_err(as_mutation)?;
        }

        self.graph.reload_profile().await
    }

    /// Follows the target if not followed, unfollows it otherwise. Accepts
    /// either a profile record or a follow edge; a new follow is labeled
    /// with the target's display name when one is known.
    pub async fn toggle_follow(&self, target: &FollowTarget) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let identity = target.identity();
        if self.graph.is_following(identity).await {
            self.graph.unfollow(identity).await
        } else {
            self.graph.follow(identity, target.display_name()).await
        }
    }

    /// Flips the current user's vote on `post` between no-vote and upvote.
    /// The caller's post is patched with a freshly recomputed tally so the
    /// in-memory view reflects the write immediately. Downvoting has no
    /// mutation path; the schema's down set is only ever read.
    pub async fn toggle_vote(&self, post: &mut Post) -> Result<()> {
        let _gate = self.write_gate.lock().await;
        let me = self
            .graph
            .current_identity()
            .await
            .ok_or(FeedError::NoCurrentUser)?;

        let value = if post.votes.has_upvoted(&me) { 0 } else { 1 };
        self.store
            .put_vote(
                &me,
                Vote {
                    subject: post.record_id.clone(),
                    value,
                },
            )
            .await
            .map_err(as_mutation)?;

        post.votes = self.index.count_votes(&post.record_id).await?;
        Ok(())
    }

    /// Appends a post (root or reply) to the current user's archive.
    pub async fn publish_post(&self, draft: PostDraft) -> Result<RecordId> {
        let _gate = self.write_gate.lock().await;
        let me = self
            .graph
            .current_identity()
            .await
            .ok_or(FeedError::NoCurrentUser)?;
        self.store
            .publish_post(&me, draft)
            .await
            .map_err(as_mutation)
    }

    async fn provision_identity(&self, name: &str) -> Result<Identity> {
        let identity = self
            .store
            .create_archive(ArchiveMeta {
                title: format!("Rusty-Feed User: {name}"),
                description: "User profile archive".to_string(),
            })
            .await
            .map_err(as_mutation)?;
        self.state.store_current_identity(&identity).await?;
        self.graph.set_current_user(Some(identity.clone())).await?;
        tracing::info!(%identity, "provisioned a fresh archive for the current user");
        Ok(identity)
    }
}

/// Own-write-path failures surface under the mutation taxonomy.
fn as_mutation(e: FeedError) -> FeedError {
    match e {
        FeedError::Mutation(_) => e,
        other => FeedError::Mutation(other.to_string()),
    }
}
