//! # Core Traits (Ports)
//!
//! The engine treats the archive layer as opaque collaborators: any plugin
//! must implement these traits to be wired into the binary. The store is
//! assumed eventually-consistent, possibly slow, possibly unreachable on a
//! per-identity basis.

use async_trait::async_trait;
use crate::error::Result;
use crate::models::{
    ArchiveMeta, AvatarPayload, Identity, Post, PostDraft, PostQuery, Profile, ProfileUpdate,
    RecordId, Vote, VoteTally,
};

/// Read/write access to per-identity append-only archives.
///
/// Keyed-record writes are typed out as operations; the engine never
/// composes raw record paths itself.
#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Opens the store. Must be called once before any other operation.
    async fn open(&self) -> Result<()>;

    /// Provisions a fresh archive and returns its new identity.
    async fn create_archive(&self, meta: ArchiveMeta) -> Result<Identity>;

    async fn get_profile(&self, identity: &Identity) -> Result<Option<Profile>>;
    async fn set_profile(&self, identity: &Identity, update: ProfileUpdate) -> Result<()>;
    async fn set_avatar(&self, identity: &Identity, avatar: AvatarPayload) -> Result<()>;

    /// Records a follow edge in `identity`'s own archive. Idempotent.
    async fn add_follow(&self, identity: &Identity, target: &Identity, label: &str) -> Result<()>;
    /// Removes a follow edge from `identity`'s own archive. Idempotent.
    async fn remove_follow(&self, identity: &Identity, target: &Identity) -> Result<()>;

    /// Writes `identity`'s vote record for a subject, replacing any prior one.
    async fn put_vote(&self, identity: &Identity, vote: Vote) -> Result<()>;

    /// Appends a post record to `identity`'s archive.
    async fn publish_post(&self, identity: &Identity, draft: PostDraft) -> Result<RecordId>;
}

/// Structured queries over the set of indexed source archives.
///
/// The index performs the author/vote/reply-count joins itself; the engine
/// only shapes queries and post-processes results (recursive thread-parent
/// resolution is the engine's job, not the index's).
#[async_trait]
pub trait QueryIndex: Send + Sync {
    /// Begins indexing an identity's archive. Idempotent. Fails with
    /// `SourceUnavailable` when the archive cannot be reached; a failed
    /// add leaves the identity unindexed.
    async fn add_source(&self, identity: &Identity) -> Result<()>;

    /// Returns posts matching the query, drawn only from indexed sources.
    /// Fails with `Aggregation` only when the query mechanism itself errors;
    /// an unreachable source simply contributes nothing.
    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>>;

    /// Fetches one hydrated post by record id, from any indexed source.
    async fn get_post(&self, record: &RecordId) -> Result<Option<Post>>;

    /// Recomputes the vote tally for a subject across indexed sources.
    async fn count_votes(&self, subject: &RecordId) -> Result<VoteTally>;
}

/// Durable local state: a single key holding the current user's identity,
/// read once at startup and written when a new identity is provisioned.
#[async_trait]
pub trait StateStore: Send + Sync {
    async fn load_current_identity(&self) -> Result<Option<Identity>>;
    async fn store_current_identity(&self, identity: &Identity) -> Result<()>;
}

/// Notification boundary: invoked after any state-changing operation so the
/// surrounding layer can re-render. The engine does not prescribe how.
pub trait RenderHook: Send + Sync {
    fn render(&self);
}

/// A hook that does nothing; useful for tests and headless assemblies.
pub struct NoopRenderHook;

impl RenderHook for NoopRenderHook {
    fn render(&self) {}
}
