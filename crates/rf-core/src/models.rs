//! # Domain Models
//!
//! These structs represent the core entities of Rusty-Feed.
//! Identities and record ids are opaque archive URLs: each user publishes
//! into their own append-only archive, and the engine only ever treats the
//! origin as a stable key.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// The origin URL of one user's content archive (e.g. `feed://ab12…`).
///
/// Primary key for authors, sources, and follow edges. Stable and opaque:
/// the engine never parses it beyond equality and ordering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(pub String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Empty identities come from unset persisted state; treat as absent.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Identity(s.to_string())
    }
}

/// The full URL of a single record within an archive (origin + path).
///
/// Record paths embed UUIDv7 segments, so the lexicographic order used as
/// a sort tiebreak is consistent with creation order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        RecordId(s.to_string())
    }
}

/// A follow relationship published by the owning archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    pub identity: Identity,
    /// Display name recorded at follow time; may lag the followee's profile.
    pub label: String,
}

/// A user's self-published profile record.
///
/// Mutated only by its owning identity; read (possibly stale) from any
/// indexed source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub identity: Identity,
    pub name: String,
    pub bio: String,
    /// Avatar record path within the owning archive, if one was uploaded.
    pub avatar: Option<String>,
    pub follows: Vec<FollowEdge>,
    /// Read-side annotation relative to the active engine user; never stored.
    #[serde(default, skip_serializing)]
    pub is_current_user: bool,
}

impl Profile {
    /// The followed identities as a deduplicated set.
    pub fn follow_identities(&self) -> HashSet<Identity> {
        self.follows.iter().map(|f| f.identity.clone()).collect()
    }

    pub fn is_following(&self, identity: &Identity) -> bool {
        self.follows.iter().any(|f| &f.identity == identity)
    }
}

/// Vote membership for one subject record, recomputed on read.
///
/// Invariant: the two sets are disjoint. The write path only ever toggles
/// upvotes; `downvoters` exists because the record schema carries it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub upvoters: HashSet<Identity>,
    pub downvoters: HashSet<Identity>,
}

impl VoteTally {
    pub fn up(&self) -> usize {
        self.upvoters.len()
    }

    pub fn down(&self) -> usize {
        self.downvoters.len()
    }

    pub fn score(&self) -> i64 {
        self.up() as i64 - self.down() as i64
    }

    pub fn has_upvoted(&self, identity: &Identity) -> bool {
        self.upvoters.contains(identity)
    }
}

/// A signed preference for one subject record.
///
/// At most one active vote per (voter, subject); rewriting the same polarity
/// toggles it off, so `value` is the post-toggle state (1 = upvote, 0 = none).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vote {
    pub subject: RecordId,
    pub value: u8,
}

/// The fundamental unit of the feed.
///
/// Immutable once authored except for the derived fields (`author_profile`,
/// `votes`, `reply_count`), which the index recomputes on read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub record_id: RecordId,
    pub author: Identity,
    pub body: String,
    pub created_at: DateTime<Utc>,
    /// Record this post replies to; absent on root posts.
    pub thread_parent: Option<RecordId>,
    /// Present when the query requested author hydration.
    pub author_profile: Option<Profile>,
    pub votes: VoteTally,
    pub reply_count: usize,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.thread_parent.is_none()
    }
}

/// A post plus its resolved ancestor chain. Transient read-side composite,
/// never persisted.
#[derive(Debug, Clone)]
pub struct ThreadNode {
    pub post: Post,
    /// `None` at the root of the chain or at a resolution boundary.
    pub parent: Option<Box<ThreadNode>>,
}

impl ThreadNode {
    /// Number of posts in the chain, this one included.
    pub fn depth(&self) -> usize {
        1 + self.parent.as_deref().map_or(0, ThreadNode::depth)
    }

    /// The oldest resolvable ancestor (self when this is a root).
    pub fn root(&self) -> &ThreadNode {
        self.parent.as_deref().map_or(self, ThreadNode::root)
    }
}

/// Parameterization of a feed query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedScope {
    /// Root posts from the current user and everyone they follow.
    Global,
    /// Every post (replies included) by a single author.
    Author(Identity),
}

/// The structured filter handed to the query index.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    /// Author whitelist; empty matches nothing.
    pub authors: Vec<Identity>,
    pub root_only: bool,
    /// Reverse-chronological when set.
    pub reverse: bool,
    pub limit: Option<usize>,
    /// Hydrate author profiles, vote tallies, and reply counts.
    pub hydrate: bool,
}

/// Profile fields writable by `update_profile`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub name: String,
    pub bio: String,
}

/// An avatar image staged for the next profile write.
#[derive(Debug, Clone)]
pub struct AvatarPayload {
    pub data: Vec<u8>,
    /// File extension, e.g. "png".
    pub extension: String,
}

/// A post waiting to be published to the current user's archive.
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub body: String,
    pub reply_to: Option<RecordId>,
}

/// Metadata for provisioning a fresh archive.
#[derive(Debug, Clone)]
pub struct ArchiveMeta {
    pub title: String,
    pub description: String,
}

/// Input to `toggle_follow`: either a full profile or a bare follow edge.
#[derive(Debug, Clone)]
pub enum FollowTarget {
    Profile(Profile),
    Edge(FollowEdge),
}

impl FollowTarget {
    pub fn identity(&self) -> &Identity {
        match self {
            FollowTarget::Profile(p) => &p.identity,
            FollowTarget::Edge(e) => &e.identity,
        }
    }

    /// Display name to record on a new follow edge, when one is known.
    pub fn display_name(&self) -> &str {
        match self {
            FollowTarget::Profile(p) => &p.name,
            FollowTarget::Edge(e) => &e.label,
        }
    }
}
