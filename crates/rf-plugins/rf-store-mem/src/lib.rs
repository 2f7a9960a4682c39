//! # rf-store-mem
//!
//! In-memory implementation of the `ArchiveStore` and `QueryIndex` ports.
//! Backs the demo binary and the integration tests. Each archive can be
//! flagged unreachable to exercise the engine's degraded-source paths:
//! an unreachable archive refuses `add_source`, profile reads, and writes,
//! and contributes nothing to query results.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use rf_core::{
    ArchiveMeta, ArchiveStore, AvatarPayload, FeedError, FollowEdge, Identity, Post, PostDraft,
    PostQuery, Profile, ProfileUpdate, QueryIndex, RecordId, Result, Vote, VoteTally,
};
use std::collections::HashMap;
use uuid::Uuid;

/// One user's append-only archive, as the store models it.
#[derive(Debug, Default)]
struct Archive {
    name: String,
    bio: String,
    avatar: Option<String>,
    follows: Vec<FollowEdge>,
    posts: Vec<StoredPost>,
    /// Active vote per subject; 0 means toggled off, 1 means upvote.
    votes: HashMap<RecordId, u8>,
    /// Simulates a dead peer. The data stays, the archive stops answering.
    unreachable: bool,
}

#[derive(Debug, Clone)]
struct StoredPost {
    record_id: RecordId,
    body: String,
    created_at: DateTime<Utc>,
    reply_to: Option<RecordId>,
}

/// In-memory archive network plus query index.
#[derive(Default)]
pub struct MemStore {
    archives: DashMap<Identity, Archive>,
    /// Identities whose records are visible to queries.
    indexed: DashSet<Identity>,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds an archive with a profile, bypassing reachability checks.
    /// Returns the new identity.
    pub fn seed_archive(&self, name: &str, bio: &str) -> Identity {
        let identity = mint_identity();
        let mut archive = Archive::default();
        archive.name = name.to_string();
        archive.bio = bio.to_string();
        self.archives.insert(identity.clone(), archive);
        identity
    }

    /// Seeds a post with an explicit timestamp, for deterministic ordering
    /// in tests and demo data.
    pub fn seed_post(
        &self,
        identity: &Identity,
        body: &str,
        created_at: DateTime<Utc>,
        reply_to: Option<RecordId>,
    ) -> RecordId {
        let record_id = mint_record_id(identity);
        let mut archive = self
            .archives
            .entry(identity.clone())
            .or_default();
        archive.posts.push(StoredPost {
            record_id: record_id.clone(),
            body: body.to_string(),
            created_at,
            reply_to,
        });
        record_id
    }

    /// Seeds a follow edge directly into an archive.
    pub fn seed_follow(&self, identity: &Identity, target: &Identity, label: &str) {
        if let Some(mut archive) = self.archives.get_mut(identity) {
            archive.follows.push(FollowEdge {
                identity: target.clone(),
                label: label.to_string(),
            });
        }
    }

    /// Rewrites a stored post's parent link. Violates append-only on
    /// purpose: lets tests fabricate the malformed chains a hostile peer
    /// could publish.
    pub fn seed_parent_link(&self, record: &RecordId, parent: Option<RecordId>) {
        for mut entry in self.archives.iter_mut() {
            if let Some(post) = entry.posts.iter_mut().find(|p| &p.record_id == record) {
                post.reply_to = parent;
                return;
            }
        }
    }

    /// Flips the reachability of one archive.
    pub fn set_unreachable(&self, identity: &Identity, unreachable: bool) {
        if let Some(mut archive) = self.archives.get_mut(identity) {
            archive.unreachable = unreachable;
        }
    }

    pub fn is_indexed(&self, identity: &Identity) -> bool {
        self.indexed.contains(identity)
    }

    /// Number of archives in the network, created and seeded alike.
    pub fn archive_count(&self) -> usize {
        self.archives.len()
    }

    /// Builds the profile view of an archive, follows included.
    fn profile_of(&self, identity: &Identity) -> Option<Profile> {
        self.archives.get(identity).map(|archive| Profile {
            identity: identity.clone(),
            name: archive.name.clone(),
            bio: archive.bio.clone(),
            avatar: archive.avatar.clone(),
            follows: archive.follows.clone(),
            is_current_user: false,
        })
    }

    /// Counts replies to a record across indexed, reachable archives.
    fn reply_count(&self, subject: &RecordId) -> usize {
        self.indexed_snapshot()
            .iter()
            .filter_map(|id| self.archives.get(id))
            .filter(|archive| !archive.unreachable)
            .map(|archive| {
                archive
                    .posts
                    .iter()
                    .filter(|p| p.reply_to.as_ref() == Some(subject))
                    .count()
            })
            .sum()
    }

    fn tally_votes(&self, subject: &RecordId) -> VoteTally {
        let mut tally = VoteTally::default();
        for id in self.indexed_snapshot() {
            if let Some(archive) = self.archives.get(&id) {
                if archive.unreachable {
                    continue;
                }
                if archive.votes.get(subject) == Some(&1) {
                    tally.upvoters.insert(id.clone());
                }
            }
        }
        tally
    }

    /// Snapshot of the indexed set; keeps scans from holding shard locks
    /// across nested lookups.
    fn indexed_snapshot(&self) -> Vec<Identity> {
        self.indexed.iter().map(|id| id.key().clone()).collect()
    }

    fn hydrate(&self, author: &Identity, stored: &StoredPost, hydrate: bool) -> Post {
        let (author_profile, votes, reply_count) = if hydrate {
            (
                self.profile_of(author),
                self.tally_votes(&stored.record_id),
                self.reply_count(&stored.record_id),
            )
        } else {
            (None, VoteTally::default(), 0)
        };
        Post {
            record_id: stored.record_id.clone(),
            author: author.clone(),
            body: stored.body.clone(),
            created_at: stored.created_at,
            thread_parent: stored.reply_to.clone(),
            author_profile,
            votes,
            reply_count,
        }
    }

    /// Fails when the archive is missing or not answering.
    fn check_reachable(&self, identity: &Identity) -> Result<()> {
        match self.archives.get(identity) {
            Some(archive) if archive.unreachable => {
                Err(FeedError::SourceUnavailable(identity.to_string()))
            }
            Some(_) => Ok(()),
            None => Err(FeedError::SourceUnavailable(identity.to_string())),
        }
    }
}

fn mint_identity() -> Identity {
    Identity(format!("feed://{}", Uuid::now_v7().simple()))
}

/// UUIDv7 path segments keep lexicographic record order time-consistent.
fn mint_record_id(identity: &Identity) -> RecordId {
    RecordId(format!("{}/posts/{}.json", identity, Uuid::now_v7().simple()))
}

#[async_trait]
impl ArchiveStore for MemStore {
    async fn open(&self) -> Result<()> {
        tracing::debug!(archives = self.archives.len(), "memory store opened");
        Ok(())
    }

    async fn create_archive(&self, meta: ArchiveMeta) -> Result<Identity> {
        let identity = mint_identity();
        let mut archive = Archive::default();
        archive.name = meta.title;
        archive.bio = meta.description;
        self.archives.insert(identity.clone(), archive);
        Ok(identity)
    }

    async fn get_profile(&self, identity: &Identity) -> Result<Option<Profile>> {
        self.check_reachable(identity)?;
        Ok(self.profile_of(identity))
    }

    async fn set_profile(&self, identity: &Identity, update: ProfileUpdate) -> Result<()> {
        self.check_reachable(identity)?;
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        archive.name = update.name;
        archive.bio = update.bio;
        Ok(())
    }

    async fn set_avatar(&self, identity: &Identity, avatar: AvatarPayload) -> Result<()> {
        self.check_reachable(identity)?;
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        archive.avatar = Some(format!("{}/avatar.{}", identity, avatar.extension));
        Ok(())
    }

    async fn add_follow(&self, identity: &Identity, target: &Identity, label: &str) -> Result<()> {
        self.check_reachable(identity)?;
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        if !archive.follows.iter().any(|f| &f.identity == target) {
            archive.follows.push(FollowEdge {
                identity: target.clone(),
                label: label.to_string(),
            });
        }
        Ok(())
    }

    async fn remove_follow(&self, identity: &Identity, target: &Identity) -> Result<()> {
        self.check_reachable(identity)?;
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        archive.follows.retain(|f| &f.identity != target);
        Ok(())
    }

    async fn put_vote(&self, identity: &Identity, vote: Vote) -> Result<()> {
        self.check_reachable(identity)?;
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        archive.votes.insert(vote.subject, vote.value);
        Ok(())
    }

    async fn publish_post(&self, identity: &Identity, draft: PostDraft) -> Result<RecordId> {
        self.check_reachable(identity)?;
        let record_id = mint_record_id(identity);
        let mut archive = self
            .archives
            .get_mut(identity)
            .ok_or_else(|| FeedError::NotFound("archive".into(), identity.to_string()))?;
        archive.posts.push(StoredPost {
            record_id: record_id.clone(),
            body: draft.body,
            created_at: Utc::now(),
            reply_to: draft.reply_to,
        });
        Ok(record_id)
    }
}

#[async_trait]
impl QueryIndex for MemStore {
    async fn add_source(&self, identity: &Identity) -> Result<()> {
        if self.indexed.contains(identity) {
            return Ok(());
        }
        self.check_reachable(identity)?;
        self.indexed.insert(identity.clone());
        Ok(())
    }

    async fn list_posts(&self, query: &PostQuery) -> Result<Vec<Post>> {
        let mut posts = Vec::new();
        for author in &query.authors {
            if !self.indexed.contains(author) {
                continue;
            }
            let stored: Vec<StoredPost> = match self.archives.get(author) {
                Some(archive) if !archive.unreachable => archive.posts.clone(),
                // A source that went dark after indexing contributes nothing.
                _ => continue,
            };
            for post in &stored {
                if query.root_only && post.reply_to.is_some() {
                    continue;
                }
                posts.push(self.hydrate(author, post, query.hydrate));
            }
        }

        posts.sort_by(|a, b| {
            let key_a = (a.created_at, &a.record_id);
            let key_b = (b.created_at, &b.record_id);
            if query.reverse {
                key_b.cmp(&key_a)
            } else {
                key_a.cmp(&key_b)
            }
        });
        if let Some(limit) = query.limit {
            posts.truncate(limit);
        }
        Ok(posts)
    }

    async fn get_post(&self, record: &RecordId) -> Result<Option<Post>> {
        for id in self.indexed_snapshot() {
            let found = match self.archives.get(&id) {
                Some(archive) if !archive.unreachable => archive
                    .posts
                    .iter()
                    .find(|p| &p.record_id == record)
                    .cloned(),
                _ => None,
            };
            if let Some(stored) = found {
                return Ok(Some(self.hydrate(&id, &stored, true)));
            }
        }
        Ok(None)
    }

    async fn count_votes(&self, subject: &RecordId) -> Result<VoteTally> {
        Ok(self.tally_votes(subject))
    }
}
