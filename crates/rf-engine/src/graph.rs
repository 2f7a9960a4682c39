//! # ProfileGraph
//!
//! Holds the current user's identity, profile, and follow edges, and
//! resolves the author whitelist that scopes the default feed query.
//! Follow mutations only ever touch the current user's own archive; after
//! each write the profile is reloaded so derived reads reflect it.

use rf_core::{ArchiveStore, FeedError, Identity, Profile, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::registry::SourceRegistry;

#[derive(Debug, Clone)]
struct CurrentUser {
    identity: Identity,
    profile: Profile,
}

pub struct ProfileGraph {
    store: Arc<dyn ArchiveStore>,
    registry: Arc<SourceRegistry>,
    current: RwLock<Option<CurrentUser>>,
}

impl ProfileGraph {
    pub fn new(store: Arc<dyn ArchiveStore>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            store,
            registry,
            current: RwLock::new(None),
        }
    }

    /// Makes `identity` the current user: ensures it is a registered source
    /// and loads its profile. An absent or empty identity is a silent no-op
    /// (fresh install, nobody persisted yet).
    pub async fn set_current_user(&self, identity: Option<Identity>) -> Result<()> {
        let Some(identity) = identity.filter(|id| !id.is_empty()) else {
            return Ok(());
        };
        if let Err(e) = self.registry.add_source(&identity).await {
            tracing::warn!(%identity, error = %e, "could not index current user's archive");
        }
        let profile = self.fetch_profile(&identity).await?;
        *self.current.write().await = Some(CurrentUser { identity, profile });
        Ok(())
    }

    /// Re-reads the current user's profile from the store. No-op when no
    /// user is set.
    pub async fn reload_profile(&self) -> Result<()> {
        let Some(identity) = self.current_identity().await else {
            return Ok(());
        };
        let profile = self.fetch_profile(&identity).await?;
        if let Some(current) = self.current.write().await.as_mut() {
            current.profile = profile;
        }
        Ok(())
    }

    /// `followIdentities(currentUser) ∪ {currentUser}`; empty when no
    /// current user is set.
    pub async fn author_whitelist(&self) -> Vec<Identity> {
        let guard = self.current.read().await;
        let Some(current) = guard.as_ref() else {
            return Vec::new();
        };
        let mut set: HashSet<Identity> = current.profile.follow_identities();
        set.insert(current.identity.clone());
        set.into_iter().collect()
    }

    pub async fn is_following(&self, identity: &Identity) -> bool {
        self.current
            .read()
            .await
            .as_ref()
            .is_some_and(|c| c.profile.is_following(identity))
    }

    pub async fn current_identity(&self) -> Option<Identity> {
        self.current.read().await.as_ref().map(|c| c.identity.clone())
    }

    pub async fn current_profile(&self) -> Option<Profile> {
        self.current.read().await.as_ref().map(|c| c.profile.clone())
    }

    /// Follows `identity` under the given label. Idempotent: following an
    /// already-followed identity is a no-op. The followee is lazily
    /// registered as a source so their posts can enter the feed.
    pub async fn follow(&self, identity: &Identity, label: &str) -> Result<()> {
        let me = self.require_current_user().await?;
        if self.is_following(identity).await {
            return Ok(());
        }
        self.store.add_follow(&me, identity, label).await?;
        if let Err(e) = self.registry.add_source(identity).await {
            tracing::warn!(followee = %identity, error = %e, "followed identity is unreachable");
        }
        self.reload_profile().await
    }

    /// Unfollows `identity`. Idempotent. The source stays indexed; only the
    /// whitelist shrinks.
    pub async fn unfollow(&self, identity: &Identity) -> Result<()> {
        let me = self.require_current_user().await?;
        if !self.is_following(identity).await {
            return Ok(());
        }
        self.store.remove_follow(&me, identity).await?;
        self.reload_profile().await
    }

    async fn require_current_user(&self) -> Result<Identity> {
        self.current_identity().await.ok_or(FeedError::NoCurrentUser)
    }

    /// A reachable archive with no profile record yet reads as an empty
    /// profile rather than an error.
    async fn fetch_profile(&self, identity: &Identity) -> Result<Profile> {
        let mut profile = self
            .store
            .get_profile(identity)
            .await?
            .unwrap_or_else(|| Profile {
                identity: identity.clone(),
                name: String::new(),
                bio: String::new(),
                avatar: None,
                follows: Vec::new(),
                is_current_user: false,
            });
        profile.is_current_user = true;
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rf_store_mem::MemStore;

    fn graph_over(store: &Arc<MemStore>) -> Arc<ProfileGraph> {
        let registry = Arc::new(SourceRegistry::new(store.clone()));
        Arc::new(ProfileGraph::new(store.clone(), registry))
    }

    #[tokio::test]
    async fn empty_identity_is_a_silent_noop() {
        let store = Arc::new(MemStore::new());
        let graph = graph_over(&store);

        graph.set_current_user(None).await.unwrap();
        graph
            .set_current_user(Some(Identity::from("")))
            .await
            .unwrap();
        assert!(graph.current_identity().await.is_none());
        assert!(graph.author_whitelist().await.is_empty());
    }

    #[tokio::test]
    async fn whitelist_is_follows_plus_self() {
        let store = Arc::new(MemStore::new());
        let me = store.seed_archive("Me", "");
        let a = store.seed_archive("A", "");
        store.seed_follow(&me, &a, "A");
        let graph = graph_over(&store);

        graph.set_current_user(Some(me.clone())).await.unwrap();
        let whitelist = graph.author_whitelist().await;
        assert_eq!(whitelist.len(), 2);
        assert!(whitelist.contains(&me));
        assert!(whitelist.contains(&a));
    }

    #[tokio::test]
    async fn follow_is_idempotent_and_reloads() {
        let store = Arc::new(MemStore::new());
        let me = store.seed_archive("Me", "");
        let a = store.seed_archive("A", "");
        let graph = graph_over(&store);
        graph.set_current_user(Some(me.clone())).await.unwrap();

        assert!(!graph.is_following(&a).await);
        graph.follow(&a, "A").await.unwrap();
        graph.follow(&a, "A").await.unwrap();
        assert!(graph.is_following(&a).await);
        assert_eq!(graph.current_profile().await.unwrap().follows.len(), 1);

        graph.unfollow(&a).await.unwrap();
        graph.unfollow(&a).await.unwrap();
        assert!(!graph.is_following(&a).await);
    }

    #[tokio::test]
    async fn follow_without_current_user_fails() {
        let store = Arc::new(MemStore::new());
        let a = store.seed_archive("A", "");
        let graph = graph_over(&store);

        let err = graph.follow(&a, "A").await.unwrap_err();
        assert!(matches!(err, FeedError::NoCurrentUser));
    }

    #[tokio::test]
    async fn profile_is_marked_as_current_user() {
        let store = Arc::new(MemStore::new());
        let me = store.seed_archive("Me", "a bio");
        let graph = graph_over(&store);

        graph.set_current_user(Some(me)).await.unwrap();
        let profile = graph.current_profile().await.unwrap();
        assert!(profile.is_current_user);
        assert_eq!(profile.bio, "a bio");
    }
}
