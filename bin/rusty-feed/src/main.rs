//! # Rusty-Feed Binary
//!
//! Assembles the aggregation engine over the in-memory archive network and
//! runs a short scripted session: seed a few peers, restore (or provision)
//! the local user, follow the peers, and walk the resulting feed. The real
//! surrounding application would hang a renderer off the same wiring.

use chrono::{Duration as ChronoDuration, Utc};
use rf_core::{FollowEdge, FollowTarget, PostDraft, ProfileUpdate, RenderHook};
use rf_engine::{FeedEngine, View};
use rf_state_local::LocalStateStore;
use rf_store_mem::MemStore;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Render boundary for a headless demo: just log that a repaint would
/// happen.
struct LogRenderHook;

impl RenderHook for LogRenderHook {
    fn render(&self) {
        tracing::debug!("view state changed, render requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Initialize the archive network (store + query index in one plugin)
    let store = Arc::new(MemStore::new());

    // 2. Initialize local state persistence
    let state_path: PathBuf = std::env::var("RUSTY_FEED_STATE")
        .unwrap_or_else(|_| "./data/state.json".to_string())
        .into();
    let state = Arc::new(LocalStateStore::new(state_path));

    // 3. Seed a couple of remote peers so the feed has something to show
    let now = Utc::now();
    let ada = store.seed_archive("Ada", "writes about archives");
    let lin = store.seed_archive("Lin", "votes a lot");
    store.seed_post(&ada, "content addressing is underrated", now - ChronoDuration::minutes(9), None);
    let root = store.seed_post(&lin, "anyone else polling at 1s?", now - ChronoDuration::minutes(5), None);
    store.seed_post(&ada, "yes, and it works fine", now - ChronoDuration::minutes(2), Some(root.clone()));

    // 4. Assemble the engine
    let engine = FeedEngine::new(
        store.clone(),
        store.clone(),
        state,
        Arc::new(LogRenderHook),
    );
    // A state file can outlive this in-memory network; a persisted user
    // whose archive is gone just means a fresh session.
    if let Err(e) = engine.controller.setup().await {
        tracing::warn!(error = %e, "persisted user unavailable, starting a fresh session");
    }

    // 5. First run: provision a user and follow the seeded peers
    if engine.graph.current_identity().await.is_none() {
        engine
            .mutations
            .update_profile(ProfileUpdate {
                name: "Demo User".into(),
                bio: "kicking the tires".into(),
            })
            .await?;
        for (identity, label) in [(&ada, "Ada"), (&lin, "Lin")] {
            engine
                .mutations
                .toggle_follow(&FollowTarget::Edge(FollowEdge {
                    identity: identity.clone(),
                    label: label.to_string(),
                }))
                .await?;
        }
        engine
            .mutations
            .publish_post(PostDraft {
                body: "hello from rusty-feed".into(),
                reply_to: None,
            })
            .await?;
    }

    // 6. Walk the views
    engine.controller.navigate(View::Feed).await?;
    let feed = engine.controller.view_state().await;
    tracing::info!(posts = feed.feed.len(), "global feed loaded");
    for item in &feed.feed {
        let author = item
            .post
            .author_profile
            .as_ref()
            .map(|p| p.name.as_str())
            .unwrap_or("?");
        tracing::info!(
            author,
            at = %item.post.created_at,
            votes = item.post.votes.up(),
            replies = item.post.reply_count,
            body = %item.post.body,
        );
    }

    engine.controller.navigate(View::Thread(root)).await?;
    if let Some(thread) = engine.controller.view_state().await.viewed_thread {
        tracing::info!(depth = thread.depth(), "thread resolved");
    }

    engine.shutdown();
    Ok(())
}
