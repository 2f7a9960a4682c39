//! The poll/refresh loop end to end: new content raises the affordance,
//! acting on it reloads the feed, and the view is never replaced on its
//! own.

use chrono::{TimeZone, Utc};
use integration_tests::TestHarness;
use rf_engine::{PollState, View};

fn ts(secs: i64) -> chrono::DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).unwrap()
}

#[tokio::test]
async fn new_post_raises_the_affordance_and_refresh_clears_it() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let u = store.seed_archive("U", "");
    let friend = store.seed_archive("Friend", "");
    store.seed_follow(&u, &friend, "Friend");
    store.seed_post(&friend, "old news", ts(1), None);

    harness.persist_user(&u).await;
    harness.engine.controller.setup().await.unwrap();
    // Drive ticks by hand for determinism.
    harness.engine.poll.stop();

    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::Idle);

    store.seed_post(&friend, "breaking", ts(2), None);
    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::NewContent);

    // Nothing moved on screen yet: detection is not replacement.
    let before = harness.engine.controller.view_state().await;
    assert_eq!(before.feed.len(), 1);
    assert_eq!(before.feed[0].post.body, "old news");

    harness.engine.controller.refresh().await.unwrap();
    assert_eq!(harness.engine.poll.state(), PollState::Idle);
    let after = harness.engine.controller.view_state().await;
    assert_eq!(after.feed.len(), 2);
    assert_eq!(after.feed[0].post.body, "breaking");

    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::Idle);
}

#[tokio::test]
async fn profile_view_polls_that_author_only() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let a = store.seed_archive("A", "");
    let b = store.seed_archive("B", "");
    store.seed_post(&a, "a's post", ts(1), None);

    harness.engine.controller.setup().await.unwrap();
    harness.engine.poll.stop();
    harness
        .engine
        .controller
        .navigate(View::User(a))
        .await
        .unwrap();

    // Activity elsewhere does not concern this scope.
    store.seed_post(&b, "b's post", ts(2), None);
    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::Idle);
}

#[tokio::test]
async fn empty_feed_never_raises_an_affordance() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let u = store.seed_archive("U", "");

    harness.persist_user(&u).await;
    harness.engine.controller.setup().await.unwrap();
    harness.engine.poll.stop();

    // Nothing rendered on top, so there is nothing to compare against.
    store.seed_post(&u, "first ever", ts(1), None);
    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::Idle);
}

#[tokio::test]
async fn thread_view_suspends_feed_comparison() {
    let harness = TestHarness::new();
    let store = &harness.store;
    let u = store.seed_archive("U", "");
    let root = store.seed_post(&u, "root", ts(1), None);

    harness.persist_user(&u).await;
    harness.engine.controller.setup().await.unwrap();
    harness.engine.poll.stop();

    harness
        .engine
        .controller
        .navigate(View::Thread(root))
        .await
        .unwrap();
    store.seed_post(&u, "while reading", ts(2), None);
    harness.engine.poll.tick().await;
    assert_eq!(harness.engine.poll.state(), PollState::Idle);
}
