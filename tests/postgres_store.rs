//! Runs against a live PostgreSQL server:
//! `TEST_POSTGRES_URL=postgres://... cargo test --test postgres_store -- --ignored`

mod common;

use futures::future::join_all;
use std::sync::Arc;

use common::{feed_over, postgres_store};
use social_feed::core::{PostId, UserId};
use social_feed::infrastructure::{FactStore, UserDirectory};
use social_feed::ErrorKind;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_likes_are_all_counted() {
    let Some(store) = postgres_store().await else {
        return;
    };
    let feed = Arc::new(feed_over(store.clone()));
    let post_id = feed.create_post("u1", "popular").await.unwrap().id;

    let likers = 25;
    let tasks = (0..likers).map(|i| {
        let feed = feed.clone();
        tokio::spawn(async move { feed.record_like(post_id, &format!("fan{}", i)).await })
    });
    for outcome in join_all(tasks).await {
        outcome.unwrap().unwrap();
    }

    let post = feed.get_post(post_id).await.unwrap();
    assert_eq!(post.like_count, likers);
    assert_eq!(store.count_likes(post_id).await.unwrap(), likers);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_concurrent_replies_all_land_in_snapshot() {
    let Some(store) = postgres_store().await else {
        return;
    };
    let feed = Arc::new(feed_over(store.clone()));
    let post_id = feed.create_post("u1", "thread").await.unwrap().id;

    let tasks = (0..20).map(|i| {
        let feed = feed.clone();
        tokio::spawn(async move {
            feed.append_reply(post_id, &format!("u{}", i), &format!("reply {}", i))
                .await
        })
    });
    for outcome in join_all(tasks).await {
        outcome.unwrap().unwrap();
    }

    let post = feed.get_post(post_id).await.unwrap();
    let live: Vec<_> = store
        .list_replies(post_id)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.id)
        .collect();
    let snapshot: Vec<_> = post.reply_snapshot.entries().iter().map(|e| e.id).collect();
    assert_eq!(snapshot.len(), 20);
    assert_eq!(snapshot, live);
}

#[tokio::test]
#[ignore]
async fn test_writes_against_missing_post_are_not_found() {
    let Some(store) = postgres_store().await else {
        return;
    };
    let feed = feed_over(store.clone());
    let missing = PostId::new(-1);

    let err = feed.append_reply(missing, "u2", "hi").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = feed.record_like(missing, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    let err = feed.record_repost(missing, "u2").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert!(store.list_replies(missing).await.unwrap().is_empty());
    assert_eq!(store.count_likes(missing).await.unwrap(), 0);
}

#[tokio::test]
#[ignore]
async fn test_duplicate_like_and_repost_conflict() {
    let Some(store) = postgres_store().await else {
        return;
    };
    let feed = feed_over(store.clone());
    let post = feed.create_post("u1", "hello").await.unwrap();

    feed.record_like(post.id, "u4").await.unwrap();
    let err = feed.record_like(post.id, "u4").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    feed.record_repost(post.id, "u4").await.unwrap();
    let err = feed.record_repost(post.id, "u4").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let after = feed.get_post(post.id).await.unwrap();
    assert_eq!((after.like_count, after.repost_count), (1, 1));
    assert!(!feed.reconcile_post(post.id).await.unwrap().repaired());
}

#[tokio::test]
#[ignore]
async fn test_user_directory_upsert() {
    let Some(store) = postgres_store().await else {
        return;
    };
    let id = UserId::new("pg_fan_1").unwrap();

    store.upsert_user(&id, "Fan One").await.unwrap();
    let updated = store.set_favorite_team(&id, "owls").await.unwrap();
    assert_eq!(updated.favorite_team.as_deref(), Some("owls"));

    let renamed = store.upsert_user(&id, "Fan #1").await.unwrap();
    assert_eq!(renamed.display_name, "Fan #1");
    assert_eq!(renamed.favorite_team.as_deref(), Some("owls"));

    let err = store
        .set_favorite_team(&UserId::new("pg_nobody").unwrap(), "owls")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}
