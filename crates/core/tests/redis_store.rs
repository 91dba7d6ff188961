//! Redis engagement store integration tests.
//!
//! These need a running Redis. Point `REDIS_URL` at it:
//!
//! ```bash
//! docker run -d -p 6379:6379 redis:7
//! REDIS_URL=redis://localhost:6379 cargo test -p agora-core --test redis_store -- --ignored
//! ```

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use agora_common::AppError;
use agora_core::{
    CommitOutcome, Direction, EngagementStore, RankingService, RedisEngagementStore, VoteChange,
    VoteService,
};
use uuid::Uuid;

async fn store() -> RedisEngagementStore {
    let url = std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
    // Fresh prefix per test so runs never see each other's keys.
    let prefix = format!("agora-test-{}", Uuid::new_v4().simple());
    RedisEngagementStore::connect(&url, prefix).await.unwrap()
}

#[tokio::test]
#[ignore = "requires running Redis"]
async fn test_register_and_score() {
    let store = store().await;

    assert!(store.register(1).await.unwrap());
    assert!(!store.register(1).await.unwrap());
    assert_eq!(store.score_of(1).await.unwrap(), Some(0));
    assert_eq!(store.score_of(2).await.unwrap(), None);

    store.remove(1).await.unwrap();
}

#[tokio::test]
#[ignore = "requires running Redis"]
async fn test_commit_vote_is_conditional() {
    let store = store().await;
    let like = VoteChange {
        post_id: 10,
        user_id: 1,
        previous: None,
        next: Direction::Like,
    };

    assert_eq!(
        store.commit_vote(&like).await.unwrap(),
        CommitOutcome::Committed { score: 1 }
    );
    assert_eq!(store.commit_vote(&like).await.unwrap(), CommitOutcome::Conflict);
    assert_eq!(store.vote_of(10, 1).await.unwrap(), Some(Direction::Like));
    assert_eq!(store.score_of(10).await.unwrap(), Some(1));

    store.remove(10).await.unwrap();
    assert_eq!(store.vote_of(10, 1).await.unwrap(), None);
}

#[tokio::test]
#[ignore = "requires running Redis"]
async fn test_top_by_score_ties_by_id_desc() {
    let store = store().await;
    for id in [5, 40, 300] {
        store.register(id).await.unwrap();
    }
    store.adjust_score(5, 2).await.unwrap();

    assert_eq!(store.top_by_score(0, 10).await.unwrap(), vec![5, 300, 40]);
    assert_eq!(store.cardinality().await.unwrap(), 3);

    for id in [5, 40, 300] {
        store.remove(id).await.unwrap();
    }
}

#[tokio::test]
#[ignore = "requires running Redis"]
async fn test_vote_scenario_against_redis() {
    let store: Arc<dyn EngagementStore> = Arc::new(store().await);
    let deadline = Duration::from_secs(2);
    let ranking = RankingService::new(Arc::clone(&store), true, deadline);
    let votes = VoteService::new(Arc::clone(&store), ranking.clone(), deadline, 8);

    ranking.register(1).await.unwrap();
    votes.like(1, 1).await.unwrap();
    votes.like(1, 2).await.unwrap();
    assert!(matches!(
        votes.like(1, 1).await,
        Err(AppError::AlreadyLiked { .. })
    ));
    assert_eq!(votes.dislike(1, 1).await.unwrap().score, 0);
    assert!(matches!(
        votes.dislike(1, 3).await,
        Err(AppError::NotPreviouslyLiked { .. })
    ));

    ranking.remove(1).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore = "requires running Redis"]
async fn test_concurrent_likes_count_once() {
    let store: Arc<dyn EngagementStore> = Arc::new(store().await);
    let deadline = Duration::from_secs(2);
    let ranking = RankingService::new(Arc::clone(&store), true, deadline);
    let votes = VoteService::new(Arc::clone(&store), ranking.clone(), deadline, 8);

    let mut handles = Vec::new();
    for _ in 0..20 {
        let votes = votes.clone();
        handles.push(tokio::spawn(async move { votes.like(7, 1).await.is_ok() }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap() {
            accepted += 1;
        }
    }

    assert_eq!(accepted, 1);
    assert_eq!(ranking.score_of(7).await.unwrap(), 1);

    ranking.remove(7).await.unwrap();
}
