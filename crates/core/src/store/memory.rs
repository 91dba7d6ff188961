//! In-process engagement store.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use agora_common::AppResult;
use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};

use super::{CommitOutcome, Direction, EngagementStore, VoteChange};

/// Votes and score of one post.
///
/// The vote table mutex is the post's critical section: a commit checks,
/// records and adjusts the score while holding it. The score is readable
/// without the lock so range queries never wait on voters.
///
/// `removed` is only set while holding the vote lock. A writer that fetched
/// the entry before removal sees it once it gets the lock and starts over.
#[derive(Debug, Default)]
struct PostEntry {
    score: AtomicI64,
    removed: AtomicBool,
    votes: Mutex<HashMap<i64, Direction>>,
}

/// Lock-protected in-memory store for a single instance.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngagementStore {
    posts: Arc<RwLock<HashMap<i64, Arc<PostEntry>>>>,
}

impl MemoryEngagementStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    async fn entry(&self, post_id: i64) -> Option<Arc<PostEntry>> {
        self.posts.read().await.get(&post_id).cloned()
    }

    async fn entry_or_register(&self, post_id: i64) -> Arc<PostEntry> {
        if let Some(entry) = self.entry(post_id).await {
            return entry;
        }
        let mut posts = self.posts.write().await;
        Arc::clone(posts.entry(post_id).or_default())
    }

    /// Apply `change` to `entry`, or `None` if the entry was removed.
    async fn commit_on(entry: &PostEntry, change: &VoteChange) -> Option<CommitOutcome> {
        let mut votes = entry.votes.lock().await;
        if entry.removed.load(Ordering::SeqCst) {
            return None;
        }
        if votes.get(&change.user_id).copied() != change.previous {
            return Some(CommitOutcome::Conflict);
        }

        // No await and nothing fallible from here on.
        votes.insert(change.user_id, change.next);
        let delta = change.delta();
        let score = entry.score.fetch_add(delta, Ordering::SeqCst) + delta;

        Some(CommitOutcome::Committed { score })
    }

    /// Add `delta` to `entry`, or `None` if the entry was removed.
    async fn adjust_on(entry: &PostEntry, delta: i64) -> Option<i64> {
        // Serialize with vote commits on the same post.
        let _votes = entry.votes.lock().await;
        if entry.removed.load(Ordering::SeqCst) {
            return None;
        }
        Some(entry.score.fetch_add(delta, Ordering::SeqCst) + delta)
    }
}

#[async_trait]
impl EngagementStore for MemoryEngagementStore {
    async fn vote_of(&self, post_id: i64, user_id: i64) -> AppResult<Option<Direction>> {
        let Some(entry) = self.entry(post_id).await else {
            return Ok(None);
        };
        let votes = entry.votes.lock().await;
        Ok(votes.get(&user_id).copied())
    }

    async fn commit_vote(&self, change: &VoteChange) -> AppResult<CommitOutcome> {
        loop {
            let entry = self.entry_or_register(change.post_id).await;
            if let Some(outcome) = Self::commit_on(&entry, change).await {
                return Ok(outcome);
            }
        }
    }

    async fn register(&self, post_id: i64) -> AppResult<bool> {
        let mut posts = self.posts.write().await;
        if posts.contains_key(&post_id) {
            return Ok(false);
        }
        posts.insert(post_id, Arc::default());
        Ok(true)
    }

    async fn adjust_score(&self, post_id: i64, delta: i64) -> AppResult<i64> {
        loop {
            let entry = self.entry_or_register(post_id).await;
            if let Some(score) = Self::adjust_on(&entry, delta).await {
                return Ok(score);
            }
        }
    }

    async fn score_of(&self, post_id: i64) -> AppResult<Option<i64>> {
        Ok(self
            .entry(post_id)
            .await
            .map(|entry| entry.score.load(Ordering::SeqCst)))
    }

    async fn top_by_score(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>> {
        let mut ranked: Vec<(i64, i64)> = {
            let posts = self.posts.read().await;
            posts
                .iter()
                .map(|(id, entry)| (entry.score.load(Ordering::SeqCst), *id))
                .collect()
        };

        ranked.sort_unstable_by(|a, b| b.0.cmp(&a.0).then(b.1.cmp(&a.1)));

        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(ranked
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(_, id)| id)
            .collect())
    }

    async fn cardinality(&self) -> AppResult<u64> {
        Ok(self.posts.read().await.len() as u64)
    }

    async fn remove(&self, post_id: i64) -> AppResult<()> {
        let removed = self.posts.write().await.remove(&post_id);
        if let Some(entry) = removed {
            let mut votes = entry.votes.lock().await;
            entry.removed.store(true, Ordering::SeqCst);
            votes.clear();
        }
        Ok(())
    }
}
