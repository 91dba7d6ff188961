//! Engagement storage.
//!
//! Vote records and post scores form one logical resource keyed by post ID.
//! Every mutation of a post's (vote, score) pair goes through
//! [`EngagementStore::commit_vote`], which writes both or neither.
//!
//! Two backends implement the trait:
//!
//! - [`MemoryEngagementStore`]: lock-protected maps, for a single instance
//! - [`RedisEngagementStore`]: a hash per post plus one sorted set, shared by
//!   every instance

mod memory;
mod redis;

pub use memory::MemoryEngagementStore;
pub use redis::RedisEngagementStore;

use agora_common::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Direction of a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// +1
    Like,
    /// -1
    Dislike,
}

impl Direction {
    /// Signed contribution to the aggregate score.
    #[must_use]
    pub const fn value(self) -> i64 {
        match self {
            Self::Like => 1,
            Self::Dislike => -1,
        }
    }

    /// Parse a stored value (`"1"` or `"-1"`).
    #[must_use]
    pub fn from_stored(value: &str) -> Option<Self> {
        match value {
            "1" => Some(Self::Like),
            "-1" => Some(Self::Dislike),
            _ => None,
        }
    }

    /// Value as written to a store.
    #[must_use]
    pub const fn as_stored(self) -> &'static str {
        match self {
            Self::Like => "1",
            Self::Dislike => "-1",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Like => f.write_str("like"),
            Self::Dislike => f.write_str("dislike"),
        }
    }
}

/// A vote transition to commit atomically.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteChange {
    /// Post being voted on.
    pub post_id: i64,
    /// Voting user.
    pub user_id: i64,
    /// Direction the caller observed before deciding; `None` = never voted.
    pub previous: Option<Direction>,
    /// Direction to record.
    pub next: Direction,
}

impl VoteChange {
    /// Score delta this change applies.
    #[must_use]
    pub const fn delta(&self) -> i64 {
        let previous = match self.previous {
            Some(direction) => direction.value(),
            None => 0,
        };
        self.next.value() - previous
    }
}

/// Result of a conditional vote commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Vote and score were written; carries the new score.
    Committed {
        /// Aggregate score after the commit.
        score: i64,
    },
    /// The recorded vote no longer matched `previous`; nothing was written.
    Conflict,
}

/// Persistence primitive for votes and scores.
#[async_trait]
pub trait EngagementStore: Send + Sync {
    /// Current vote of a user on a post, `None` if they never voted.
    async fn vote_of(&self, post_id: i64, user_id: i64) -> AppResult<Option<Direction>>;

    /// Record `change.next` and add `change.delta()` to the post's score,
    /// provided the recorded vote still equals `change.previous`.
    ///
    /// Registers the post at score 0 first if it is unknown.
    async fn commit_vote(&self, change: &VoteChange) -> AppResult<CommitOutcome>;

    /// Insert a post at score 0. Returns `false` if it was already present.
    async fn register(&self, post_id: i64) -> AppResult<bool>;

    /// Add `delta` to a post's score, registering it first if unknown.
    async fn adjust_score(&self, post_id: i64, delta: i64) -> AppResult<i64>;

    /// Current score, `None` if the post is not registered.
    async fn score_of(&self, post_id: i64) -> AppResult<Option<i64>>;

    /// Post IDs by score descending, ties by post ID descending.
    async fn top_by_score(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>>;

    /// Number of registered posts.
    async fn cardinality(&self) -> AppResult<u64>;

    /// Drop a post's score and all of its votes.
    async fn remove(&self, post_id: i64) -> AppResult<()>;
}

/// Shared, dynamically dispatched engagement store.
pub type SharedEngagementStore = Arc<dyn EngagementStore>;

/// Run a store operation under a deadline.
///
/// On expiry the operation future is dropped; both backends only become
/// visible at a single atomic step, so a timed-out call leaves no partial
/// state behind.
pub async fn with_deadline<T, F>(deadline: Duration, op: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    tokio::time::timeout(deadline, op).await.map_err(|_| {
        AppError::StoreUnavailable(format!("deadline of {}ms exceeded", deadline.as_millis()))
    })?
}
