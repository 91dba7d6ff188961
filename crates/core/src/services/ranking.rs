//! Ranking service.
//!
//! Ordered index of posts by aggregate score, backing the "hot" listing.

use std::time::Duration;

use agora_common::{AppError, AppResult};
use tracing::debug;

use crate::store::{SharedEngagementStore, with_deadline};

/// Ranking service for score-ordered queries.
#[derive(Clone)]
pub struct RankingService {
    store: SharedEngagementStore,
    auto_register: bool,
    deadline: Duration,
}

impl RankingService {
    /// Create a new ranking service.
    ///
    /// With `auto_register`, unknown posts read as score 0 and are registered
    /// on their first score update; without it they fail with `PostNotFound`.
    #[must_use]
    pub const fn new(store: SharedEngagementStore, auto_register: bool, deadline: Duration) -> Self {
        Self {
            store,
            auto_register,
            deadline,
        }
    }

    /// Whether unknown posts are registered implicitly.
    #[must_use]
    pub const fn auto_register(&self) -> bool {
        self.auto_register
    }

    /// Register a post at score 0.
    ///
    /// Returns `false` without touching the score if the post is already
    /// registered.
    pub async fn register(&self, post_id: i64) -> AppResult<bool> {
        let inserted = with_deadline(self.deadline, self.store.register(post_id)).await?;
        debug!(post_id = post_id, inserted = inserted, "Registered post in ranking");
        Ok(inserted)
    }

    /// Apply a delta to a post's score and return the new score.
    pub async fn adjust_score(&self, post_id: i64, delta: i64) -> AppResult<i64> {
        if !self.auto_register {
            self.require_registered(post_id).await?;
        }
        with_deadline(self.deadline, self.store.adjust_score(post_id, delta)).await
    }

    /// Current aggregate score of a post.
    pub async fn score_of(&self, post_id: i64) -> AppResult<i64> {
        match with_deadline(self.deadline, self.store.score_of(post_id)).await? {
            Some(score) => Ok(score),
            None if self.auto_register => Ok(0),
            None => Err(AppError::PostNotFound(post_id)),
        }
    }

    /// Post IDs by score descending; equal scores by post ID descending.
    pub async fn top_by_score(&self, offset: u64, limit: u64) -> AppResult<Vec<i64>> {
        with_deadline(self.deadline, self.store.top_by_score(offset, limit)).await
    }

    /// Number of ranked posts.
    pub async fn cardinality(&self) -> AppResult<u64> {
        with_deadline(self.deadline, self.store.cardinality()).await
    }

    /// Forget a deleted post and its votes.
    pub async fn remove(&self, post_id: i64) -> AppResult<()> {
        with_deadline(self.deadline, self.store.remove(post_id)).await?;
        debug!(post_id = post_id, "Removed post from ranking");
        Ok(())
    }

    /// Fail with `PostNotFound` unless the post has a score entry.
    pub async fn require_registered(&self, post_id: i64) -> AppResult<()> {
        with_deadline(self.deadline, self.store.score_of(post_id))
            .await?
            .map(|_| ())
            .ok_or(AppError::PostNotFound(post_id))
    }
}
