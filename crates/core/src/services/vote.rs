//! Vote service.
//!
//! Records at most one current vote per (post, user) and keeps the post's
//! aggregate score equal to the sum of its recorded votes.
//!
//! Acceptance is asymmetric: a like is refused only when the user already
//! likes the post, while a dislike is accepted only as a reversal of an
//! existing like.

use std::time::Duration;

use agora_common::{AppError, AppResult};
use serde::Serialize;
use tracing::debug;

use crate::services::ranking::RankingService;
use crate::store::{CommitOutcome, Direction, SharedEngagementStore, VoteChange, with_deadline};

/// An accepted vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteReceipt {
    pub post_id: i64,
    pub direction: Direction,
    pub delta: i64,
    /// Post score right after this vote committed.
    pub score: i64,
}

/// Decide whether `requested` may replace `previous`.
///
/// Returns the change to commit, or the domain rejection.
pub fn evaluate_vote(
    post_id: i64,
    user_id: i64,
    previous: Option<Direction>,
    requested: Direction,
) -> AppResult<VoteChange> {
    match (requested, previous) {
        (Direction::Like, Some(Direction::Like)) => Err(AppError::AlreadyLiked { post_id }),
        (Direction::Dislike, None | Some(Direction::Dislike)) => {
            Err(AppError::NotPreviouslyLiked { post_id })
        }
        _ => Ok(VoteChange {
            post_id,
            user_id,
            previous,
            next: requested,
        }),
    }
}

/// Vote service for business logic.
#[derive(Clone)]
pub struct VoteService {
    store: SharedEngagementStore,
    ranking: RankingService,
    deadline: Duration,
    max_retries: u32,
}

impl VoteService {
    /// Create a new vote service.
    ///
    /// `ranking` must wrap the same store; it decides whether votes on
    /// unregistered posts are allowed.
    #[must_use]
    pub const fn new(
        store: SharedEngagementStore,
        ranking: RankingService,
        deadline: Duration,
        max_retries: u32,
    ) -> Self {
        Self {
            store,
            ranking,
            deadline,
            max_retries,
        }
    }

    /// Current vote of a user on a post; `None` means they never voted.
    pub async fn check_vote(&self, post_id: i64, user_id: i64) -> AppResult<Option<Direction>> {
        with_deadline(self.deadline, self.store.vote_of(post_id, user_id)).await
    }

    /// Like a post.
    pub async fn like(&self, post_id: i64, user_id: i64) -> AppResult<VoteReceipt> {
        self.apply_vote(post_id, user_id, Direction::Like).await
    }

    /// Turn a like into a dislike.
    pub async fn dislike(&self, post_id: i64, user_id: i64) -> AppResult<VoteReceipt> {
        self.apply_vote(post_id, user_id, Direction::Dislike).await
    }

    /// Record a vote and adjust the post's score in one atomic step.
    ///
    /// If another request changes the same user's vote between the check and
    /// the commit, the policy is re-evaluated against the new state.
    pub async fn apply_vote(
        &self,
        post_id: i64,
        user_id: i64,
        requested: Direction,
    ) -> AppResult<VoteReceipt> {
        if !self.ranking.auto_register() {
            self.ranking.require_registered(post_id).await?;
        }

        for attempt in 0..=self.max_retries {
            let previous = self.check_vote(post_id, user_id).await?;
            let change = evaluate_vote(post_id, user_id, previous, requested)?;

            match with_deadline(self.deadline, self.store.commit_vote(&change)).await? {
                CommitOutcome::Committed { score } => {
                    debug!(
                        post_id = post_id,
                        user_id = user_id,
                        direction = %requested,
                        delta = change.delta(),
                        score = score,
                        "Vote applied"
                    );
                    return Ok(VoteReceipt {
                        post_id,
                        direction: requested,
                        delta: change.delta(),
                        score,
                    });
                }
                CommitOutcome::Conflict => {
                    debug!(post_id = post_id, user_id = user_id, attempt = attempt, "Vote raced, retrying");
                }
            }
        }

        Err(AppError::Conflict(format!(
            "Vote on post {post_id} kept conflicting"
        )))
    }
}
