//! Post service.

use std::sync::Arc;

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{entities::post, repositories::PostRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use tracing::{info, warn};
use validator::Validate;

use crate::services::ranking::RankingService;

/// Input for creating a post.
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePostInput {
    #[validate(length(min = 1, max = 256))]
    pub title: String,

    #[validate(length(max = 10000))]
    #[serde(default)]
    pub content: String,
}

/// A post together with its current score.
#[derive(Debug, Clone)]
pub struct PostView {
    pub post: post::Model,
    pub score: i64,
}

/// Post service for business logic.
#[derive(Clone)]
pub struct PostService {
    post_repo: PostRepository,
    id_gen: Arc<IdGenerator>,
    ranking: RankingService,
}

impl PostService {
    /// Create a new post service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        id_gen: Arc<IdGenerator>,
        ranking: RankingService,
    ) -> Self {
        Self {
            post_repo,
            id_gen,
            ranking,
        }
    }

    /// Create a post and register it in the ranking at score 0.
    pub async fn create(&self, user_id: i64, input: CreatePostInput) -> AppResult<post::Model> {
        input.validate()?;

        let post_id = self.id_gen.generate()?;

        let model = post::ActiveModel {
            id: Set(post_id),
            user_id: Set(user_id),
            title: Set(input.title),
            content: Set(input.content),
            created_at: Set(Utc::now().into()),
        };

        let post = self.post_repo.create(model).await?;

        // The post row exists now. With auto registration a failed insert is
        // repaired by the first vote, so it is only logged.
        if let Err(e) = self.ranking.register(post.id).await {
            if !self.ranking.auto_register() {
                return Err(e);
            }
            warn!(post_id = post.id, error = %e, "Failed to register post in ranking");
        }

        info!(post_id = post.id, user_id = user_id, "Created post");
        Ok(post)
    }

    /// Get a post with its score.
    pub async fn get(&self, post_id: i64) -> AppResult<PostView> {
        let post = self.post_repo.get_by_id(post_id).await?;
        let score = self.score_or_zero(post_id).await?;
        Ok(PostView { post, score })
    }

    /// Fail with `PostNotFound` unless the post is persisted.
    pub async fn ensure_exists(&self, post_id: i64) -> AppResult<()> {
        self.post_repo.get_by_id(post_id).await.map(|_| ())
    }

    /// Delete a post. Only its author may do so.
    pub async fn delete(&self, post_id: i64, user_id: i64) -> AppResult<()> {
        let post = self.post_repo.get_by_id(post_id).await?;
        if post.user_id != user_id {
            return Err(AppError::Forbidden(
                "Cannot delete another user's post".to_string(),
            ));
        }

        self.post_repo.delete(post_id).await?;
        self.ranking.remove(post_id).await?;

        info!(post_id = post_id, user_id = user_id, "Deleted post");
        Ok(())
    }

    /// Load posts for a page of IDs, keeping the page order.
    ///
    /// IDs whose row has gone away are skipped.
    pub async fn hydrate(&self, ids: &[i64]) -> AppResult<Vec<PostView>> {
        let posts = self.post_repo.find_by_ids(ids).await?;

        let mut views = Vec::with_capacity(posts.len());
        for post in posts {
            let score = self.score_or_zero(post.id).await?;
            views.push(PostView { post, score });
        }
        Ok(views)
    }

    /// A persisted post missing from the ranking has no votes yet.
    async fn score_or_zero(&self, post_id: i64) -> AppResult<i64> {
        match self.ranking.score_of(post_id).await {
            Err(AppError::PostNotFound(_)) => Ok(0),
            other => other,
        }
    }
}
