//! Vote endpoints.

use agora_common::AppResult;
use agora_core::{Direction, VoteReceipt};
use axum::{
    Router,
    extract::{Path, State},
    routing::{get, post},
};
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// Accepted vote.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteResponse {
    pub post_id: String,
    pub direction: Direction,
    pub delta: i64,
    pub score: i64,
}

impl From<VoteReceipt> for VoteResponse {
    fn from(receipt: VoteReceipt) -> Self {
        Self {
            post_id: receipt.post_id.to_string(),
            direction: receipt.direction,
            delta: receipt.delta,
            score: receipt.score,
        }
    }
}

/// The caller's vote on a post.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteStateResponse {
    pub post_id: String,
    /// `null` when the caller never voted.
    pub direction: Option<Direction>,
}

/// Like a post.
async fn like(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<ApiResponse<VoteResponse>> {
    state.post_service.ensure_exists(post_id).await?;
    let receipt = state.vote_service.like(post_id, user.id).await?;
    Ok(ApiResponse::ok(receipt.into()))
}

/// Turn a like into a dislike.
async fn dislike(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<ApiResponse<VoteResponse>> {
    state.post_service.ensure_exists(post_id).await?;
    let receipt = state.vote_service.dislike(post_id, user.id).await?;
    Ok(ApiResponse::ok(receipt.into()))
}

/// Get the caller's vote.
async fn show(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<ApiResponse<VoteStateResponse>> {
    let direction = state.vote_service.check_vote(post_id, user.id).await?;
    Ok(ApiResponse::ok(VoteStateResponse {
        post_id: post_id.to_string(),
        direction,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}/like", post(like))
        .route("/{id}/dislike", post(dislike))
        .route("/{id}/vote", get(show))
}
