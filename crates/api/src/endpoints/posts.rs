//! Post endpoints.

use agora_common::AppResult;
use agora_core::{CreatePostInput, Direction, ListOrder, PageRequest, PostView};
use agora_db::entities::post;
use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Serialize;

use crate::{
    extractors::{AuthUser, MaybeAuthUser},
    middleware::AppState,
    response::{ApiResponse, no_content},
};

/// Post response.
///
/// IDs are strings: 64-bit identifiers do not survive a JSON number in
/// JavaScript clients.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostResponse {
    pub id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub score: i64,
    /// Caller's current vote, only present for authenticated requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub my_vote: Option<Direction>,
}

impl PostResponse {
    fn new(post: post::Model, score: i64) -> Self {
        Self {
            id: post.id.to_string(),
            user_id: post.user_id.to_string(),
            title: post.title,
            content: post.content,
            created_at: post.created_at.to_rfc3339(),
            score,
            my_vote: None,
        }
    }
}

impl From<PostView> for PostResponse {
    fn from(view: PostView) -> Self {
        Self::new(view.post, view.score)
    }
}

/// Page of posts.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostListResponse {
    pub posts: Vec<PostResponse>,
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub order: ListOrder,
}

/// Create a new post.
async fn create(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Json(input): Json<CreatePostInput>,
) -> AppResult<ApiResponse<PostResponse>> {
    let post = state.post_service.create(user.id, input).await?;
    Ok(ApiResponse::ok(PostResponse::new(post, 0)))
}

/// List posts, hot or new.
async fn list(
    State(state): State<AppState>,
    Query(request): Query<PageRequest>,
) -> AppResult<ApiResponse<PostListResponse>> {
    let page = state.pagination_service.list(&request).await?;
    let posts = state.post_service.hydrate(&page.ids).await?;

    Ok(ApiResponse::ok(PostListResponse {
        posts: posts.into_iter().map(Into::into).collect(),
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        order: page.order,
    }))
}

/// Show a post.
async fn show(
    MaybeAuthUser(user): MaybeAuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<ApiResponse<PostResponse>> {
    let view = state.post_service.get(post_id).await?;
    let mut response = PostResponse::from(view);

    if let Some(user) = user {
        response.my_vote = state.vote_service.check_vote(post_id, user.id).await?;
    }

    Ok(ApiResponse::ok(response))
}

/// Delete an own post.
async fn delete(
    AuthUser(user): AuthUser,
    State(state): State<AppState>,
    Path(post_id): Path<i64>,
) -> AppResult<StatusCode> {
    state.post_service.delete(post_id, user.id).await?;
    Ok(no_content())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list).post(create))
        .route("/{id}", get(show).delete(delete))
}
