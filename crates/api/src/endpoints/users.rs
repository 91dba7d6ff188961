//! User endpoints.

use agora_common::AppResult;
use agora_core::CreateUserInput;
use agora_db::entities::user;
use axum::{
    Json, Router,
    extract::State,
    routing::{get, post},
};
use serde::Serialize;

use crate::{extractors::AuthUser, middleware::AppState, response::ApiResponse};

/// User response.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub created_at: String,
}

impl From<user::Model> for UserResponse {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id.to_string(),
            username: user.username,
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

/// Newly created user, the only response that carries the token.
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub token: String,
}

/// Create a user.
async fn create(
    State(state): State<AppState>,
    Json(input): Json<CreateUserInput>,
) -> AppResult<ApiResponse<CreatedUserResponse>> {
    let user = state.user_service.create(input).await?;
    let token = user.token.clone();
    Ok(ApiResponse::ok(CreatedUserResponse {
        user: user.into(),
        token,
    }))
}

/// Get the authenticated user.
async fn me(AuthUser(user): AuthUser) -> ApiResponse<UserResponse> {
    ApiResponse::ok(user.into())
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(create))
        .route("/me", get(me))
}
