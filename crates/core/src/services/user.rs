//! User service.

use std::sync::Arc;

use agora_common::{AppError, AppResult, IdGenerator};
use agora_db::{entities::user, repositories::UserRepository};
use chrono::Utc;
use sea_orm::Set;
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// Input for creating a new user.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(length(min = 1, max = 128))]
    pub username: String,
}

impl CreateUserInput {
    fn check(&self) -> AppResult<()> {
        self.validate()?;
        if !self
            .username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(AppError::Validation(
                "Username may only contain letters, digits and underscores".to_string(),
            ));
        }
        Ok(())
    }
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: Arc<IdGenerator>,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository, id_gen: Arc<IdGenerator>) -> Self {
        Self { user_repo, id_gen }
    }

    /// Create a new user with a fresh bearer token.
    pub async fn create(&self, input: CreateUserInput) -> AppResult<user::Model> {
        input.check()?;

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()?),
            username_lower: Set(input.username.to_lowercase()),
            username: Set(input.username),
            token: Set(generate_token()),
            created_at: Set(Utc::now().into()),
        };

        let user = self.user_repo.create(model).await?;
        info!(user_id = user.id, username = %user.username, "Created user");
        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get(&self, id: i64) -> AppResult<user::Model> {
        self.user_repo.get_by_id(id).await
    }

    /// Authenticate a user by token.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }
}

/// Tokens carry no time component.
fn generate_token() -> String {
    Uuid::new_v4().simple().to_string()
}
