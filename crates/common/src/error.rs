//! Error types for agora.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::id::IdError;

/// Application result type.
pub type AppResult<T> = Result<T, AppError>;

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    // === Client Errors ===
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Post not found: {0}")]
    PostNotFound(i64),

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // === Vote Outcomes ===
    #[error("Post {post_id} already liked")]
    AlreadyLiked { post_id: i64 },

    #[error("Post {post_id} has no like to turn into a dislike")]
    NotPreviouslyLiked { post_id: i64 },

    // === Server Errors ===
    #[error("ID generation failed: {0}")]
    Id(#[from] IdError),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            // 4xx Client Errors
            Self::NotFound(_) | Self::PostNotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Validation(_) | Self::NotPreviouslyLiked { .. } => {
                StatusCode::BAD_REQUEST
            }
            Self::Conflict(_) | Self::AlreadyLiked { .. } => StatusCode::CONFLICT,

            // 5xx Server Errors
            Self::Id(IdError::ClockSkew { .. }) | Self::StoreUnavailable(_) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Id(_)
            | Self::Database(_)
            | Self::Config(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::PostNotFound(_) => "POST_NOT_FOUND",
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Conflict(_) => "CONFLICT",
            Self::AlreadyLiked { .. } => "ALREADY_LIKED",
            Self::NotPreviouslyLiked { .. } => "NOT_PREVIOUSLY_LIKED",
            Self::Id(IdError::ClockSkew { .. }) => "CLOCK_SKEW",
            Self::Id(_) => "ID_GENERATION_ERROR",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Config(_) => "CONFIG_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns whether this error should be logged at error level.
    #[must_use]
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Returns whether the caller may retry the same request after a delay.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::StoreUnavailable(_) | Self::Id(IdError::ClockSkew { .. })
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();

        // Log server errors
        if self.is_server_error() {
            tracing::error!(error = %self, code = code, "Server error occurred");
        } else {
            tracing::debug!(error = %self, code = code, "Client error occurred");
        }

        let body = Json(json!({
            "error": {
                "code": code,
                "message": self.to_string(),
            }
        }));

        let mut response = (status, body).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(axum::http::header::RETRY_AFTER, axum::http::HeaderValue::from_static("1"));
        }
        response
    }
}

// === From implementations ===

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::Validation(err.to_string())
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vote_outcomes_are_client_errors() {
        let liked = AppError::AlreadyLiked { post_id: 1 };
        assert_eq!(liked.status_code(), StatusCode::CONFLICT);
        assert_eq!(liked.error_code(), "ALREADY_LIKED");
        assert!(!liked.is_server_error());

        let not_liked = AppError::NotPreviouslyLiked { post_id: 1 };
        assert_eq!(not_liked.status_code(), StatusCode::BAD_REQUEST);
        assert!(!not_liked.is_retryable());
    }

    #[test]
    fn test_clock_skew_is_retryable() {
        let err = AppError::from(IdError::ClockSkew {
            last_ms: 10,
            now_ms: 5,
        });
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.error_code(), "CLOCK_SKEW");
        assert!(err.is_retryable());

        let fatal = AppError::from(IdError::InvalidWorker { worker: 2048, max: 1023 });
        assert_eq!(fatal.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!fatal.is_retryable());
    }

    #[test]
    fn test_response_carries_retry_after() {
        let response = AppError::StoreUnavailable("timeout".to_string()).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.headers().contains_key(axum::http::header::RETRY_AFTER));
    }
}
