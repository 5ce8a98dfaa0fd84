use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    // Auth errors
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Unauthorized")]
    Unauthorized,

    // Chat errors
    #[error("Chat not found")]
    ChatNotFound,
    #[error("Chat already exists for this meetup")]
    ChatAlreadyExists,
    #[error("Not a participant")]
    NotParticipant,

    // Message errors
    #[error("Message not found")]
    MessageNotFound,
    #[error("Message content is empty")]
    EmptyMessage,

    // Receipt errors
    #[error("Receipt not found")]
    ReceiptNotFound,

    // Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    // Internal errors
    #[error("Internal server error")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            // 400 Bad Request
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::EmptyMessage => (StatusCode::BAD_REQUEST, self.to_string()),

            // 401 Unauthorized
            AppError::InvalidToken => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::TokenExpired => (StatusCode::UNAUTHORIZED, self.to_string()),
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),

            // 403 Forbidden
            AppError::NotParticipant => (StatusCode::FORBIDDEN, self.to_string()),

            // 404 Not Found
            AppError::ChatNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::MessageNotFound => (StatusCode::NOT_FOUND, self.to_string()),
            AppError::ReceiptNotFound => (StatusCode::NOT_FOUND, self.to_string()),

            // 409 Conflict
            AppError::ChatAlreadyExists => (StatusCode::CONFLICT, self.to_string()),

            // 500 Internal Server Error
            AppError::Internal(e) => {
                tracing::error!("Internal error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
