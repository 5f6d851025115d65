use crate::db::store::{StoreError, VOTE_OPTION_FK, VOTE_POLL_FK};
use crate::sse::broker::BrokerError;
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Unauthenticated")]
    Unauthenticated,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("User already exists")]
    UserAlreadyExists,
    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Error, Debug)]
pub enum PollError {
    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
    #[error("Poll not found")]
    PollNotFound,
    #[error("Only the creator can delete this poll")]
    Forbidden,
    #[error("Database error: {0}")]
    DatabaseError(String),
}

#[derive(Error, Debug)]
pub enum VoteError {
    #[error("Poll not found")]
    PollNotFound,
    #[error("Poll has expired")]
    PollExpired,
    #[error("Option not found in poll")]
    OptionNotFound,
    #[error("User already voted on this poll")]
    DuplicateVote,
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

#[derive(Error, Debug)]
pub enum UserError {
    #[error("User not found")]
    UserNotFound,
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),
}

fn error_body(status: StatusCode, error_message: &str, details: String) -> Response {
    let body = Json(json!({
        "error": error_message,
        "details": details,
    }));

    (status, body).into_response()
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            AuthError::Unauthenticated => (StatusCode::UNAUTHORIZED, "Unauthenticated"),
            AuthError::InvalidCredentials => (StatusCode::UNAUTHORIZED, "Invalid credentials"),
            AuthError::UserAlreadyExists => (StatusCode::CONFLICT, "User already exists"),
            AuthError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            AuthError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        };

        error_body(status, error_message, self.to_string())
    }
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            PollError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            PollError::PollNotFound => (StatusCode::NOT_FOUND, "Poll not found"),
            PollError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
            PollError::DatabaseError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Database error"),
        };

        error_body(status, error_message, self.to_string())
    }
}

impl IntoResponse for VoteError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            VoteError::PollNotFound => (StatusCode::NOT_FOUND, "Poll not found"),
            VoteError::PollExpired => (StatusCode::BAD_REQUEST, "Poll has expired"),
            VoteError::OptionNotFound => (StatusCode::NOT_FOUND, "Option not found in poll"),
            VoteError::DuplicateVote => (StatusCode::CONFLICT, "User already voted on this poll"),
            VoteError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal failure"),
        };

        error_body(status, error_message, self.to_string())
    }
}

impl IntoResponse for UserError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            UserError::UserNotFound => (StatusCode::NOT_FOUND, "User not found"),
            UserError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "Internal failure"),
        };

        error_body(status, error_message, self.to_string())
    }
}

impl IntoResponse for BrokerError {
    fn into_response(self) -> Response {
        error_body(
            StatusCode::SERVICE_UNAVAILABLE,
            "Live updates unavailable",
            self.to_string(),
        )
    }
}

impl From<sqlx::Error> for PollError {
    fn from(error: sqlx::Error) -> Self {
        PollError::DatabaseError(error.to_string())
    }
}

impl From<sqlx::Error> for AuthError {
    fn from(error: sqlx::Error) -> Self {
        match StoreError::classify(error) {
            StoreError::UniqueViolation => AuthError::UserAlreadyExists,
            other => AuthError::Internal(other.to_string()),
        }
    }
}

impl From<bcrypt::BcryptError> for AuthError {
    fn from(error: bcrypt::BcryptError) -> Self {
        AuthError::Internal(error.to_string())
    }
}

impl From<jsonwebtoken::errors::Error> for AuthError {
    fn from(_: jsonwebtoken::errors::Error) -> Self {
        AuthError::Unauthenticated
    }
}

impl From<StoreError> for VoteError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::UniqueViolation => VoteError::DuplicateVote,
            StoreError::ForeignKeyViolation { constraint } => {
                if constraint.as_deref() == Some(VOTE_OPTION_FK) {
                    VoteError::OptionNotFound
                } else if constraint.as_deref() == Some(VOTE_POLL_FK) {
                    VoteError::PollNotFound
                } else {
                    VoteError::Storage(StoreError::ForeignKeyViolation { constraint })
                }
            }
            other => VoteError::Storage(other),
        }
    }
}
