use axum::{
    extract::rejection::JsonRejection,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Why a bearer token was refused. All variants surface as 401.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("Given token not valid")]
    Invalid,
    #[error("Token is expired")]
    Expired,
    #[error("Token is revoked")]
    Revoked,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(&'static str),

    #[error("Username already taken")]
    DuplicateUsername,

    // Unknown user and wrong password share this variant.
    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    BadRequest(#[from] JsonRejection),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, (*msg).to_string()),
            AppError::DuplicateUsername | AppError::InvalidCredentials => {
                (StatusCode::BAD_REQUEST, self.to_string())
            }
            AppError::BadRequest(rejection) => (StatusCode::BAD_REQUEST, rejection.body_text()),
            AppError::Token(e) => (StatusCode::UNAUTHORIZED, e.to_string()),
            AppError::Db(e) => {
                error!(error = %e, "database error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
            AppError::Internal(e) => {
                error!(error = %e, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".into())
            }
        };

        let body = Json(json!({ "error": message }));
        if status == StatusCode::UNAUTHORIZED {
            (status, [(header::WWW_AUTHENTICATE, "Bearer")], body).into_response()
        } else {
            (status, body).into_response()
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;
