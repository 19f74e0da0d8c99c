use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::Serialize;
use thiserror::Error;

use crate::services::completeness::MissingField;

pub type Result<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Authentication required")]
    AuthRequired,

    #[error("Email verification required")]
    VerificationRequired,

    #[error("Profile incomplete")]
    ProfileIncomplete(Vec<MissingField>),

    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },

    #[error("A refresh is already in flight, retry after {retry_after}s")]
    LockContention { retry_after: u64 },

    #[error("Vector generation failed: {0}")]
    VectorGenerationFailed(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    /// The shared key-value store backing the lock and rate limiter is
    /// unreachable. The refresh entrypoint fails closed on this error.
    #[error("Shared store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBody {
    error: String,
    code: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    retry_after: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    missing_fields: Option<Vec<MissingField>>,
}

impl ResponseError for AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            AppError::AuthRequired => StatusCode::UNAUTHORIZED,
            AppError::VerificationRequired => StatusCode::FORBIDDEN,
            AppError::ProfileIncomplete(_) | AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::LockContention { .. } => StatusCode::CONFLICT,
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::VectorGenerationFailed(_)
            | AppError::Database(_)
            | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let code = self.status_code();
        let retry_after = match self {
            AppError::RateLimited { retry_after } | AppError::LockContention { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        };
        let missing_fields = match self {
            AppError::ProfileIncomplete(fields) => Some(fields.clone()),
            _ => None,
        };

        let mut builder = HttpResponse::build(code);
        if let Some(secs) = retry_after {
            builder.insert_header(("Retry-After", secs.to_string()));
        }

        builder.json(ErrorBody {
            error: self.to_string(),
            code: code.as_u16(),
            retry_after,
            missing_fields,
        })
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::StoreUnavailable(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
