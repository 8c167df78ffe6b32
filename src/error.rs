use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;

/// Message returned for every single-record lookup that finds nothing
pub const NOT_FOUND_MESSAGE: &str = "No valid entry found for provided ID";

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("No valid entry found for provided ID")]
    NotFound,

    #[error("Validation failed: {0}")]
    ValidationFailed(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::StorageUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DbErr> for ApiError {
    fn from(err: DbErr) -> Self {
        if let Some(SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return ApiError::Conflict(detail);
        }

        match err {
            DbErr::RecordNotFound(_) => ApiError::NotFound,
            DbErr::Conn(_) | DbErr::ConnectionAcquire(_) => {
                ApiError::StorageUnavailable(err.to_string())
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::ValidationFailed(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::NotFound => serde_json::json!({ "message": NOT_FOUND_MESSAGE }),
            ApiError::ValidationFailed(_) | ApiError::Conflict(_) => {
                tracing::debug!("Rejected request: {}", self);
                serde_json::json!({ "error": self.to_string() })
            }
            ApiError::StorageUnavailable(_) => {
                tracing::error!("{}", self);
                serde_json::json!({ "error": "Storage unavailable" })
            }
            ApiError::Internal(_) => {
                tracing::error!("{}", self);
                serde_json::json!({ "error": "Internal server error" })
            }
        };

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Errors raised while reading configuration at start-up
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid database URL: {0}")]
    InvalidDatabaseUrl(#[from] url::ParseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::NotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            ApiError::ValidationFailed("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::StorageUnavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Internal("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_db_error_classification() {
        let err: ApiError = DbErr::RecordNotFound("ingredient".into()).into();
        assert!(matches!(err, ApiError::NotFound));

        let err: ApiError = DbErr::Custom("boom".into()).into();
        assert!(matches!(err, ApiError::Internal(_)));
    }
}
