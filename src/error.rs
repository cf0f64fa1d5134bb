use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

/// Errors returned by the account and freelancer components.
///
/// Components never log these; the HTTP boundary decides what to report.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad input shape or range. Never retried.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Uniqueness violation (email, account_id).
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Store unavailable or timed out. Safe to retry with backoff.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// Missing signing key or unusable hash parameters. Fatal.
    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Configuration(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::Persistence(_))
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::Conflict(_) => "conflict",
            AppError::NotFound(_) => "not_found",
            AppError::Unauthorized(_) => "unauthorized",
            AppError::Forbidden(_) => "forbidden",
            AppError::Persistence(_) => "persistence_error",
            AppError::Configuration(_) => "configuration_error",
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => AppError::NotFound("record not found".into()),
            sqlx::Error::Database(ref db) if db.code().as_deref() == Some("23505") => {
                let constraint = db.constraint().unwrap_or("unique constraint").to_string();
                AppError::Conflict(format!("{} already exists", constraint))
            }
            other => AppError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            AppError::Persistence(msg) => tracing::error!(error = %msg, "persistence failure"),
            AppError::Configuration(msg) => tracing::error!(error = %msg, "configuration error"),
            other => tracing::debug!(error = %other, "request rejected"),
        }
        // Configuration details stay in the logs.
        let message = match &self {
            AppError::Configuration(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let body = Json(json!({ "error": self.code(), "message": message }));
        let mut response = (status, body).into_response();
        if self.is_retryable() {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from_static("1"));
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(AppError::NotFound("x".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Unauthorized("x".into()).status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(AppError::Forbidden("x".into()).status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            AppError::Persistence("x".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            AppError::Configuration("x".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn only_persistence_is_retryable() {
        assert!(AppError::Persistence("timeout".into()).is_retryable());
        assert!(!AppError::Validation("bad".into()).is_retryable());
        assert!(!AppError::Conflict("dup".into()).is_retryable());
        assert!(!AppError::Configuration("key".into()).is_retryable());
    }

    #[test]
    fn retryable_response_carries_retry_after() {
        let res = AppError::Persistence("store down".into()).into_response();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(res.headers().get(header::RETRY_AFTER).unwrap(), "1");

        let res = AppError::Validation("bad".into()).into_response();
        assert!(res.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: AppError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn pool_timeout_maps_to_persistence() {
        let err: AppError = sqlx::Error::PoolTimedOut.into();
        assert!(err.is_retryable());
    }
}
