use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

use crate::db::catalog::CatalogError;
use crate::db::DbError;
use crate::llm::LlmError;
use crate::safety::Rejected;

/// Every way a request can fail, mapped to one status code each.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    #[error(transparent)]
    Rejected(#[from] Rejected),
    #[error(transparent)]
    Upstream(#[from] LlmError),
    #[error(transparent)]
    Query(DbError),
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    detail: String,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::NotFound(_) | AppError::Rejected(_) => {
                StatusCode::BAD_REQUEST
            }
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Query(DbError::Query(_)) => StatusCode::BAD_REQUEST,
            AppError::Query(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            AppError::Validation(_) => "validation_error",
            AppError::NotFound(_) => "not_found",
            AppError::Rejected(_) => "rejected",
            AppError::Upstream(_) => "upstream_error",
            AppError::Query(_) => "query_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::Database(db) => AppError::Query(db),
            other => AppError::NotFound(other.to_string()),
        }
    }
}

impl From<DbError> for AppError {
    fn from(err: DbError) -> Self {
        AppError::Query(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<minijinja::Error> for AppError {
    fn from(err: minijinja::Error) -> Self {
        AppError::Internal(format!("Failed to render prompt: {}", err))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("Request failed ({}): {}", status, self);
        } else {
            warn!("Request rejected ({}): {}", status, self);
        }

        let body = ErrorBody {
            error: self.code(),
            detail: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_the_error_taxonomy() {
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::from(Rejected { statement: "DROP".into() }).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(LlmError::RateLimited("429".into())).status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(DbError::Query("syntax error".into())).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(DbError::Unavailable("pool timed out".into())).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn catalog_misses_are_not_found_but_database_failures_are_not() {
        let miss = AppError::from(CatalogError::NoColumns("ghosts".into()));
        assert!(matches!(miss, AppError::NotFound(_)));

        let down = AppError::from(CatalogError::Database(DbError::Unavailable("down".into())));
        assert_eq!(down.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
