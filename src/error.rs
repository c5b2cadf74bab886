//! Typed errors and HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Registration-time resource definition errors. These abort registration,
/// never a request.
#[derive(Error, Debug)]
pub enum ResourceError {
    #[error("unknown primary key column '{column}' on resource '{resource}'")]
    UnknownPrimaryKey { resource: String, column: String },
    #[error("filter field '{field}' on resource '{resource}' has no backing column")]
    UnknownFilterField { resource: String, field: String },
    #[error("relationship attribute '{attribute}' on resource '{resource}' collides with a column")]
    RelationshipAttributeCollision { resource: String, attribute: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
}

/// One field-level validation message, surfaced in the error body.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{comment}")]
    Validation {
        comment: String,
        errors: Vec<FieldError>,
    },
    /// Pre/post hook rejection; surfaced verbatim as 400.
    #[error("{0}")]
    BusinessRule(String),
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error("export: {0}")]
    Export(String),
}

impl ApiError {
    pub fn validation(comment: impl Into<String>, errors: Vec<FieldError>) -> Self {
        ApiError::Validation {
            comment: comment.into(),
            errors,
        }
    }

    /// Single-message validation error without field granularity.
    pub fn invalid(comment: impl Into<String>) -> Self {
        ApiError::Validation {
            comment: comment.into(),
            errors: Vec::new(),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    comment: String,
    errors: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, comment, errors) = match self {
            ApiError::NotFound(what) => {
                (StatusCode::NOT_FOUND, format!("not found: {what}"), Vec::new())
            }
            ApiError::Validation { comment, errors } => (StatusCode::BAD_REQUEST, comment, errors),
            ApiError::BusinessRule(comment) => (StatusCode::BAD_REQUEST, comment, Vec::new()),
            ApiError::Db(sqlx::Error::RowNotFound) => {
                (StatusCode::NOT_FOUND, "not found".to_string(), Vec::new())
            }
            // Persistence details are logged at the call site, never returned.
            ApiError::Db(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
                Vec::new(),
            ),
            ApiError::Export(comment) => (StatusCode::BAD_REQUEST, comment, Vec::new()),
            ApiError::Resource(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string(), Vec::new()),
        };
        let body = ErrorBody {
            success: false,
            comment,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn validation_maps_to_400() {
        let e = ApiError::validation(
            "validation failed",
            vec![FieldError::new("name", "name is required")],
        );
        let resp = e.into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_maps_to_404() {
        let resp = ApiError::NotFound("orders #42".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn db_errors_are_redacted() {
        let resp = ApiError::Db(sqlx::Error::PoolClosed).into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
