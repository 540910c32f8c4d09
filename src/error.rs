use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// A single field-level failure, surfaced as `{path, message}` on the wire.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct FieldError {
    pub path: String,
    pub message: String,
}

impl FieldError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Validation error")]
    Validation(Vec<FieldError>),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(rename = "errorMessages")]
    pub error_messages: Vec<FieldError>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }
        let (message, error_messages) = match self {
            ApiError::Validation(errors) => ("Validation error".to_string(), errors),
            other => {
                let message = other.to_string();
                (
                    message.clone(),
                    vec![FieldError::new("", message)],
                )
            }
        };
        let body = ErrorBody {
            success: false,
            message,
            error_messages,
        };
        (status, Json(body)).into_response()
    }
}

/// Field behind a unique constraint, derived from the constraint name.
fn conflict_field(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.contains("email") => "email",
        Some(name) if name.contains("phone") => "phone",
        Some(name) if name.contains("roll") => "roll",
        _ => "value",
    }
}

const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Record not found".into()),
            sqlx::Error::Database(db) if db.code().as_deref() == Some(UNIQUE_VIOLATION) => {
                let field = conflict_field(db.constraint());
                ApiError::Conflict(format!(
                    "This {field} already exists. Please use a different {field}."
                ))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_follow_taxonomy() {
        assert_eq!(
            ApiError::Validation(vec![]).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::NotFound("missing".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Unauthorized("nope".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::Conflict("dup".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn conflict_field_derived_from_constraint_name() {
        assert_eq!(conflict_field(Some("users_email_key")), "email");
        assert_eq!(conflict_field(Some("users_phone_key")), "phone");
        assert_eq!(conflict_field(Some("users_roll_key")), "roll");
        assert_eq!(conflict_field(Some("users_pkey")), "value");
        assert_eq!(conflict_field(None), "value");
    }

    #[test]
    fn row_not_found_maps_to_not_found() {
        let err: ApiError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn anyhow_maps_to_internal() {
        let err: ApiError = anyhow::anyhow!("smtp down").into();
        assert!(matches!(err, ApiError::Internal(_)));
    }

    #[test]
    fn error_body_serializes_envelope() {
        let body = ErrorBody {
            success: false,
            message: "Validation error".into(),
            error_messages: vec![FieldError::new("email", "Invalid email address")],
        };
        let json = serde_json::to_value(&body).expect("serialize");
        assert_eq!(json["success"], false);
        assert_eq!(json["errorMessages"][0]["path"], "email");
        assert_eq!(json["errorMessages"][0]["message"], "Invalid email address");
    }
}
