//! HTTP error mapping.

use crate::error::{PageSmithError, SerializeError};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("Processing log is not configured")]
    LogDisabled,

    #[error(transparent)]
    Tool(#[from] PageSmithError),

    #[error("Database error")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: &'static str,
    retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::UnknownTool(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::LogDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Tool(e) => match e {
                PageSmithError::Validation(crate::error::ValidationError::TooLarge { .. }) => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                PageSmithError::Validation(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
                PageSmithError::Parse(_)
                | PageSmithError::Serialize(SerializeError::EmptyDocument)
                | PageSmithError::PageOutOfRange { .. }
                | PageSmithError::InvalidRange { .. }
                | PageSmithError::InvalidEdit(_)
                | PageSmithError::InvalidConfig(_)
                | PageSmithError::NothingLoaded { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                PageSmithError::ToolUnavailable(_) => StatusCode::NOT_IMPLEMENTED,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn code(&self) -> &'static str {
        match self {
            ApiError::UnknownTool(_) => "UNKNOWN_TOOL",
            ApiError::BadRequest(_) => "BAD_REQUEST",
            ApiError::LogDisabled => "LOG_DISABLED",
            ApiError::Database(_) => "DATABASE_ERROR",
            ApiError::Tool(PageSmithError::Validation(_)) => "VALIDATION_ERROR",
            ApiError::Tool(PageSmithError::Parse(_)) => "PARSE_ERROR",
            ApiError::Tool(PageSmithError::Serialize(SerializeError::EmptyDocument)) => {
                "EMPTY_DOCUMENT"
            }
            ApiError::Tool(PageSmithError::ToolUnavailable(_)) => "TOOL_UNAVAILABLE",
            ApiError::Tool(e) if !e.is_retryable() => "INVALID_EDIT",
            ApiError::Tool(_) => "PROCESSING_FAILED",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{:?}", self);
        }

        // Internal details leak only from debug builds.
        let (error, details) = match &self {
            ApiError::Database(e) => (
                self.to_string(),
                cfg!(debug_assertions).then(|| e.to_string()),
            ),
            ApiError::Tool(e) if status == StatusCode::INTERNAL_SERVER_ERROR => (
                "Processing failed".to_string(),
                cfg!(debug_assertions).then(|| e.to_string()),
            ),
            _ => (self.to_string(), None),
        };
        let retryable = match &self {
            ApiError::Tool(e) => e.is_retryable(),
            ApiError::Database(_) => true,
            _ => false,
        };

        let body = Json(ErrorResponse {
            error,
            code: self.code(),
            retryable,
            details,
        });
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, ValidationError};

    #[test]
    fn status_codes() {
        assert_eq!(
            ApiError::UnknownTool("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        let too_large = ApiError::from(PageSmithError::from(ValidationError::TooLarge {
            filename: "a.pdf".into(),
            size: 2,
            limit: 1,
        }));
        assert_eq!(too_large.status_code(), StatusCode::PAYLOAD_TOO_LARGE);
        let corrupt = ApiError::from(PageSmithError::from(ParseError::Encrypted));
        assert_eq!(corrupt.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(corrupt.code(), "PARSE_ERROR");
        let empty = ApiError::from(PageSmithError::from(SerializeError::EmptyDocument));
        assert_eq!(empty.code(), "EMPTY_DOCUMENT");
    }

    #[test]
    fn internal_errors_hide_message() {
        let response = ApiError::from(PageSmithError::Internal("secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
