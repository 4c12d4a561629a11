//! Error types for the HTTP layer
//!
//! Every failure is caught once here and turned into a JSON body of the form
//! `{"error": "<message>", "code": "<CODE>"}`. Upstream messages are passed
//! through unchanged so the client can show them.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::services::extraction::ExtractionError;
use crate::services::notes::NotesError;
use crate::services::reminders::ReminderError;
use crate::services::validation::UploadRejected;
use crate::store::StoreError;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("{0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("{0}")]
    NotFound(String),

    /// Wrong HTTP method (405)
    #[error("Method not allowed")]
    MethodNotAllowed,

    /// Rejected upload (400)
    #[error(transparent)]
    Upload(#[from] UploadRejected),

    /// Schedule pipeline failure (500)
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Pipeline failure on an image this request stored (500); the body
    /// carries `filePath` so the image can be processed again
    #[error("{source}")]
    StoredImage {
        file_path: String,
        source: ExtractionError,
    },

    /// Store failure
    #[error(transparent)]
    Store(#[from] StoreError),

    /// classboard-common error
    #[error(transparent)]
    Common(#[from] classboard_common::Error),
}

impl ApiError {
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::BadRequest(_) | ApiError::Upload(_) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::MethodNotAllowed => (StatusCode::METHOD_NOT_ALLOWED, "METHOD_NOT_ALLOWED"),
            ApiError::Extraction(_) | ApiError::StoredImage { .. } => {
                (StatusCode::INTERNAL_SERVER_ERROR, "EXTRACTION_ERROR")
            }
            ApiError::Store(StoreError::NotFound(_)) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORE_ERROR"),
            ApiError::Common(classboard_common::Error::InvalidInput(_)) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST")
            }
            ApiError::Common(_) => (StatusCode::INTERNAL_SERVER_ERROR, "COMMON_ERROR"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        let message = self.to_string();

        if status.is_server_error() {
            tracing::error!(code, error = %message, "Request failed");
        } else {
            tracing::debug!(code, error = %message, "Request rejected");
        }

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let ApiError::StoredImage { file_path, .. } = self {
            body["filePath"] = json!(file_path);
        }

        (status, Json(body)).into_response()
    }
}

impl From<NotesError> for ApiError {
    fn from(err: NotesError) -> Self {
        match err {
            NotesError::Rejected(rejected) => ApiError::Upload(rejected),
            NotesError::MissingClassCode => ApiError::BadRequest(err.to_string()),
            NotesError::Store(store) => ApiError::Store(store),
        }
    }
}

impl From<ReminderError> for ApiError {
    fn from(err: ReminderError) -> Self {
        match err {
            ReminderError::Store(store) => ApiError::Store(store),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::ReplyParseError;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::BadRequest("x".into()).status_and_code().0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::MethodNotAllowed.status_and_code().0,
            StatusCode::METHOD_NOT_ALLOWED
        );
        assert_eq!(
            ApiError::Store(StoreError::NotFound("reminder 4".into())).status_and_code().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Store(StoreError::Network("down".into())).status_and_code().0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_service_errors_map_to_client_errors() {
        let err = ApiError::from(ReminderError::UnknownClass("999".into()));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "No class with code 999");

        let err = ApiError::from(NotesError::Rejected(UploadRejected::Empty));
        assert_eq!(err.status_and_code().0, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stored_image_failure_names_path() {
        let err = ApiError::StoredImage {
            file_path: "owner/1_a.png".to_string(),
            source: ExtractionError::Parse(ReplyParseError::NoArray),
        };
        assert_eq!(
            err.to_string(),
            "Failed to parse schedule data from AI response: No JSON array found in model reply"
        );

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "EXTRACTION_ERROR");
        assert_eq!(body["filePath"], "owner/1_a.png");
    }

    #[test]
    fn test_method_not_allowed_message() {
        assert_eq!(ApiError::MethodNotAllowed.to_string(), "Method not allowed");
    }
}
