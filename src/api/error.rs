//! Handler errors and their HTTP mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::cache::CacheError;
use crate::jobs::JobError;
use crate::pipeline::loader::LoaderError;

/// API-level errors with HTTP status mapping.
///
/// Bodies are plain text: every caller is an htmx fragment swap or a browser.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Answered with 200 so the message is swapped into the page in place of
    /// the upload form.
    #[error("Invalid file type, expected {expected}")]
    UnsupportedFileType { expected: &'static str },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Server busy")]
    Busy,
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ApiError::UnsupportedFileType { .. } => (StatusCode::OK, self.to_string()),
            ApiError::NotFound(detail) => (StatusCode::NOT_FOUND, detail.clone()),
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, detail.clone()),
            ApiError::Busy => {
                tracing::warn!("Rejecting request, job queue is full");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Too many jobs in progress, try again shortly".to_string(),
                )
            }
            ApiError::Internal(detail) => {
                tracing::error!(detail, "API internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "An internal error occurred".to_string(),
                )
            }
        };

        (status, message).into_response()
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::InvalidKey(raw) => ApiError::BadRequest(format!("Invalid key {raw:?}")),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<JobError> for ApiError {
    fn from(err: JobError) -> Self {
        match err {
            JobError::QueueFull => ApiError::Busy,
            JobError::Closed => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<LoaderError> for ApiError {
    fn from(err: LoaderError) -> Self {
        match err {
            LoaderError::Io(e) => ApiError::Internal(e.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<axum::extract::multipart::MultipartError> for ApiError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ApiError::BadRequest(format!("Malformed upload: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_text(response: Response) -> String {
        let body = to_bytes(response.into_body(), 1024).await.unwrap();
        String::from_utf8(body.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unsupported_file_type_is_plain_200() {
        let response = ApiError::UnsupportedFileType { expected: ".docx" }.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, "Invalid file type, expected .docx");
    }

    #[tokio::test]
    async fn not_found_returns_404() {
        let response = ApiError::NotFound("No terms for Contract.docx".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn busy_returns_503() {
        let response = ApiError::from(JobError::QueueFull).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_hides_details() {
        let response = ApiError::Internal("disk on fire".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_text(response).await, "An internal error occurred");
    }

    #[tokio::test]
    async fn invalid_key_is_bad_request() {
        let err: ApiError = CacheError::InvalidKey("../etc".into()).into();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn loader_error_is_bad_request() {
        let err: ApiError = LoaderError::MissingColumn("Amount").into();
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_text(response).await.contains("Amount"));
    }
}
