//! HTTP-facing error type.
//!
//! Handlers return [`AppResult`] and the error renders as a JSON body of the
//! form `{"error": "..."}` with a matching status code.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::core::report::ReportError;
use crate::core::storage::StorageError;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// A downstream vendor failed
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadGateway(_) => StatusCode::BAD_GATEWAY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(path) => AppError::NotFound(format!("Not found: {path}")),
            StorageError::InvalidName(name) => AppError::BadRequest(format!("Invalid name: {name}")),
            StorageError::Unavailable(msg) => {
                AppError::ServiceUnavailable(format!("Storage unavailable: {msg}"))
            }
            StorageError::Serialization(e) => AppError::Internal(format!("Serialization error: {e}")),
        }
    }
}

impl From<ReportError> for AppError {
    fn from(err: ReportError) -> Self {
        match err {
            ReportError::EmptyData => AppError::BadRequest(err.to_string()),
            ReportError::Generation(msg) => AppError::BadGateway(msg),
            ReportError::Storage(e) => e.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!("Request failed with {status}: {self}");
        } else {
            warn!("Request rejected with {status}: {self}");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_errors_map_to_status() {
        let cases = [
            (StorageError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (StorageError::InvalidName("..".into()), StatusCode::BAD_REQUEST),
            (
                StorageError::Unavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn test_report_errors_map_to_status() {
        assert_eq!(
            AppError::from(ReportError::EmptyData).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::from(ReportError::Generation("boom".into())).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            AppError::from(ReportError::Storage(StorageError::Unavailable("s3".into())))
                .status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[tokio::test]
    async fn test_response_body_is_json() {
        use http_body_util::BodyExt;

        let response = AppError::NotFound("Report not found".into()).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "Report not found");
    }
}
