//! Report generation and download.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

use crate::core::report::ReportRequest;
use crate::core::storage::is_valid_object_name;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const REPORT_CONTENT_TYPE: &str = "text/markdown; charset=utf-8";

fn failure(err: AppError) -> Response {
    let status = err.status_code();
    if status.is_server_error() {
        error!("Report generation failed: {err}");
    }
    (
        status,
        Json(json!({ "success": false, "error": err.to_string() })),
    )
        .into_response()
}

/// `POST /generate-report`
pub async fn generate_report(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request: ReportRequest = match serde_json::from_slice(&body) {
        Ok(request) => request,
        Err(e) => return failure(AppError::BadRequest(format!("Invalid report request: {e}"))),
    };

    match state.reports.generate(&request).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => failure(e.into()),
    }
}

/// `GET /reports/{filename}`
pub async fn download_report(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> AppResult<Response> {
    info!("Report download requested - filename={filename}");

    if !is_valid_object_name(&filename) {
        return Err(AppError::BadRequest("Invalid report filename".to_string()));
    }

    let body = state.repository.load_report(&filename).await.map_err(|e| {
        match AppError::from(e) {
            AppError::NotFound(_) => AppError::NotFound("Report not found".to_string()),
            other => other,
        }
    })?;

    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(REPORT_CONTENT_TYPE),
    );
    if let Ok(disposition) = HeaderValue::from_str(&format!("inline; filename=\"{filename}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }
    Ok(response)
}
