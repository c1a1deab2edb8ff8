//! `POST /checkin`: persist a finished check-in.

use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::session::CheckinSubmission;
use crate::core::session::submission::rfc3339_now;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const VALID_SOURCES: [&str; 2] = ["facial", "vocal"];

/// Check the request shape and fill in server-side defaults.
///
/// Fractional timestamps are truncated to whole milliseconds and a missing
/// `createdAt` is stamped with the current time.
pub fn validate_submission(body: &mut Value) -> Result<(), String> {
    let object = body
        .as_object_mut()
        .ok_or("Request body must be a JSON object")?;

    let timeline = object
        .get_mut("emotionTimeline")
        .and_then(Value::as_array_mut)
        .ok_or("emotionTimeline must be an array")?;

    for (index, reading) in timeline.iter_mut().enumerate() {
        validate_reading(reading).map_err(|e| format!("emotionTimeline[{index}]: {e}"))?;
    }

    if !matches!(object.get("createdAt"), Some(Value::String(_))) {
        object.insert("createdAt".to_string(), Value::String(rfc3339_now()));
    }
    for key in ["patientId", "transcript"] {
        match object.get(key) {
            None | Some(Value::Null) | Some(Value::String(_)) => {}
            Some(_) => return Err(format!("{key} must be a string")),
        }
    }
    Ok(())
}

fn validate_reading(reading: &mut Value) -> Result<(), String> {
    let reading: &mut Map<String, Value> = reading
        .as_object_mut()
        .ok_or("reading must be an object")?;

    let timestamp = reading
        .get("timestamp")
        .and_then(Value::as_f64)
        .ok_or("timestamp must be a number")?;
    if !timestamp.is_finite() {
        return Err("timestamp must be finite".to_string());
    }
    reading.insert("timestamp".to_string(), json!(timestamp as i64));

    if !reading.get("confidence").is_some_and(Value::is_number) {
        return Err("confidence must be a number".to_string());
    }

    match reading.get("source").and_then(Value::as_str) {
        Some(source) if VALID_SOURCES.contains(&source) => {}
        _ => return Err("source must be \"facial\" or \"vocal\"".to_string()),
    }

    match reading.get("emotions") {
        None | Some(Value::Null) => {
            reading.remove("emotions");
        }
        Some(Value::Array(emotions)) => {
            for emotion in emotions {
                let valid = emotion.get("name").is_some_and(Value::is_string)
                    && emotion.get("score").is_some_and(Value::is_number);
                if !valid {
                    return Err("emotions must be {name: string, score: number} objects".into());
                }
            }
        }
        Some(_) => return Err("emotions must be an array".to_string()),
    }
    Ok(())
}

/// Store a check-in and return its id.
pub async fn submit_checkin(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let mut value: Value = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid JSON: {e}")))?;

    if let Err(reason) = validate_submission(&mut value) {
        warn!("Rejected check-in: {reason}");
        return Err(AppError::BadRequest(reason));
    }

    let submission: CheckinSubmission = serde_json::from_value(value)
        .map_err(|e| AppError::BadRequest(format!("Invalid check-in: {e}")))?;

    let id = state.repository.save_checkin(&submission).await?;
    info!(
        "Check-in {id} accepted for patient {:?}",
        submission.patient_id.as_deref().unwrap_or("anonymous")
    );

    Ok((
        StatusCode::CREATED,
        Json(json!({ "success": true, "id": id })),
    ))
}
