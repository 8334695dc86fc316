//! `POST /api/track`: UI analytics sink.
//!
//! Events are validated and logged, never stored.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use voxrelay_core::call::CallEvent;

use crate::error::PipelineError;

/// Events the chat page reports for its own inputs.
const INPUT_EVENTS: &[&str] = &["text_input", "speech_input"];

#[derive(Debug, Deserialize)]
struct TrackRequest {
    event: String,
}

/// Whether `name` is a known input event or call lifecycle event.
pub fn is_known_event(name: &str) -> bool {
    INPUT_EVENTS.contains(&name) || call_event(name).is_some()
}

fn call_event(name: &str) -> Option<CallEvent> {
    serde_json::from_value(serde_json::json!({ "event": name })).ok()
}

pub async fn track_handler(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<StatusCode, PipelineError> {
    let Json(body) = body.map_err(|e| PipelineError::InvalidRequest(e.body_text()))?;
    let request: TrackRequest = serde_json::from_value(body)
        .map_err(|e| PipelineError::InvalidRequest(format!("invalid track body: {e}")))?;

    if !is_known_event(&request.event) {
        return Err(PipelineError::InvalidRequest(format!(
            "unknown event '{}'",
            request.event
        )));
    }

    info!(event = %request.event, "UI event");
    Ok(StatusCode::NO_CONTENT)
}
