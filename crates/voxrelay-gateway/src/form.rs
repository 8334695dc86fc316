//! Multipart parsing for `POST /api`.
//!
//! The form carries one `input` field (a text value, or a file part holding a
//! recorded clip) and any number of `message` fields, each a JSON-encoded
//! conversation message. Everything else is ignored.

use axum::extract::Multipart;
use tracing::debug;

use voxrelay_core::types::{AudioClip, ConversationMessage, PipelineInput, PipelineRequest};

use crate::error::PipelineError;

const DEFAULT_AUDIO_TYPE: &str = "application/octet-stream";

fn invalid(reason: impl Into<String>) -> PipelineError {
    PipelineError::InvalidRequest(reason.into())
}

/// Read and validate the whole form before any vendor is contacted.
pub async fn parse_pipeline_form(mut multipart: Multipart) -> Result<PipelineRequest, PipelineError> {
    let mut input: Option<PipelineInput> = None;
    let mut history = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| invalid(format!("malformed multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "input" => {
                if input.is_some() {
                    return Err(invalid("expected exactly one 'input' field"));
                }
                let file_name = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| invalid(format!("could not read 'input': {e}")))?;

                input = Some(match file_name {
                    Some(file_name) => {
                        if data.is_empty() {
                            return Err(invalid("audio file is empty"));
                        }
                        PipelineInput::Audio(AudioClip {
                            data,
                            file_name,
                            content_type: content_type
                                .unwrap_or_else(|| DEFAULT_AUDIO_TYPE.to_string()),
                        })
                    }
                    None => {
                        let text = String::from_utf8(data.to_vec())
                            .map_err(|_| invalid("text input is not valid UTF-8"))?;
                        if text.is_empty() {
                            return Err(invalid("text input is empty"));
                        }
                        PipelineInput::Text(text)
                    }
                });
            }
            "message" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| invalid(format!("could not read 'message': {e}")))?;
                let message: ConversationMessage = serde_json::from_str(&raw)
                    .map_err(|e| invalid(format!("invalid 'message' entry: {e}")))?;
                history.push(message);
            }
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }

    let input = input.ok_or_else(|| invalid("missing 'input' field"))?;
    Ok(PipelineRequest { input, history })
}
