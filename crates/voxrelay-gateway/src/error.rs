//! Request failures and their HTTP rendering.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{error, warn};

use voxrelay_core::error::upstream_error;

/// Every way a gateway request can fail. All variants are terminal for the
/// request; nothing is retried.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Invalid request")]
    InvalidRequest(String),

    #[error("Invalid audio")]
    InvalidAudio,

    #[error("Invalid response from LLM")]
    EmptyCompletion,

    #[error("Speech synthesis returned an error")]
    SynthesisError { details: Value },

    #[error("Speech synthesis request failed")]
    SynthesisFailed { details: String },

    #[error("{0} is not configured")]
    ConfigurationMissing(&'static str),

    #[error("Too many requests. Please try again later.")]
    RateLimited,

    #[error("{0}")]
    Upstream(String),

    #[error("Internal server error")]
    Internal(anyhow::Error),
}

impl PipelineError {
    pub fn status(&self) -> StatusCode {
        match self {
            PipelineError::InvalidRequest(_) | PipelineError::InvalidAudio => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Short label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidRequest(_) => "invalid_request",
            PipelineError::InvalidAudio => "invalid_audio",
            PipelineError::EmptyCompletion => "empty_completion",
            PipelineError::SynthesisError { .. } => "synthesis_error",
            PipelineError::SynthesisFailed { .. } => "synthesis_failed",
            PipelineError::ConfigurationMissing(_) => "configuration_missing",
            PipelineError::RateLimited => "rate_limited",
            PipelineError::Upstream(_) => "upstream",
            PipelineError::Internal(_) => "internal",
        }
    }

    /// Classify a chat-completion failure.
    pub fn from_completion(err: anyhow::Error) -> Self {
        match upstream_error(&err) {
            Some(upstream) if upstream.is_rate_limited() => PipelineError::RateLimited,
            _ => PipelineError::Internal(err),
        }
    }

    /// Classify a transcription failure. Anything but a 429 means the
    /// service could not make sense of the clip.
    pub fn from_transcription(err: anyhow::Error) -> Self {
        match upstream_error(&err) {
            Some(upstream) if upstream.is_rate_limited() => PipelineError::RateLimited,
            _ => {
                warn!(error = %err, "Transcription failed");
                PipelineError::InvalidAudio
            }
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            PipelineError::InvalidRequest(reason) => Some(Value::String(reason.clone())),
            PipelineError::SynthesisError { details } => Some(details.clone()),
            PipelineError::SynthesisFailed { details } => Some(Value::String(details.clone())),
            _ => None,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            PipelineError::Internal(err) => {
                error!(error = ?err, "Unexpected error while handling request");
            }
            PipelineError::Upstream(message) => error!(%message, "Upstream call failed"),
            other if status.is_server_error() => {
                error!(kind = other.kind(), details = ?other.details(), "Request failed");
            }
            other => warn!(kind = other.kind(), details = ?other.details(), "Request rejected"),
        }

        #[cfg(feature = "metrics")]
        crate::metrics::record_error(self.kind());

        let mut body = json!({ "error": self.to_string() });
        if let Some(details) = self.details() {
            body["details"] = details;
        }
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxrelay_core::error::UpstreamError;

    async fn body_json(response: Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PipelineError::InvalidRequest("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(PipelineError::InvalidAudio.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            PipelineError::EmptyCompletion.status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::ConfigurationMissing("Pipeline").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::RateLimited.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
    }

    #[test]
    fn test_completion_rate_limit_is_recognized() {
        let err: anyhow::Error = UpstreamError::new("Groq", 429, "slow down").into();
        assert!(matches!(
            PipelineError::from_completion(err),
            PipelineError::RateLimited
        ));

        let err: anyhow::Error = UpstreamError::new("Groq", 503, "down").into();
        assert!(matches!(
            PipelineError::from_completion(err),
            PipelineError::Internal(_)
        ));
    }

    #[test]
    fn test_transcription_failure_is_invalid_audio() {
        let err: anyhow::Error = UpstreamError::new("Transcription", 400, "bad file").into();
        assert!(matches!(
            PipelineError::from_transcription(err),
            PipelineError::InvalidAudio
        ));

        let err: anyhow::Error = UpstreamError::new("Transcription", 429, "").into();
        assert!(matches!(
            PipelineError::from_transcription(err),
            PipelineError::RateLimited
        ));
    }

    #[tokio::test]
    async fn test_synthesis_error_carries_vendor_json() {
        let response = PipelineError::SynthesisError {
            details: json!({"detail": {"status": "quota_exceeded"}}),
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let body = body_json(response).await;
        assert_eq!(body["error"], "Speech synthesis returned an error");
        assert_eq!(body["details"]["detail"]["status"], "quota_exceeded");
    }

    #[tokio::test]
    async fn test_internal_error_hides_cause() {
        let response =
            PipelineError::Internal(anyhow::anyhow!("connection reset by peer")).into_response();
        let body = body_json(response).await;
        assert_eq!(body, json!({"error": "Internal server error"}));
    }
}
