//! Voice-agent credential endpoints.
//!
//! Each handler performs exactly one outbound call and returns the issued
//! credential verbatim. Without an API key and agent id nothing is contacted.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use tracing::error;

use voxrelay_providers::{SessionCredential, SessionIssuer};

use crate::error::PipelineError;
use crate::state::GatewayState;

/// `POST /api/retell/token`: `{access_token, call_id}` for the browser SDK.
pub async fn web_call_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<SessionCredential>, PipelineError> {
    let agent = state
        .voice_agent
        .as_ref()
        .ok_or(PipelineError::ConfigurationMissing("Retell"))?;
    issue(agent.web_call.as_ref(), "Failed to create web call").await
}

/// `POST /api/retell/register`: `{call_id, sample_rate}` for a raw audio socket.
pub async fn register_call_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<Json<SessionCredential>, PipelineError> {
    let agent = state
        .voice_agent
        .as_ref()
        .ok_or(PipelineError::ConfigurationMissing("Retell"))?;
    issue(agent.register_call.as_ref(), "Failed to register call").await
}

async fn issue(
    issuer: &dyn SessionIssuer,
    failure: &str,
) -> Result<Json<SessionCredential>, PipelineError> {
    match issuer.issue().await {
        Ok(credential) => Ok(Json(credential)),
        Err(e) => {
            error!(issuer = issuer.id(), error = %e, "Credential issuance failed");
            Err(PipelineError::Upstream(failure.to_string()))
        }
    }
}
