//! Retell hosted voice-agent credential issuance.
//!
//! Two flavors exist: the web-call API hands out an access token for the
//! browser SDK, while the older register-call API returns a call id plus the
//! negotiated sample rate for a raw audio websocket.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use voxrelay_core::config::{RetellSettings, RETELL_BASE_URL};
use voxrelay_core::error::UpstreamError;

use crate::{SessionCredential, SessionIssuer};

/// Which Retell call-creation endpoint to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallFlavor {
    WebCall,
    RegisterCall,
}

pub struct RetellIssuer {
    pub base_url: String,
    pub flavor: CallFlavor,
    agent_id: String,
    api_key: String,
    sample_rate: u32,
    client: reqwest::Client,
}

impl RetellIssuer {
    pub fn web_call(settings: &RetellSettings) -> Self {
        Self::new(CallFlavor::WebCall, settings)
    }

    pub fn register_call(settings: &RetellSettings) -> Self {
        Self::new(CallFlavor::RegisterCall, settings)
    }

    fn new(flavor: CallFlavor, settings: &RetellSettings) -> Self {
        let base_url = if settings.base_url.is_empty() {
            RETELL_BASE_URL
        } else {
            settings.base_url.as_str()
        };
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            flavor,
            agent_id: settings.agent_id.clone(),
            api_key: settings.api_key.clone(),
            sample_rate: settings.sample_rate,
            client: reqwest::Client::new(),
        }
    }

    fn endpoint(&self) -> String {
        match self.flavor {
            CallFlavor::WebCall => format!("{}/v2/create-web-call", self.base_url),
            CallFlavor::RegisterCall => format!("{}/register-call", self.base_url),
        }
    }

    fn request_body(&self) -> serde_json::Value {
        match self.flavor {
            CallFlavor::WebCall => json!({ "agent_id": self.agent_id }),
            CallFlavor::RegisterCall => json!({
                "agent_id": self.agent_id,
                "audio_websocket_protocol": "web",
                "audio_encoding": "s16le",
                "sample_rate": self.sample_rate,
            }),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct WebCallResponse {
    access_token: String,
    call_id: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RegisterCallResponse {
    call_id: String,
    sample_rate: u32,
}

#[async_trait]
impl SessionIssuer for RetellIssuer {
    fn id(&self) -> &str {
        match self.flavor {
            CallFlavor::WebCall => "retell-web-call",
            CallFlavor::RegisterCall => "retell-register-call",
        }
    }

    async fn issue(&self) -> anyhow::Result<SessionCredential> {
        let url = self.endpoint();
        debug!(url = %url, agent_id = %self.agent_id, "Creating Retell call");

        let response = self
            .client
            .post(&url)
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&self.request_body())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::new("Retell", status.as_u16(), body).into());
        }

        let credential = match self.flavor {
            CallFlavor::WebCall => {
                let body: WebCallResponse = response.json().await?;
                SessionCredential::WebCall {
                    access_token: body.access_token,
                    call_id: body.call_id,
                }
            }
            CallFlavor::RegisterCall => {
                let body: RegisterCallResponse = response.json().await?;
                SessionCredential::RegisteredCall {
                    call_id: body.call_id,
                    sample_rate: body.sample_rate,
                }
            }
        };

        info!(call_id = credential.call_id(), flavor = ?self.flavor, "Retell call created");
        Ok(credential)
    }
}
