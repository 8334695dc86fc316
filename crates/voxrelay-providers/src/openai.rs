//! OpenAI-compatible Chat Completions provider.
//!
//! Calls `{base_url}/v1/chat/completions` without streaming. Groq's
//! OpenAI-compatible endpoint is the default; any compatible server works.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use voxrelay_core::config::GROQ_BASE_URL;
use voxrelay_core::error::UpstreamError;

use crate::{ChatCompleter, ChatMessage, CompletionRequest};

pub struct OpenAiChat {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiChat {
    /// Groq by default; `base_url` points it at any compatible server.
    pub fn groq(base_url: Option<&str>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.unwrap_or(GROQ_BASE_URL).trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }
}

// --- OpenAI request/response types ---

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatCompletionResponse {
    fn first_content(self) -> Option<String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .filter(|c| !c.is_empty())
    }
}

#[async_trait]
impl ChatCompleter for OpenAiChat {
    fn id(&self) -> &str {
        "groq"
    }

    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Option<String>> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: &request.messages,
            stream: false,
        };

        debug!(
            model = %self.model,
            base_url = %self.base_url,
            messages = request.messages.len(),
            "Requesting chat completion"
        );

        let response = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header("authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::new("Groq", status.as_u16(), body).into());
        }

        let parsed: ChatCompletionResponse = response.json().await?;
        Ok(parsed.first_content())
    }
}
