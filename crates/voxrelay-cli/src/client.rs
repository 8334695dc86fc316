//! HTTP client for a running gateway's `POST /api`.
//!
//! Like the browser, it owns the conversation and round-trips the full
//! history with every turn.

use std::path::Path;

use anyhow::{bail, Context, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::Response;
use serde_json::Value;
use tracing::debug;

use voxrelay_core::types::ConversationMessage;

/// One completed exchange.
#[derive(Debug)]
pub struct Turn {
    pub transcript: String,
    pub reply: String,
    pub audio: Bytes,
}

pub struct PipelineClient {
    base_url: String,
    history: Vec<ConversationMessage>,
    client: reqwest::Client,
}

impl PipelineClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            history: Vec::new(),
            client: reqwest::Client::new(),
        }
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    pub async fn send_text(&mut self, text: &str) -> Result<Turn> {
        let form = Form::new().text("input", text.to_string());
        self.send(form).await
    }

    /// Send a recorded clip from disk as the user's turn.
    pub async fn send_audio(&mut self, path: &Path) -> Result<Turn> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read {}", path.display()))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("audio.wav")
            .to_string();
        let mime = mime_guess::from_path(path).first_or_octet_stream();

        let part = Part::bytes(data)
            .file_name(file_name)
            .mime_str(mime.essence_str())?;
        self.send(Form::new().part("input", part)).await
    }

    async fn send(&mut self, mut form: Form) -> Result<Turn> {
        for message in &self.history {
            form = form.text("message", serde_json::to_string(message)?);
        }

        let url = format!("{}/api", self.base_url);
        debug!(url = %url, history = self.history.len(), "Sending turn");
        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .with_context(|| format!("failed to reach gateway at {}", self.base_url))?;

        if !resp.status().is_success() {
            bail!(error_message(resp).await);
        }

        let transcript = decoded_header(&resp, "x-transcript")?;
        let reply = decoded_header(&resp, "x-response")?;
        let audio = resp.bytes().await?;

        self.history.push(ConversationMessage::user(transcript.clone()));
        self.history.push(ConversationMessage::assistant(reply.clone()));

        Ok(Turn {
            transcript,
            reply,
            audio,
        })
    }
}

fn decoded_header(resp: &Response, name: &str) -> Result<String> {
    let raw = resp
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .with_context(|| format!("response is missing the {name} header"))?;
    Ok(urlencoding::decode(raw)?.into_owned())
}

async fn error_message(resp: Response) -> String {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    match serde_json::from_str::<Value>(&body) {
        Ok(json) => {
            let error = json["error"].as_str().unwrap_or("request failed");
            match json.get("details") {
                Some(details) => format!("{status}: {error} ({details})"),
                None => format!("{status}: {error}"),
            }
        }
        Err(_) => format!("{status}: {body}"),
    }
}
