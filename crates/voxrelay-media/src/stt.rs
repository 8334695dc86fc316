//! Speech-to-text over a Whisper-compatible transcription API.

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

use voxrelay_core::config::GROQ_BASE_URL;
use voxrelay_core::error::UpstreamError;
use voxrelay_core::types::AudioClip;

/// The transcription seam.
#[async_trait]
pub trait Transcriber: Send + Sync {
    fn id(&self) -> &str;

    /// Transcribe a whole clip. The returned text is trimmed and may be empty.
    async fn transcribe(&self, clip: &AudioClip) -> Result<String>;
}

/// Whisper via Groq or OpenAI (`/v1/audio/transcriptions`).
pub struct WhisperTranscriber {
    pub base_url: String,
    pub model: String,
    api_key: String,
    client: reqwest::Client,
}

impl WhisperTranscriber {
    pub fn new(base_url: Option<&str>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url
                .unwrap_or(GROQ_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.into(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Get the transcription API URL.
    pub fn url(&self) -> String {
        format!("{}/v1/audio/transcriptions", self.base_url)
    }
}

#[async_trait]
impl Transcriber for WhisperTranscriber {
    fn id(&self) -> &str {
        "whisper"
    }

    async fn transcribe(&self, clip: &AudioClip) -> Result<String> {
        let url = self.url();

        debug!(
            url = %url,
            model = %self.model,
            bytes = clip.data.len(),
            file = %clip.file_name,
            "Sending audio for transcription"
        );

        let part = reqwest::multipart::Part::bytes(clip.data.to_vec())
            .file_name(clip.file_name.clone())
            .mime_str(&clip.content_type)?;

        let form = reqwest::multipart::Form::new()
            .text("model", self.model.clone())
            .text("response_format", "text")
            .part("file", part);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::new("Transcription", status.as_u16(), body).into());
        }

        let text = resp.text().await?;
        Ok(text.trim().to_string())
    }
}
