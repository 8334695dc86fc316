//! Text-to-speech via ElevenLabs, streamed through unmodified.

use std::pin::Pin;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, warn};

use voxrelay_core::config::{
    DEFAULT_OUTPUT_FORMAT, DEFAULT_TTS_MODEL, DEFAULT_VOICE_ID, ELEVENLABS_BASE_URL,
};

/// Encoded audio as it arrives from the synthesis service.
pub type AudioStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// Outcome of a synthesis request.
pub enum Synthesis {
    /// Audio is flowing; `stream` yields the vendor body byte-for-byte.
    Audio {
        content_type: String,
        stream: AudioStream,
    },
    /// The service answered with a JSON error document.
    Rejected(serde_json::Value),
    /// Non-success status or an empty body; carries the raw error text.
    Failed(String),
}

impl std::fmt::Debug for Synthesis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Synthesis::Audio { content_type, .. } => f
                .debug_struct("Audio")
                .field("content_type", content_type)
                .finish_non_exhaustive(),
            Synthesis::Rejected(details) => f.debug_tuple("Rejected").field(details).finish(),
            Synthesis::Failed(text) => f.debug_tuple("Failed").field(text).finish(),
        }
    }
}

/// The synthesis seam.
#[async_trait]
pub trait Synthesizer: Send + Sync {
    fn id(&self) -> &str;

    async fn synthesize(&self, text: &str) -> Result<Synthesis>;
}

pub struct ElevenLabsSynthesizer {
    pub base_url: String,
    pub voice: String,
    pub model: String,
    pub output_format: String,
    api_key: String,
    client: reqwest::Client,
}

impl ElevenLabsSynthesizer {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            base_url: ELEVENLABS_BASE_URL.to_string(),
            voice: DEFAULT_VOICE_ID.to_string(),
            model: DEFAULT_TTS_MODEL.to_string(),
            output_format: DEFAULT_OUTPUT_FORMAT.to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>, model: impl Into<String>) -> Self {
        self.voice = voice.into();
        self.model = model.into();
        self
    }

    pub fn with_output_format(mut self, output_format: impl Into<String>) -> Self {
        self.output_format = output_format.into();
        self
    }

    /// Build the ElevenLabs TTS request URL for the configured voice and format.
    pub fn tts_url(&self) -> String {
        format!(
            "{}/v1/text-to-speech/{}?output_format={}",
            self.base_url, self.voice, self.output_format
        )
    }
}

fn is_json(content_type: &str) -> bool {
    content_type
        .split(';')
        .next()
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

#[async_trait]
impl Synthesizer for ElevenLabsSynthesizer {
    fn id(&self) -> &str {
        "elevenlabs"
    }

    async fn synthesize(&self, text: &str) -> Result<Synthesis> {
        debug!(
            voice = %self.voice,
            model = %self.model,
            text_len = text.len(),
            "Requesting speech synthesis"
        );

        let resp = self
            .client
            .post(self.tts_url())
            .header("xi-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&serde_json::json!({
                "text": text,
                "model_id": self.model,
            }))
            .send()
            .await?;

        let status = resp.status();
        let content_type = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();

        // A JSON body is always an error report, whatever the status says.
        if is_json(&content_type) {
            let body = resp.text().await.unwrap_or_default();
            let details = serde_json::from_str(&body).unwrap_or(serde_json::Value::String(body));
            warn!(%status, "TTS API returned a JSON error");
            return Ok(Synthesis::Rejected(details));
        }

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "TTS API request failed");
            return Ok(Synthesis::Failed(body));
        }

        let mut stream = Box::pin(resp.bytes_stream().map_err(std::io::Error::other));

        // Pull the first chunk so an empty body is reported before any
        // response headers go out.
        let first = loop {
            match stream.next().await {
                Some(Ok(chunk)) if chunk.is_empty() => continue,
                Some(Ok(chunk)) => break chunk,
                Some(Err(e)) => return Err(e.into()),
                None => {
                    warn!(%status, "TTS API returned an empty body");
                    return Ok(Synthesis::Failed(String::new()));
                }
            }
        };

        let head = futures::stream::once(async move { Ok::<Bytes, std::io::Error>(first) });
        let stream = head.chain(stream);
        Ok(Synthesis::Audio {
            content_type,
            stream: Box::pin(stream),
        })
    }
}
