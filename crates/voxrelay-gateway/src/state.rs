//! Gateway shared state.

use std::sync::Arc;

use tracing::{info, warn};

use voxrelay_core::config::{PipelineSettings, Settings};
use voxrelay_media::{ElevenLabsSynthesizer, Synthesizer, Transcriber, WhisperTranscriber};
use voxrelay_providers::openai::OpenAiChat;
use voxrelay_providers::retell::RetellIssuer;
use voxrelay_providers::{ChatCompleter, SessionIssuer};

/// The three services behind `POST /api`, called strictly in order.
#[derive(Clone)]
pub struct Pipeline {
    pub transcriber: Arc<dyn Transcriber>,
    pub chat: Arc<dyn ChatCompleter>,
    pub synthesizer: Arc<dyn Synthesizer>,
    /// Template with `{location}` and `{time}` placeholders.
    pub system_prompt: String,
}

/// Both credential flavors share one Retell account and agent.
#[derive(Clone)]
pub struct VoiceAgent {
    pub web_call: Arc<dyn SessionIssuer>,
    pub register_call: Arc<dyn SessionIssuer>,
}

/// Shared gateway state accessible from all handlers.
///
/// Built once at startup and never mutated; a `None` service means its
/// credentials were missing and the matching endpoints answer 500 without
/// any outbound call.
#[derive(Clone, Default)]
pub struct GatewayState {
    pub pipeline: Option<Pipeline>,
    pub voice_agent: Option<VoiceAgent>,
    #[cfg(feature = "metrics")]
    pub metrics_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
}

impl GatewayState {
    pub fn new(pipeline: Option<Pipeline>, voice_agent: Option<VoiceAgent>) -> Self {
        Self {
            pipeline,
            voice_agent,
            #[cfg(feature = "metrics")]
            metrics_handle: None,
        }
    }

    /// Construct the production vendor clients from resolved settings.
    pub fn from_settings(settings: &Settings) -> Self {
        let pipeline = settings.pipeline.as_ref().map(build_pipeline);
        if pipeline.is_none() {
            warn!("Pipeline disabled: chat, transcription, or TTS API key missing");
        }

        let voice_agent = settings.retell.as_ref().map(|retell| {
            info!(agent_id = %retell.agent_id, "Retell credential endpoints enabled");
            VoiceAgent {
                web_call: Arc::new(RetellIssuer::web_call(retell)) as Arc<dyn SessionIssuer>,
                register_call: Arc::new(RetellIssuer::register_call(retell)),
            }
        });
        if voice_agent.is_none() {
            warn!("Retell disabled: API key or agent id missing");
        }

        Self::new(pipeline, voice_agent)
    }

    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, handle: metrics_exporter_prometheus::PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

fn build_pipeline(settings: &PipelineSettings) -> Pipeline {
    let transcriber = WhisperTranscriber::new(
        Some(&settings.transcription_base_url),
        settings.transcription_api_key.clone(),
        settings.transcription_model.clone(),
    );
    let chat = OpenAiChat::groq(
        Some(&settings.chat_base_url),
        settings.chat_api_key.clone(),
        settings.chat_model.clone(),
    );
    let synthesizer = ElevenLabsSynthesizer::new(settings.tts_api_key.clone())
        .with_base_url(&settings.tts_base_url)
        .with_voice(settings.voice.clone(), settings.tts_model.clone())
        .with_output_format(settings.output_format.clone());

    info!(
        chat_model = %settings.chat_model,
        stt_model = %settings.transcription_model,
        voice = %settings.voice,
        "Pipeline enabled"
    );

    Pipeline {
        transcriber: Arc::new(transcriber),
        chat: Arc::new(chat),
        synthesizer: Arc::new(synthesizer),
        system_prompt: settings.system_prompt.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use voxrelay_core::config::RetellSettings;

    fn pipeline_settings() -> PipelineSettings {
        PipelineSettings {
            chat_api_key: "gsk".into(),
            chat_base_url: "https://api.groq.com/openai".into(),
            chat_model: "llama3-8b-8192".into(),
            system_prompt: "Be brief.".into(),
            transcription_api_key: "gsk".into(),
            transcription_base_url: "https://api.groq.com/openai".into(),
            transcription_model: "whisper-large-v3".into(),
            tts_api_key: "xi".into(),
            tts_base_url: "https://api.elevenlabs.io".into(),
            voice: "c46FXHKyrgHrLKKtjiy2".into(),
            tts_model: "eleven_multilingual_v2".into(),
            output_format: "mp3_44100_128".into(),
        }
    }

    #[test]
    fn test_empty_settings_disable_everything() {
        let state = GatewayState::from_settings(&Settings::default());
        assert!(state.pipeline.is_none());
        assert!(state.voice_agent.is_none());
    }

    #[test]
    fn test_full_settings_wire_vendor_clients() {
        let settings = Settings {
            pipeline: Some(pipeline_settings()),
            retell: Some(RetellSettings {
                api_key: "key".into(),
                agent_id: "agent".into(),
                base_url: "https://api.retellai.com".into(),
                sample_rate: 24000,
            }),
        };
        let state = GatewayState::from_settings(&settings);

        let pipeline = state.pipeline.expect("pipeline");
        assert_eq!(pipeline.transcriber.id(), "whisper");
        assert_eq!(pipeline.chat.id(), "groq");
        assert_eq!(pipeline.synthesizer.id(), "elevenlabs");
        assert_eq!(pipeline.system_prompt, "Be brief.");

        let agent = state.voice_agent.expect("voice agent");
        assert_eq!(agent.web_call.id(), "retell-web-call");
        assert_eq!(agent.register_call.id(), "retell-register-call");
    }
}
