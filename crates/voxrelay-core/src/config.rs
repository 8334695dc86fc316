//! Configuration loading, secret resolution, and validation.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
pub const RETELL_BASE_URL: &str = "https://api.retellai.com";

pub const DEFAULT_CHAT_MODEL: &str = "llama3-8b-8192";
pub const DEFAULT_VOICE_ID: &str = "c46FXHKyrgHrLKKtjiy2";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";
pub const DEFAULT_OUTPUT_FORMAT: &str = "mp3_44100_128";
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// System instruction sent ahead of every conversation.
///
/// `{location}` and `{time}` are filled in per request.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a friendly and helpful voice assistant. \
Respond briefly to the user's request, in the language the user speaks. \
Your answers are read aloud, so do not use markdown, emojis, or other formatting. \
User location: {location}. Current time: {time}.";

/// Top-level voxrelay configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway: Option<GatewayConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub chat: Option<ChatConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcription: Option<TranscriptionConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tts: Option<TtsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub retell: Option<RetellConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub player: Option<PlayerConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind: Option<String>,

    /// Serve the embedded browser UI at `/`.
    #[serde(default)]
    pub ui: bool,

    /// Largest accepted pipeline submission (default 25 MiB, the Whisper upload cap).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_upload_bytes: Option<usize>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// Chat-completion (LLM) configuration. Any OpenAI-compatible endpoint works.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChatConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Base URL without the `/v1/...` suffix (default: Groq).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// System prompt template; supports `{location}` and `{time}`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Voice transcription (speech-to-text) configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionConfig {
    /// Provider: "groq" or "openai" (default: "groq").
    #[serde(default = "default_transcription_provider")]
    pub provider: String,

    /// Falls back to the chat key when unset and the providers match.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Model name (e.g. "whisper-large-v3").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl Default for TranscriptionConfig {
    fn default() -> Self {
        Self {
            provider: default_transcription_provider(),
            api_key: None,
            api_key_env: None,
            base_url: None,
            model: None,
        }
    }
}

fn default_transcription_provider() -> String {
    "groq".into()
}

impl TranscriptionConfig {
    /// Default model for the configured provider.
    pub fn default_model(&self) -> &'static str {
        match self.provider.as_str() {
            "openai" => "whisper-1",
            _ => "whisper-large-v3",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self.provider.as_str() {
            "openai" => OPENAI_BASE_URL,
            _ => GROQ_BASE_URL,
        }
    }

    pub fn default_key_env(&self) -> &'static str {
        match self.provider.as_str() {
            "openai" => "OPENAI_API_KEY",
            _ => "GROQ_API_KEY",
        }
    }
}

/// Text-to-speech (ElevenLabs) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TtsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Voice ID.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Model ID (e.g. "eleven_multilingual_v2").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Output format (default: "mp3_44100_128").
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_format: Option<String>,
}

/// Hosted voice-agent (Retell) configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetellConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Sample rate requested by the register-call variant (default: 24000).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "plain" (default) or "json".
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Log level override (trace/debug/info/warn/error).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,

    /// Per-crate log level overrides (e.g. "voxrelay_gateway=debug").
    #[serde(default)]
    pub filters: Vec<String>,

    /// Output target: "stderr" (default) or "stdout".
    #[serde(default = "default_log_output")]
    pub output: String,
}

fn default_log_format() -> String {
    "plain".into()
}

fn default_log_output() -> String {
    "stderr".into()
}

/// Audio playback for the terminal client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerConfig {
    /// Player command and arguments; the audio file path is appended.
    /// Default: `ffplay -nodisp -autoexit -loglevel quiet`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,
}

/// Resolve a secret: check the direct value first, then the env-var reference.
pub fn resolve_secret_field(direct: &Option<String>, env_var: &Option<String>) -> Option<String> {
    if let Some(val) = direct {
        if !val.is_empty() {
            return Some(val.clone());
        }
    }
    if let Some(env) = env_var {
        return env_value(env);
    }
    None
}

/// Like [`resolve_secret_field`], falling back to a conventional env var.
fn resolve_with_fallback(
    direct: &Option<String>,
    env_var: &Option<String>,
    fallback_env: &str,
) -> Option<String> {
    resolve_secret_field(direct, env_var).or_else(|| env_value(fallback_env))
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Substitute `${ENV_VAR}` patterns in a string with their environment variable values.
fn substitute_env_vars(input: &str) -> String {
    let re = regex::Regex::new(r"\$\{([^}]+)\}").expect("static regex");
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .into_owned()
}

/// Connection details for the three pipeline services, fully resolved.
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub chat_api_key: String,
    pub chat_base_url: String,
    pub chat_model: String,
    pub system_prompt: String,
    pub transcription_api_key: String,
    pub transcription_base_url: String,
    pub transcription_model: String,
    pub tts_api_key: String,
    pub tts_base_url: String,
    pub voice: String,
    pub tts_model: String,
    pub output_format: String,
}

/// Connection details for the hosted voice-agent platform.
#[derive(Debug, Clone)]
pub struct RetellSettings {
    pub api_key: String,
    pub agent_id: String,
    pub base_url: String,
    pub sample_rate: u32,
}

/// Configuration resolved once at startup.
///
/// A `None` section means the corresponding endpoints answer 500 without
/// contacting any vendor.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub pipeline: Option<PipelineSettings>,
    pub retell: Option<RetellSettings>,
}

impl Config {
    /// Load config from a JSON5 file, substituting `${ENV_VAR}` references.
    pub fn load(path: &Path) -> crate::error::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path).map_err(crate::error::VoxError::Io)?;

        // Substitute ${ENV_VAR} references before parsing
        let substituted = substitute_env_vars(&raw);

        let config: Config = json5::from_str(&substituted)
            .map_err(|e| crate::error::VoxError::Config(e.to_string()))?;

        Ok(config)
    }

    /// Resolve the config file path.
    pub fn config_dir() -> PathBuf {
        data_dir().join("config.json")
    }

    /// Gateway port.
    pub fn gateway_port(&self) -> u16 {
        self.gateway.as_ref().map(|g| g.port).unwrap_or(DEFAULT_PORT)
    }

    /// Gateway bind address.
    pub fn gateway_bind(&self) -> String {
        self.gateway
            .as_ref()
            .and_then(|g| g.bind.clone())
            .unwrap_or_else(|| "0.0.0.0".to_string())
    }

    pub fn ui_enabled(&self) -> bool {
        self.gateway.as_ref().is_some_and(|g| g.ui)
    }

    pub fn max_upload_bytes(&self) -> usize {
        self.gateway
            .as_ref()
            .and_then(|g| g.max_upload_bytes)
            .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
    }

    /// Resolve the chat-completion API key (`GROQ_API_KEY` fallback).
    pub fn chat_api_key(&self) -> Option<String> {
        let chat = self.chat.clone().unwrap_or_default();
        resolve_with_fallback(&chat.api_key, &chat.api_key_env, "GROQ_API_KEY")
    }

    /// Resolve the transcription API key.
    ///
    /// With the default Groq provider this shares the chat key, as one Groq
    /// account serves both Whisper and chat completions.
    pub fn transcription_api_key(&self) -> Option<String> {
        let stt = self.transcription.clone().unwrap_or_default();
        resolve_with_fallback(&stt.api_key, &stt.api_key_env, stt.default_key_env()).or_else(
            || {
                if stt.provider == "groq" {
                    self.chat_api_key()
                } else {
                    None
                }
            },
        )
    }

    /// Resolve the ElevenLabs API key (`ELEVENLABS_API_KEY` fallback).
    pub fn tts_api_key(&self) -> Option<String> {
        let tts = self.tts.clone().unwrap_or_default();
        resolve_with_fallback(&tts.api_key, &tts.api_key_env, "ELEVENLABS_API_KEY")
    }

    pub fn retell_api_key(&self) -> Option<String> {
        let retell = self.retell.clone().unwrap_or_default();
        resolve_with_fallback(&retell.api_key, &retell.api_key_env, "RETELL_API_KEY")
    }

    pub fn retell_agent_id(&self) -> Option<String> {
        let retell = self.retell.clone().unwrap_or_default();
        resolve_with_fallback(&retell.agent_id, &retell.agent_id_env, "RETELL_AGENT_ID")
    }

    /// Resolve every section into [`Settings`].
    pub fn resolve(&self) -> Settings {
        Settings {
            pipeline: self.resolve_pipeline(),
            retell: self.resolve_retell(),
        }
    }

    fn resolve_pipeline(&self) -> Option<PipelineSettings> {
        let chat = self.chat.clone().unwrap_or_default();
        let stt = self.transcription.clone().unwrap_or_default();
        let tts = self.tts.clone().unwrap_or_default();

        Some(PipelineSettings {
            chat_api_key: self.chat_api_key()?,
            chat_base_url: trim_base(chat.base_url.as_deref().unwrap_or(GROQ_BASE_URL)),
            chat_model: chat.model.unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            system_prompt: chat
                .system_prompt
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string()),
            transcription_api_key: self.transcription_api_key()?,
            transcription_base_url: trim_base(
                stt.base_url.as_deref().unwrap_or(stt.default_base_url()),
            ),
            transcription_model: stt
                .model
                .clone()
                .unwrap_or_else(|| stt.default_model().to_string()),
            tts_api_key: self.tts_api_key()?,
            tts_base_url: trim_base(tts.base_url.as_deref().unwrap_or(ELEVENLABS_BASE_URL)),
            voice: tts.voice.unwrap_or_else(|| DEFAULT_VOICE_ID.to_string()),
            tts_model: tts.model.unwrap_or_else(|| DEFAULT_TTS_MODEL.to_string()),
            output_format: tts
                .output_format
                .unwrap_or_else(|| DEFAULT_OUTPUT_FORMAT.to_string()),
        })
    }

    fn resolve_retell(&self) -> Option<RetellSettings> {
        let retell = self.retell.clone().unwrap_or_default();
        Some(RetellSettings {
            api_key: self.retell_api_key()?,
            agent_id: self.retell_agent_id()?,
            base_url: trim_base(retell.base_url.as_deref().unwrap_or(RETELL_BASE_URL)),
            sample_rate: retell.sample_rate.unwrap_or(DEFAULT_SAMPLE_RATE),
        })
    }

    /// Get a config value by dotted path (e.g. "gateway.port", "tts.voice").
    pub fn get_path(&self, path: &str) -> Option<serde_json::Value> {
        let json = serde_json::to_value(self).ok()?;
        let mut current = &json;
        for segment in path.split('.') {
            current = current.get(segment)?;
        }
        Some(current.clone())
    }

    /// Validate config, returning (warnings, errors).
    pub fn validate(&self) -> (Vec<String>, Vec<String>) {
        let mut warnings = Vec::new();
        let mut errors = Vec::new();

        if self.chat_api_key().is_none() {
            warnings.push(
                "No chat API key configured (chat.api_key or GROQ_API_KEY); /api will answer 500"
                    .to_string(),
            );
        }
        if self.transcription_api_key().is_none() {
            warnings.push(
                "No transcription API key configured; /api will answer 500".to_string(),
            );
        }
        if self.tts_api_key().is_none() {
            warnings.push(
                "No TTS API key configured (tts.api_key or ELEVENLABS_API_KEY); /api will answer 500"
                    .to_string(),
            );
        }
        match (self.retell_api_key(), self.retell_agent_id()) {
            (Some(_), None) => warnings.push(
                "Retell API key set but no agent id (retell.agent_id or RETELL_AGENT_ID)"
                    .to_string(),
            ),
            (None, Some(_)) => warnings.push(
                "Retell agent id set but no API key (retell.api_key or RETELL_API_KEY)"
                    .to_string(),
            ),
            _ => {}
        }

        if let Some(stt) = &self.transcription {
            if !matches!(stt.provider.as_str(), "groq" | "openai") {
                errors.push(format!(
                    "Unknown transcription provider '{}' (expected groq or openai)",
                    stt.provider
                ));
            }
        }

        if let Some(gw) = &self.gateway {
            if gw.port == 0 {
                errors.push("Gateway port cannot be 0".to_string());
            }
            if gw.max_upload_bytes == Some(0) {
                errors.push("gateway.max_upload_bytes cannot be 0".to_string());
            }
        }

        if let Some(logging) = &self.logging {
            if !matches!(logging.format.as_str(), "plain" | "json") {
                errors.push(format!("Unknown log format '{}'", logging.format));
            }
        }

        (warnings, errors)
    }
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// Base directory for voxrelay data: `~/.voxrelay/`
pub fn data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".voxrelay")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_config() -> Config {
        Config {
            chat: Some(ChatConfig {
                api_key: Some("gsk-test".into()),
                ..ChatConfig::default()
            }),
            tts: Some(TtsConfig {
                api_key: Some("xi-test".into()),
                ..TtsConfig::default()
            }),
            ..Config::default()
        }
    }

    #[test]
    fn test_env_var_substitution() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_VR_KEY", "sk-test-123") };
        let input = r#"{"key": "${TEST_VR_KEY}", "other": "plain"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains("sk-test-123"));
        assert!(result.contains("plain"));
        unsafe { std::env::remove_var("TEST_VR_KEY") };
    }

    #[test]
    fn test_env_var_missing() {
        let input = r#"{"key": "${NONEXISTENT_VAR_VR_TEST}"}"#;
        let result = substitute_env_vars(input);
        assert!(result.contains(r#""""#)); // empty string
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.gateway_port(), 3000);
        assert_eq!(config.gateway_bind(), "0.0.0.0");
        assert!(!config.ui_enabled());
        assert_eq!(config.max_upload_bytes(), 25 * 1024 * 1024);
    }

    #[test]
    fn test_resolve_secret_direct_wins() {
        // SAFETY: test-only, single-threaded test runner
        unsafe { std::env::set_var("TEST_VR_SECRET", "from-env") };
        assert_eq!(
            resolve_secret_field(&None, &Some("TEST_VR_SECRET".into())),
            Some("from-env".into())
        );
        assert_eq!(
            resolve_secret_field(&Some("direct".into()), &Some("TEST_VR_SECRET".into())),
            Some("direct".into())
        );
        assert_eq!(
            resolve_secret_field(&Some(String::new()), &None),
            None
        );
        unsafe { std::env::remove_var("TEST_VR_SECRET") };
    }

    #[test]
    fn test_resolve_pipeline_defaults() {
        let settings = pipeline_config().resolve();
        let pipeline = settings.pipeline.expect("pipeline should resolve");
        assert_eq!(pipeline.chat_api_key, "gsk-test");
        // Groq transcription shares the chat key
        if std::env::var("GROQ_API_KEY").is_err() {
            assert_eq!(pipeline.transcription_api_key, "gsk-test");
        }
        assert_eq!(pipeline.chat_base_url, GROQ_BASE_URL);
        assert_eq!(pipeline.chat_model, "llama3-8b-8192");
        assert_eq!(pipeline.transcription_model, "whisper-large-v3");
        assert_eq!(pipeline.voice, "c46FXHKyrgHrLKKtjiy2");
        assert_eq!(pipeline.tts_model, "eleven_multilingual_v2");
        assert_eq!(pipeline.output_format, "mp3_44100_128");
        assert!(pipeline.system_prompt.contains("{location}"));
    }

    #[test]
    fn test_resolve_pipeline_missing_tts_key() {
        let mut config = pipeline_config();
        config.tts = Some(TtsConfig {
            api_key_env: Some("NONEXISTENT_VR_TTS_KEY".into()),
            ..TtsConfig::default()
        });
        // Only meaningful when the conventional fallback is absent too.
        if std::env::var("ELEVENLABS_API_KEY").is_err() {
            assert!(config.resolve().pipeline.is_none());
        }
    }

    #[test]
    fn test_resolve_retell_requires_agent_id() {
        let config = Config {
            retell: Some(RetellConfig {
                api_key: Some("key_test".into()),
                agent_id_env: Some("NONEXISTENT_VR_AGENT".into()),
                ..RetellConfig::default()
            }),
            ..Config::default()
        };
        if std::env::var("RETELL_AGENT_ID").is_err() {
            assert!(config.resolve().retell.is_none());
        }

        let config = Config {
            retell: Some(RetellConfig {
                api_key: Some("key_test".into()),
                agent_id: Some("agent_1".into()),
                base_url: Some("http://localhost:9999/".into()),
                ..RetellConfig::default()
            }),
            ..Config::default()
        };
        let retell = config.resolve().retell.expect("retell should resolve");
        assert_eq!(retell.agent_id, "agent_1");
        assert_eq!(retell.base_url, "http://localhost:9999");
        assert_eq!(retell.sample_rate, 24000);
    }

    #[test]
    fn test_load_json5_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{
                // comments are allowed
                gateway: { port: 8080, ui: true },
                tts: { voice: "Rachel" },
            }"#,
        )
        .unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.gateway_port(), 8080);
        assert!(config.ui_enabled());
        assert_eq!(
            config.get_path("tts.voice"),
            Some(serde_json::json!("Rachel"))
        );
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let config = Config::load(Path::new("/nonexistent/voxrelay/config.json")).unwrap();
        assert!(config.gateway.is_none());
    }

    #[test]
    fn test_load_invalid_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ gateway: ").unwrap();
        assert!(matches!(
            Config::load(&path),
            Err(crate::error::VoxError::Config(_))
        ));
    }

    #[test]
    fn test_logging_config_defaults() {
        let config: Config = json5::from_str(r#"{ "logging": {} }"#).unwrap();
        let logging = config.logging.expect("logging should be present");
        assert_eq!(logging.format, "plain");
        assert!(logging.level.is_none());
        assert_eq!(logging.output, "stderr");
        assert!(logging.filters.is_empty());
    }

    #[test]
    fn test_validate_flags_bad_values() {
        let config = Config {
            gateway: Some(GatewayConfig {
                port: 0,
                bind: None,
                ui: false,
                max_upload_bytes: None,
            }),
            transcription: Some(TranscriptionConfig {
                provider: "azure".into(),
                ..TranscriptionConfig::default()
            }),
            ..Config::default()
        };
        let (_warnings, errors) = config.validate();
        assert!(errors.iter().any(|e| e.contains("port")));
        assert!(errors.iter().any(|e| e.contains("azure")));
    }

    #[test]
    fn test_validate_clean_pipeline_config() {
        let (_warnings, errors) = pipeline_config().validate();
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
    }
}
