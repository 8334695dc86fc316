use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One turn of caller-supplied conversation history.
///
/// History is never stored server-side; the client sends the full list with
/// every request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A recorded audio clip uploaded by the browser.
#[derive(Debug, Clone)]
pub struct AudioClip {
    pub data: Bytes,
    pub file_name: String,
    pub content_type: String,
}

/// The user's turn: typed text or a recorded clip.
#[derive(Debug, Clone)]
pub enum PipelineInput {
    Text(String),
    Audio(AudioClip),
}

impl PipelineInput {
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineInput::Text(_) => "text",
            PipelineInput::Audio(_) => "audio",
        }
    }
}

/// A validated pipeline submission.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub input: PipelineInput,
    pub history: Vec<ConversationMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_json_shape() {
        let msg: ConversationMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"Hi"}"#).unwrap();
        assert_eq!(msg, ConversationMessage::assistant("Hi"));
        assert_eq!(
            serde_json::to_value(ConversationMessage::user("Hallo")).unwrap(),
            serde_json::json!({"role": "user", "content": "Hallo"})
        );
    }

    #[test]
    fn test_message_ignores_client_only_fields() {
        // The browser keeps per-turn latency alongside each message.
        let msg: ConversationMessage =
            serde_json::from_str(r#"{"role":"assistant","content":"Hi","latency":812}"#).unwrap();
        assert_eq!(msg.content, "Hi");
    }

    #[test]
    fn test_message_rejects_unknown_role() {
        let result = serde_json::from_str::<ConversationMessage>(r#"{"role":"system","content":"x"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_message_requires_content() {
        assert!(serde_json::from_str::<ConversationMessage>(r#"{"role":"user"}"#).is_err());
        assert!(serde_json::from_str::<ConversationMessage>(r#"{"role":"user","content":3}"#).is_err());
    }
}
