//! Hosted provider abstractions.
//!
//! [`ChatCompleter`] produces an assistant reply from an ordered message list;
//! [`SessionIssuer`] exchanges a static API key for a short-lived voice-agent
//! session credential. Both are injected into the gateway so handlers can be
//! exercised against fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use voxrelay_core::types::{ConversationMessage, Role};

pub mod openai;
pub mod retell;

/// Role of a message sent to a chat-completion API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

impl From<Role> for ChatRole {
    fn from(role: Role) -> Self {
        match role {
            Role::User => ChatRole::User,
            Role::Assistant => ChatRole::Assistant,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

impl From<&ConversationMessage> for ChatMessage {
    fn from(msg: &ConversationMessage) -> Self {
        Self {
            role: msg.role.into(),
            content: msg.content.clone(),
        }
    }
}

/// A request to the chat-completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
}

impl CompletionRequest {
    /// System instruction, then the history in order, then the new user turn.
    pub fn for_turn(system: &str, history: &[ConversationMessage], user_turn: &str) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().map(ChatMessage::from));
        messages.push(ChatMessage::user(user_turn));
        Self { messages }
    }
}

/// The chat-completion seam.
#[async_trait]
pub trait ChatCompleter: Send + Sync {
    /// Provider identifier (e.g., "groq").
    fn id(&self) -> &str;

    /// Content of the first returned choice, or `None` if the service
    /// returned no choices or an empty message.
    async fn complete(&self, request: &CompletionRequest) -> anyhow::Result<Option<String>>;
}

/// Short-lived credential authorizing a browser voice-agent session.
///
/// Serializes to a flat object with exactly the two fields of its variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SessionCredential {
    WebCall { access_token: String, call_id: String },
    RegisteredCall { call_id: String, sample_rate: u32 },
}

impl SessionCredential {
    pub fn call_id(&self) -> &str {
        match self {
            SessionCredential::WebCall { call_id, .. }
            | SessionCredential::RegisteredCall { call_id, .. } => call_id,
        }
    }
}

/// The credential-issuance seam.
#[async_trait]
pub trait SessionIssuer: Send + Sync {
    fn id(&self) -> &str;

    /// Perform the single outbound call that yields a session credential.
    async fn issue(&self) -> anyhow::Result<SessionCredential>;
}
