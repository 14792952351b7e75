//! Bot replies.
//!
//! After every user message the backend asks a [`Responder`] for a reply.
//! Text messages go to the text model; uploads go to the vision model.
//!
//! # Responders
//!
//! - [`ChatCompletionsResponder`]: any `OpenAI`-compatible `/v1/chat/completions`
//!   endpoint (Ollama, vLLM, `OpenAI`)
//! - [`EchoResponder`]: canned replies, used when no LLM is configured

pub mod chat_completions;

pub use chat_completions::ChatCompletionsResponder;

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::message::{Message, MessageKind, Sender};

/// LLM connection and model settings.
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Base URL for the LLM API (e.g., `http://localhost:11434`).
    pub base_url: String,
    /// Optional API key for authentication.
    pub api_key: Option<String>,
    /// Model used for text messages.
    pub text_model: String,
    /// Model used after an image upload.
    pub vision_model: String,
    /// Prepended as a system message when set.
    pub system_prompt: Option<String>,
}

/// Which model a reply is requested from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelChoice {
    Text,
    Vision,
}

/// Produces the bot's reply to a conversation.
#[async_trait]
pub trait Responder: Send + Sync + std::fmt::Debug {
    /// `history` ends with the message being answered.
    async fn reply(&self, history: &[Message], model: ModelChoice) -> Result<String>;
}

/// Role of a turn sent to the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

/// One text turn of the model conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

/// Map the widget conversation onto model turns.
///
/// User text becomes `user`, bot text becomes `assistant`; image messages
/// carry no text and are left out.
#[must_use]
pub fn conversation(history: &[Message], system_prompt: Option<&str>) -> Vec<ChatTurn> {
    let system = system_prompt
        .filter(|p| !p.trim().is_empty())
        .map(|p| ChatTurn {
            role: ChatRole::System,
            content: p.to_string(),
        });

    system
        .into_iter()
        .chain(
            history
                .iter()
                .filter(|m| m.kind == MessageKind::Text)
                .map(|m| ChatTurn {
                    role: match m.sender {
                        Sender::User => ChatRole::User,
                        Sender::Bot => ChatRole::Assistant,
                    },
                    content: m.content.clone(),
                }),
        )
        .collect()
}

/// Content of the most recent image message in `history`.
#[must_use]
pub fn latest_image(history: &[Message]) -> Option<&str> {
    history
        .iter()
        .rev()
        .find(|m| m.kind == MessageKind::Image)
        .map(|m| m.content.as_str())
}

/// Replies without a model.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoResponder;

#[async_trait]
impl Responder for EchoResponder {
    async fn reply(&self, history: &[Message], _model: ModelChoice) -> Result<String> {
        Ok(match history.last() {
            Some(m) if m.kind == MessageKind::Image => "Received your image.".to_string(),
            Some(m) => format!("You said: {}", m.content),
            None => "Hello!".to_string(),
        })
    }
}
