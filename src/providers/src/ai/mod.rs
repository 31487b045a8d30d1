//! Multi-vendor AI chat clients (§4.1 "AI vendor", §4.2 translation table).
//!
//! Each vendor speaks its own wire shape; [`AiVendor::chat`] normalizes the
//! reply to a single [`VendorResponse`] so the proxy gateway and the editor
//! never branch on vendor.

pub mod anthropic;
pub mod gemini;
pub mod openai;

pub use anthropic::AnthropicVendor;
pub use gemini::GeminiVendor;
pub use openai::OpenAiVendor;

use crate::error::ProviderResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt: u32,
    pub completion: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorResponse {
    pub content: String,
    pub model: String,
    pub usage: Usage,
}

#[async_trait]
pub trait AiVendor: Send + Sync {
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<VendorResponse>;
}

/// Pulls the (at most one, first) `system` message out of a message list,
/// leaving the rest in order. Gemini and Anthropic both hoist system
/// instructions to a dedicated top-level field rather than the messages
/// array (§4.2).
pub(crate) fn split_system_message(messages: &[ChatMessage]) -> (Option<String>, Vec<&ChatMessage>) {
    let mut system = None;
    let mut rest = Vec::with_capacity(messages.len());
    for message in messages {
        if message.role == ChatRole::System && system.is_none() {
            system = Some(message.content.clone());
        } else {
            rest.push(message);
        }
    }
    (system, rest)
}
