//! OpenAI-compatible vendor client. The wire shape here is passed through
//! verbatim — it is also the shape the proxy gateway exposes to its own
//! callers (§4.2: "OpenAI-compatible: verbatim").

use super::{AiVendor, ChatMessage, ChatRequest, ChatRole, Usage, VendorResponse};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::ai_client;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

pub struct OpenAiVendor {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAiVendor {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: ai_client(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    /// Used by vendors that proxy through an OpenAI-compatible endpoint
    /// under a different base URL (not currently exercised, kept for the
    /// vendor-agnostic dispatch path in the proxy gateway).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            api_key,
            http: ai_client(),
            base_url,
        }
    }
}

fn role_str(role: ChatRole) -> &'static str {
    match role {
        ChatRole::System => "system",
        ChatRole::User => "user",
        ChatRole::Assistant => "assistant",
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[async_trait]
impl AiVendor for OpenAiVendor {
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<VendorResponse> {
        let messages: Vec<WireMessage> = request
            .messages
            .iter()
            .map(|m: &ChatMessage| WireMessage {
                role: role_str(m.role),
                content: &m.content,
            })
            .collect();

        let resp = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&json!({
                "model": request.model,
                "messages": messages,
                "temperature": request.temperature,
                "max_tokens": request.max_tokens,
            }))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::new(ProviderErrorKind::RateLimited, "openai rate limited")
                .with_status(429));
        }
        if status.as_u16() == 401 {
            return Err(ProviderError::new(ProviderErrorKind::Auth, "openai auth rejected").with_status(401));
        }
        if !status.is_success() {
            return Err(ProviderError::upstream_failure(format!("openai returned {status}"))
                .with_status(status.as_u16()));
        }

        let value: serde_json::Value = resp.json().await.map_err(ProviderError::from)?;
        let content = value["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        let model = value["model"].as_str().unwrap_or(&request.model).to_string();

        Ok(VendorResponse {
            content,
            model,
            usage: Usage {
                prompt: value["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
                completion: value["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
                total: value["usage"]["total_tokens"].as_u64().unwrap_or(0) as u32,
            },
        })
    }
}
