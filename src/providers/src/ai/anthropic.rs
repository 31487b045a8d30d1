//! Anthropic vendor client (§4.2 translation: system message hoisted to the
//! top-level `system` field, `max_tokens` is required by the vendor and
//! defaults to 1024 when the caller did not specify one).

use super::{split_system_message, AiVendor, ChatRequest, ChatRole, Usage, VendorResponse};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::ai_client;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;

const DEFAULT_MAX_TOKENS: u32 = 1024;
const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicVendor {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl AnthropicVendor {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: ai_client(),
            base_url: "https://api.anthropic.com/v1".to_string(),
        }
    }
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

fn anthropic_role(role: ChatRole) -> &'static str {
    match role {
        ChatRole::Assistant => "assistant",
        ChatRole::User | ChatRole::System => "user",
    }
}

#[async_trait]
impl AiVendor for AnthropicVendor {
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<VendorResponse> {
        let (system, rest) = split_system_message(&request.messages);

        let messages: Vec<WireMessage> = rest
            .iter()
            .map(|m| WireMessage {
                role: anthropic_role(m.role),
                content: &m.content,
            })
            .collect();

        let body = json!({
            "model": request.model,
            "messages": messages,
            "system": system,
            "max_tokens": request.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "temperature": request.temperature,
        });

        let resp = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::new(ProviderErrorKind::RateLimited, "anthropic rate limited")
                .with_status(429));
        }
        if status.as_u16() == 401 {
            return Err(ProviderError::new(ProviderErrorKind::Auth, "anthropic auth rejected")
                .with_status(401));
        }
        if !status.is_success() {
            return Err(ProviderError::upstream_failure(format!("anthropic returned {status}"))
                .with_status(status.as_u16()));
        }

        let value: serde_json::Value = resp.json().await.map_err(ProviderError::from)?;
        let content = value["content"][0]["text"].as_str().unwrap_or_default().to_string();
        let model = value["model"].as_str().unwrap_or(&request.model).to_string();

        Ok(VendorResponse {
            content,
            model,
            usage: Usage {
                prompt: value["usage"]["input_tokens"].as_u64().unwrap_or(0) as u32,
                completion: value["usage"]["output_tokens"].as_u64().unwrap_or(0) as u32,
                total: (value["usage"]["input_tokens"].as_u64().unwrap_or(0)
                    + value["usage"]["output_tokens"].as_u64().unwrap_or(0)) as u32,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_tokens_is_1024() {
        assert_eq!(DEFAULT_MAX_TOKENS, 1024);
    }

    #[test]
    fn system_role_messages_remap_to_user_if_not_hoisted() {
        assert_eq!(anthropic_role(ChatRole::System), "user");
        assert_eq!(anthropic_role(ChatRole::Assistant), "assistant");
    }
}
