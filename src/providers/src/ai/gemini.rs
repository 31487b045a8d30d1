//! Google Gemini vendor client (§4.2 translation: system message hoisted to
//! `systemInstruction`, `assistant` remapped to `model`, generation knobs
//! collected under `generationConfig`).

use super::{split_system_message, AiVendor, ChatRequest, ChatRole, Usage, VendorResponse};
use crate::error::{ProviderError, ProviderErrorKind, ProviderResult};
use crate::http::ai_client;
use async_trait::async_trait;
use serde_json::json;

pub struct GeminiVendor {
    api_key: String,
    http: reqwest::Client,
    base_url: String,
}

impl GeminiVendor {
    pub fn new(api_key: String) -> Self {
        Self {
            api_key,
            http: ai_client(),
            base_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
        }
    }

    fn gemini_role(role: ChatRole) -> &'static str {
        match role {
            ChatRole::Assistant => "model",
            ChatRole::User | ChatRole::System => "user",
        }
    }
}

#[async_trait]
impl AiVendor for GeminiVendor {
    async fn chat(&self, request: &ChatRequest) -> ProviderResult<VendorResponse> {
        let (system, rest) = split_system_message(&request.messages);

        let contents: Vec<serde_json::Value> = rest
            .iter()
            .map(|m| {
                json!({
                    "role": Self::gemini_role(m.role),
                    "parts": [{ "text": m.content }],
                })
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "temperature": request.temperature,
                "maxOutputTokens": request.max_tokens,
            },
        });
        if let Some(system_text) = system {
            body["systemInstruction"] = json!({ "parts": [{ "text": system_text }] });
        }

        let resp = self
            .http
            .post(format!(
                "{}/models/{}:generateContent?key={}",
                self.base_url, request.model, self.api_key
            ))
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::new(ProviderErrorKind::RateLimited, "gemini rate limited")
                .with_status(429));
        }
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(ProviderError::new(ProviderErrorKind::Auth, "gemini auth rejected")
                .with_status(status.as_u16()));
        }
        if !status.is_success() {
            return Err(ProviderError::upstream_failure(format!("gemini returned {status}"))
                .with_status(status.as_u16()));
        }

        let value: serde_json::Value = resp.json().await.map_err(ProviderError::from)?;
        let content = value["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .unwrap_or_default()
            .to_string();

        Ok(VendorResponse {
            content,
            model: request.model.clone(),
            usage: Usage {
                prompt: value["usageMetadata"]["promptTokenCount"].as_u64().unwrap_or(0) as u32,
                completion: value["usageMetadata"]["candidatesTokenCount"].as_u64().unwrap_or(0) as u32,
                total: value["usageMetadata"]["totalTokenCount"].as_u64().unwrap_or(0) as u32,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::ChatMessage;

    #[test]
    fn assistant_role_remaps_to_model() {
        assert_eq!(GeminiVendor::gemini_role(ChatRole::Assistant), "model");
        assert_eq!(GeminiVendor::gemini_role(ChatRole::User), "user");
    }

    #[test]
    fn system_message_is_hoisted_out_of_contents() {
        let messages = vec![
            ChatMessage { role: ChatRole::System, content: "be terse".into() },
            ChatMessage { role: ChatRole::User, content: "hi".into() },
        ];
        let (system, rest) = split_system_message(&messages);
        assert_eq!(system.as_deref(), Some("be terse"));
        assert_eq!(rest.len(), 1);
    }
}
