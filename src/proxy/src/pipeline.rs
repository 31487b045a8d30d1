//! Per-request chat-completion pipeline (§4.6 steps 1-6).

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use wts_providers::ai::{AiVendor, ChatMessage, ChatRequest, ChatRole};
use wts_shared::types::SubscriptionTier;

use crate::error::ProxyError;
use crate::key;
use crate::store::{NewRequestLog, SiteStatus, Store, UsageSnapshot};

/// The three upstream chat vendors the proxy can dispatch to, keyed by
/// model prefix (§4.6 step 4).
#[derive(Clone)]
pub struct Vendors {
    pub openai: Arc<dyn AiVendor>,
    pub gemini: Arc<dyn AiVendor>,
    pub anthropic: Arc<dyn AiVendor>,
}

impl Vendors {
    fn resolve(&self, model: &str) -> Result<(&'static str, Arc<dyn AiVendor>), ProxyError> {
        if model.starts_with("gpt-") {
            Ok(("openai", self.openai.clone()))
        } else if model.starts_with("gemini-") {
            Ok(("gemini", self.gemini.clone()))
        } else if model.starts_with("claude-") {
            Ok(("anthropic", self.anthropic.clone()))
        } else {
            Err(ProxyError::UnknownModel(model.to_string()))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<Choice>,
    pub usage: UsageWire,
}

#[derive(Debug, Clone, Serialize)]
pub struct Choice {
    pub index: u32,
    pub message: WireMessage,
    pub finish_reason: &'static str,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct UsageWire {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// `chatcmpl-` followed by 24 hex characters (§4.6 step 6).
fn generate_completion_id() -> String {
    let mut rng = rand::thread_rng();
    let hex: String = (0..24).map(|_| format!("{:x}", rng.gen_range(0..16u8))).collect();
    format!("chatcmpl-{hex}")
}

fn to_chat_role(role: &str) -> ChatRole {
    match role {
        "system" => ChatRole::System,
        "assistant" => ChatRole::Assistant,
        _ => ChatRole::User,
    }
}

/// Runs the full proxy pipeline for one `/v1/chat/completions` call.
/// Returns `ProxyError::QuotaExceeded`/`ModelNotAllowed`/`UnknownModel`/
/// `Unauthorized`/`Revoked` for the respective early-exit cases (§4.6
/// steps 1-3), or the completion envelope on success.
pub async fn handle_chat_completion(
    store: &dyn Store,
    vendors: &Vendors,
    api_key: &str,
    request: ChatCompletionRequest,
) -> Result<ChatCompletionResponse, ProxyError> {
    // Step 1: auth.
    if key::extract_bearer(&format!("Bearer {api_key}")).is_none() {
        return Err(ProxyError::Unauthorized);
    }
    let site = store.find_by_api_key(api_key).await?.ok_or(ProxyError::Unauthorized)?;
    if site.status == SiteStatus::Revoked.as_str() {
        return Err(ProxyError::Revoked);
    }

    // Step 2: quota.
    let used = store.usage_this_month(site.id).await?;
    if used >= site.monthly_token_limit {
        return Err(ProxyError::QuotaExceeded {
            used,
            limit: site.monthly_token_limit,
        });
    }

    // Step 3: model policy.
    let tier = SubscriptionTier::parse(&site.subscription_tier).unwrap_or_default();
    let policy = store.get_tier_policy(tier).await?;
    let allowed = policy.map(|p| p.allowed_models).unwrap_or_default();
    if !allowed.iter().any(|m| m == &request.model) {
        return Err(ProxyError::ModelNotAllowed(request.model.clone()));
    }

    // Step 4: dispatch.
    let (provider, vendor) = vendors.resolve(&request.model)?;

    let started = Instant::now();
    let chat_request = ChatRequest {
        model: request.model.clone(),
        messages: request
            .messages
            .iter()
            .map(|m| ChatMessage {
                role: to_chat_role(&m.role),
                content: m.content.clone(),
            })
            .collect(),
        temperature: request.temperature,
        max_tokens: request.max_tokens,
    };

    let result = vendor.chat(&chat_request).await;
    let latency_ms = started.elapsed().as_millis() as i32;

    // Step 5: fire-and-forget log. A logging failure must not affect the
    // response, so failures are swallowed here rather than propagated.
    let log_outcome = match &result {
        Ok(resp) => NewRequestLog {
            site_id: site.id,
            domain: site.domain.clone(),
            provider: provider.to_string(),
            model: request.model.clone(),
            endpoint: "/v1/chat/completions".to_string(),
            method: "POST".to_string(),
            prompt_tokens: resp.usage.prompt as i32,
            completion_tokens: resp.usage.completion as i32,
            total_tokens: resp.usage.total as i32,
            response_status: 200,
            latency_ms,
            error_message: None,
        },
        Err(err) => NewRequestLog {
            site_id: site.id,
            domain: site.domain.clone(),
            provider: provider.to_string(),
            model: request.model.clone(),
            endpoint: "/v1/chat/completions".to_string(),
            method: "POST".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            response_status: err.http_status.unwrap_or(502),
            latency_ms,
            error_message: Some(err.vendor_message.clone()),
        },
    };
    if let Err(log_err) = store.insert_log(log_outcome).await {
        tracing::warn!(error = %log_err, site_id = %site.id, "failed to write proxy request log");
    }

    let vendor_response = result.map_err(|err| ProxyError::UpstreamError(err.vendor_message))?;

    // Step 6: respond.
    Ok(ChatCompletionResponse {
        id: generate_completion_id(),
        object: "chat.completion",
        created: Utc::now().timestamp(),
        model: vendor_response.model,
        choices: vec![Choice {
            index: 0,
            message: WireMessage {
                role: "assistant".to_string(),
                content: vendor_response.content,
            },
            finish_reason: "stop",
        }],
        usage: UsageWire {
            prompt_tokens: vendor_response.usage.prompt,
            completion_tokens: vendor_response.usage.completion,
            total_tokens: vendor_response.usage.total,
        },
    })
}

pub async fn usage_snapshot(store: &dyn Store, site_id: uuid::Uuid) -> Result<UsageSnapshot, ProxyError> {
    let site = store.get_site(site_id).await?.ok_or_else(|| ProxyError::NotFound("site".to_string()))?;
    let used = store.usage_this_month(site_id).await?;
    Ok(UsageSnapshot {
        used,
        limit: site.monthly_token_limit,
    })
}

/// `/v1/models`: the allowed-model list for the authenticated site's tier.
pub async fn list_models(store: &dyn Store, api_key: &str) -> Result<Vec<String>, ProxyError> {
    let site = store.find_by_api_key(api_key).await?.ok_or(ProxyError::Unauthorized)?;
    let tier = SubscriptionTier::parse(&site.subscription_tier).unwrap_or_default();
    let policy = store.get_tier_policy(tier).await?;
    Ok(policy.map(|p| p.allowed_models).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::InMemoryStore;
    use crate::store::ProxySite;
    use async_trait::async_trait;
    use wts_providers::error::{ProviderError, ProviderResult};
    use wts_providers::ai::{Usage, VendorResponse};

    struct StubVendor {
        response: ProviderResult<VendorResponse>,
    }

    #[async_trait]
    impl AiVendor for StubVendor {
        async fn chat(&self, _request: &ChatRequest) -> ProviderResult<VendorResponse> {
            self.response.clone()
        }
    }

    fn vendors_with(openai: ProviderResult<VendorResponse>) -> Vendors {
        Vendors {
            openai: Arc::new(StubVendor { response: openai }),
            gemini: Arc::new(StubVendor {
                response: Err(ProviderError::upstream_failure("unused")),
            }),
            anthropic: Arc::new(StubVendor {
                response: Err(ProviderError::upstream_failure("unused")),
            }),
        }
    }

    fn basic_request(model: &str) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: model.to_string(),
            messages: vec![WireMessage {
                role: "user".to_string(),
                content: "hello".to_string(),
            }],
            max_tokens: None,
            temperature: None,
        }
    }

    async fn seed_free_site(store: &InMemoryStore, domain: &str, key: &str, limit: i64) -> ProxySite {
        let site = ProxySite {
            id: uuid::Uuid::new_v4(),
            domain: domain.to_string(),
            api_key: key.to_string(),
            label: None,
            status: "active".to_string(),
            subscription_tier: "free".to_string(),
            monthly_token_limit: limit,
            created_at: Utc::now(),
            revoked_at: None,
        };
        store.seed_site(site.clone()).await;
        site
    }

    #[tokio::test]
    async fn quota_exceeded_returns_before_dispatch() {
        let store = InMemoryStore::new();
        let key = key::generate();
        let site = seed_free_site(&store, "x.test", &key, 100).await;
        store
            .seed_logs(vec![crate::store::ProxyRequestLog {
                id: 1,
                site_id: site.id,
                domain: "x.test".to_string(),
                provider: "openai".to_string(),
                model: "gpt-4o-mini".to_string(),
                endpoint: "/v1/chat/completions".to_string(),
                method: "POST".to_string(),
                prompt_tokens: 100,
                completion_tokens: 20,
                total_tokens: 120,
                response_status: 200,
                latency_ms: 10,
                error_message: None,
                requested_at: Utc::now(),
            }])
            .await;

        let vendors = vendors_with(Ok(VendorResponse {
            content: "should not be reached".to_string(),
            model: "gpt-4o-mini".to_string(),
            usage: Usage::default(),
        }));

        let result = handle_chat_completion(&store, &vendors, &key, basic_request("gpt-4o-mini")).await;
        match result {
            Err(ProxyError::QuotaExceeded { used, limit }) => {
                assert_eq!(used, 120);
                assert_eq!(limit, 100);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn disallowed_model_for_tier_is_rejected() {
        let store = InMemoryStore::new();
        let key = key::generate();
        seed_free_site(&store, "x.test", &key, 100_000).await;
        let vendors = vendors_with(Ok(VendorResponse {
            content: "n/a".to_string(),
            model: "claude-opus-4-6".to_string(),
            usage: Usage::default(),
        }));

        let result = handle_chat_completion(&store, &vendors, &key, basic_request("claude-opus-4-6")).await;
        assert!(matches!(result, Err(ProxyError::ModelNotAllowed(_))));
    }

    #[tokio::test]
    async fn successful_dispatch_returns_openai_style_envelope() {
        let store = InMemoryStore::new();
        let key = key::generate();
        seed_free_site(&store, "x.test", &key, 100_000).await;
        let vendors = vendors_with(Ok(VendorResponse {
            content: "hi there".to_string(),
            model: "gpt-4o-mini".to_string(),
            usage: Usage {
                prompt: 5,
                completion: 3,
                total: 8,
            },
        }));

        let response = handle_chat_completion(&store, &vendors, &key, basic_request("gpt-4o-mini"))
            .await
            .unwrap();
        assert!(response.id.starts_with("chatcmpl-"));
        assert_eq!(response.object, "chat.completion");
        assert_eq!(response.choices[0].message.content, "hi there");
        assert_eq!(response.choices[0].finish_reason, "stop");
        assert_eq!(response.usage.total_tokens, 8);
    }

    #[tokio::test]
    async fn unknown_model_prefix_is_rejected_before_tier_check() {
        let store = InMemoryStore::new();
        let key = key::generate();
        seed_free_site(&store, "x.test", &key, 100_000).await;
        let vendors = vendors_with(Ok(VendorResponse {
            content: "n/a".to_string(),
            model: "llama-3".to_string(),
            usage: Usage::default(),
        }));

        let result = handle_chat_completion(&store, &vendors, &key, basic_request("llama-3")).await;
        assert!(matches!(result, Err(ProxyError::ModelNotAllowed(_)) | Err(ProxyError::UnknownModel(_))));
    }
}
