//! Session lifecycle (§4.7): system-prompt synthesis, transcript loading,
//! model invocation, and per-action dispatch.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;
use wts_providers::ai::{AiVendor, ChatMessage, ChatRequest, ChatRole};
use wts_providers::host::SiteCredentials;
use wts_providers::site::{PageRecord, PageUpdate, SiteClient};
use wts_shared::types::MessageRole;

use crate::actions::{parse_action_blocks, ActionBlock};
use crate::error::EditorError;
use crate::store::{EditSession, Store};

const MODEL_TEMPERATURE: f64 = 0.7;
const SYSTEM_PROMPT_EXCERPT_LEN: usize = 200;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

fn strip_tags(html: &str) -> String {
    TAG_RE.replace_all(html, "").trim().to_string()
}

fn excerpt(content: &str, max_len: usize) -> String {
    let stripped = strip_tags(content);
    stripped.chars().take(max_len).collect()
}

/// The outcome of dispatching one action block, returned to the caller
/// alongside the assistant's prose (§4.7 step 7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppliedChange {
    pub action_type: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AppliedChange {
    fn ok(action_type: &str) -> Self {
        Self::ok_with(action_type, None)
    }

    fn ok_with(action_type: &str, result: Option<Value>) -> Self {
        Self {
            action_type: action_type.to_string(),
            success: true,
            result,
            error: None,
        }
    }

    fn failed(action_type: &str, error: impl Into<String>) -> Self {
        Self {
            action_type: action_type.to_string(),
            success: false,
            result: None,
            error: Some(error.into()),
        }
    }
}

fn page_result(page: &PageRecord) -> Value {
    json!({ "id": page.id, "slug": page.slug, "status": page.status })
}

pub struct SendMessageResult {
    pub message: String,
    pub changes: Vec<AppliedChange>,
}

pub struct EditSessionExecutor {
    pub store: Arc<dyn Store>,
    pub site: Arc<dyn SiteClient>,
    pub ai: Arc<dyn AiVendor>,
}

impl EditSessionExecutor {
    pub fn new(store: Arc<dyn Store>, site: Arc<dyn SiteClient>, ai: Arc<dyn AiVendor>) -> Self {
        Self { store, site, ai }
    }

    /// Creates a session and seeds it with a system prompt describing the
    /// site and its current pages. A page-fetch failure degrades to a bare
    /// system prompt rather than failing session creation.
    pub async fn create(
        &self,
        user_id: Uuid,
        site_id: Uuid,
        creds: &SiteCredentials,
    ) -> Result<EditSession, EditorError> {
        let session = self.store.create_session(user_id, site_id).await?;

        let prompt = match self.site.list_pages(creds).await {
            Ok(pages) => system_prompt(&creds.wp_url, &pages),
            Err(err) => {
                tracing::warn!(error = %err, site_id = %site_id, "falling back to a bare system prompt");
                bare_system_prompt(&creds.wp_url)
            }
        };

        self.store
            .append_message(session.id, MessageRole::System, &prompt, None)
            .await?;

        Ok(session)
    }

    /// Appends the user message, invokes the model over the full
    /// transcript, dispatches any action blocks, and persists the
    /// assistant's reply with `metadata.changes` attached when non-empty.
    pub async fn send_message(
        &self,
        session_id: Uuid,
        text: &str,
        creds: &SiteCredentials,
    ) -> Result<SendMessageResult, EditorError> {
        self.store.get_session(session_id).await?.ok_or_else(|| EditorError::SessionNotFound(session_id.to_string()))?;

        self.store
            .append_message(session_id, MessageRole::User, text, None)
            .await?;

        let transcript = self.store.list_messages(session_id).await?;
        let messages: Vec<ChatMessage> = transcript
            .iter()
            .map(|m| ChatMessage {
                role: match m.role.as_str() {
                    "assistant" => ChatRole::Assistant,
                    "system" => ChatRole::System,
                    _ => ChatRole::User,
                },
                content: m.content.clone(),
            })
            .collect();

        let response = self
            .ai
            .chat(&ChatRequest {
                model: "gpt-4o-mini".to_string(),
                messages,
                temperature: Some(MODEL_TEMPERATURE),
                max_tokens: None,
            })
            .await?;

        let (display_text, actions) = parse_action_blocks(&response.content);

        let mut changes = Vec::with_capacity(actions.len());
        for action in &actions {
            changes.push(self.dispatch(creds, action).await);
        }

        let metadata = if changes.is_empty() {
            None
        } else {
            Some(json!({ "changes": changes }))
        };

        self.store
            .append_message(session_id, MessageRole::Assistant, &display_text, metadata)
            .await?;

        Ok(SendMessageResult {
            message: display_text,
            changes,
        })
    }

    async fn dispatch(&self, creds: &SiteCredentials, action: &ActionBlock) -> AppliedChange {
        match action {
            ActionBlock::UpdatePage { page_id, updates } => {
                let update = PageUpdate {
                    title: updates.title.clone(),
                    content: updates.content.clone(),
                    slug: updates.slug.clone(),
                    status: updates.status.clone(),
                };
                match self.site.update_page(creds, *page_id, &update).await {
                    Ok(page) => AppliedChange::ok_with("update_page", Some(page_result(&page))),
                    Err(err) => AppliedChange::failed("update_page", err.vendor_message),
                }
            }
            ActionBlock::UpdateSettings { settings } => {
                let settings = wts_providers::site::SiteSettings {
                    title: settings.title.clone(),
                    tagline: settings.tagline.clone(),
                };
                match self.site.update_settings(creds, &settings).await {
                    Ok(()) => AppliedChange::ok("update_settings"),
                    Err(err) => AppliedChange::failed("update_settings", err.vendor_message),
                }
            }
            ActionBlock::CreatePage { page } => {
                let input = wts_providers::site::PageInput {
                    title: page.title.clone(),
                    content: page.content.clone(),
                    slug: page.slug.clone(),
                    status: page.status.clone(),
                };
                match self.site.create_page(creds, &input).await {
                    Ok(page) => AppliedChange::ok_with("create_page", Some(page_result(&page))),
                    Err(err) => AppliedChange::failed("create_page", err.vendor_message),
                }
            }
            ActionBlock::Unknown => AppliedChange::failed("unknown", "unknown action type"),
        }
    }
}

fn system_prompt(site_url: &str, pages: &[wts_providers::site::PageRecord]) -> String {
    let mut lines = vec![
        format!("You are editing the WordPress site at {site_url}."),
        "Propose changes with fenced action blocks, one JSON object per block:".to_string(),
        ":::action".to_string(),
        "{\"type\":\"update_page\",\"pageId\":<id>,\"updates\":{\"title\":\"...\"}}".to_string(),
        ":::".to_string(),
        "Other action types: update_settings{settings}, create_page{page}.".to_string(),
        String::new(),
        "Current pages:".to_string(),
    ];
    for page in pages {
        lines.push(format!(
            "- [ID:{}] \"{}\" — {}",
            page.id,
            page.title,
            excerpt(&page.content, SYSTEM_PROMPT_EXCERPT_LEN)
        ));
    }
    lines.join("\n")
}

fn bare_system_prompt(site_url: &str) -> String {
    format!(
        "You are editing the WordPress site at {site_url}. Page listing is unavailable; \
         propose changes using fenced action blocks as usual."
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_support::InMemoryStore;
    use async_trait::async_trait;
    use wts_providers::error::{ProviderError, ProviderResult};
    use wts_providers::ai::{Usage, VendorResponse};
    use wts_providers::site::{MediaAsset, PageInput, PageRecord, PageUpdate as ProviderPageUpdate, SiteSettings};

    struct StubSite {
        pages: Vec<PageRecord>,
        fail_list_pages: bool,
    }

    #[async_trait]
    impl SiteClient for StubSite {
        async fn update_settings(&self, _creds: &SiteCredentials, _settings: &SiteSettings) -> ProviderResult<()> {
            Ok(())
        }
        async fn upload_media(&self, _creds: &SiteCredentials, _source_url: &str) -> ProviderResult<MediaAsset> {
            Ok(MediaAsset { id: 1, url: "https://example.com/x.png".to_string() })
        }
        async fn set_site_logo(&self, _creds: &SiteCredentials, _media_id: u64) -> ProviderResult<()> {
            Ok(())
        }
        async fn set_site_icon(&self, _creds: &SiteCredentials, _media_id: u64) -> ProviderResult<()> {
            Ok(())
        }
        async fn set_custom_css(&self, _creds: &SiteCredentials, _css: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn install_plugin(&self, _creds: &SiteCredentials, _slug: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn activate_plugin(&self, _creds: &SiteCredentials, _slug: &str) -> ProviderResult<()> {
            Ok(())
        }
        async fn list_pages(&self, _creds: &SiteCredentials) -> ProviderResult<Vec<PageRecord>> {
            if self.fail_list_pages {
                Err(ProviderError::upstream_failure("site unreachable"))
            } else {
                Ok(self.pages.clone())
            }
        }
        async fn create_page(&self, _creds: &SiteCredentials, page: &PageInput) -> ProviderResult<PageRecord> {
            Ok(PageRecord {
                id: 99,
                title: page.title.clone(),
                content: page.content.clone(),
                slug: page.slug.clone().unwrap_or_default(),
                status: page.status.clone().unwrap_or_else(|| "publish".to_string()),
            })
        }
        async fn update_page(&self, _creds: &SiteCredentials, id: u64, updates: &ProviderPageUpdate) -> ProviderResult<PageRecord> {
            Ok(PageRecord {
                id,
                title: updates.title.clone().unwrap_or_default(),
                content: updates.content.clone().unwrap_or_default(),
                slug: updates.slug.clone().unwrap_or_default(),
                status: updates.status.clone().unwrap_or_default(),
            })
        }
        async fn set_front_page(&self, _creds: &SiteCredentials, _page_id: u64) -> ProviderResult<()> {
            Ok(())
        }
    }

    struct StubVendor {
        reply: String,
    }

    #[async_trait]
    impl AiVendor for StubVendor {
        async fn chat(&self, _request: &ChatRequest) -> ProviderResult<VendorResponse> {
            Ok(VendorResponse {
                content: self.reply.clone(),
                model: "gpt-4o-mini".to_string(),
                usage: Usage::default(),
            })
        }
    }

    fn creds() -> SiteCredentials {
        SiteCredentials {
            id: "site-1".to_string(),
            wp_url: "https://example.com".to_string(),
            wp_username: "admin".to_string(),
            wp_password: "secret".to_string(),
        }
    }

    #[tokio::test]
    async fn create_seeds_a_system_prompt_listing_pages() {
        let store = Arc::new(InMemoryStore::new());
        let site = Arc::new(StubSite {
            pages: vec![PageRecord {
                id: 1,
                title: "Home".to_string(),
                content: "<p>Welcome</p>".to_string(),
                slug: "home".to_string(),
                status: "publish".to_string(),
            }],
            fail_list_pages: false,
        });
        let ai = Arc::new(StubVendor { reply: "hi".to_string() });
        let executor = EditSessionExecutor::new(store.clone(), site, ai);

        let session = executor.create(Uuid::new_v4(), Uuid::new_v4(), &creds()).await.unwrap();
        let messages = store.list_messages(session.id).await.unwrap();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].content.contains("[ID:1]"));
        assert!(messages[0].content.contains("Welcome"));
    }

    #[tokio::test]
    async fn create_falls_back_to_a_bare_prompt_when_page_fetch_fails() {
        let store = Arc::new(InMemoryStore::new());
        let site = Arc::new(StubSite { pages: vec![], fail_list_pages: true });
        let ai = Arc::new(StubVendor { reply: "hi".to_string() });
        let executor = EditSessionExecutor::new(store.clone(), site, ai);

        let session = executor.create(Uuid::new_v4(), Uuid::new_v4(), &creds()).await.unwrap();
        let messages = store.list_messages(session.id).await.unwrap();
        assert!(messages[0].content.contains("unavailable"));
    }

    #[tokio::test]
    async fn send_message_dispatches_actions_and_keeps_display_text_separate() {
        let store = Arc::new(InMemoryStore::new());
        let site = Arc::new(StubSite { pages: vec![], fail_list_pages: false });
        let reply = "Updating your homepage now.\n:::action\n{\"type\":\"update_page\",\"pageId\":1,\"updates\":{\"title\":\"New\"}}\n:::".to_string();
        let ai = Arc::new(StubVendor { reply });
        let executor = EditSessionExecutor::new(store.clone(), site, ai);

        let session = executor.create(Uuid::new_v4(), Uuid::new_v4(), &creds()).await.unwrap();
        let result = executor.send_message(session.id, "please update the title", &creds()).await.unwrap();

        assert_eq!(result.message, "Updating your homepage now.");
        assert_eq!(result.changes.len(), 1);
        assert!(result.changes[0].success);
        assert_eq!(result.changes[0].result.as_ref().unwrap()["id"], 1);

        let messages = store.list_messages(session.id).await.unwrap();
        assert_eq!(messages.len(), 3);
        assert!(messages[2].metadata.is_some());
    }

    #[tokio::test]
    async fn a_failing_action_does_not_abort_the_rest_of_the_batch() {
        let store = Arc::new(InMemoryStore::new());
        let site = Arc::new(StubSite { pages: vec![], fail_list_pages: false });
        let reply = ":::action\n{\"type\":\"unknown_action\"}\n:::\n:::action\n{\"type\":\"update_settings\",\"settings\":{\"title\":\"New Title\"}}\n:::".to_string();
        let ai = Arc::new(StubVendor { reply });
        let executor = EditSessionExecutor::new(store.clone(), site, ai);

        let session = executor.create(Uuid::new_v4(), Uuid::new_v4(), &creds()).await.unwrap();
        let result = executor.send_message(session.id, "do both", &creds()).await.unwrap();

        assert_eq!(result.changes.len(), 2);
        assert!(!result.changes[0].success);
        assert!(result.changes[1].success);
    }
}
