//! Action-block grammar parsing (§4.7 step 4).
//!
//! The model's reply mixes prose with fenced JSON directives:
//! `:::action\n{...}\n:::`. Everything outside the fences is the
//! `displayText`; everything inside is parsed as one `ActionBlock` each.
//! A fence whose body does not parse as JSON is dropped from the action
//! list — it never becomes an `AppliedChange` — but its span is still
//! stripped out of `displayText` since it is not prose.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

static ACTION_BLOCK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":::action\n([\s\S]*?)\n:::").unwrap());

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionBlock {
    UpdatePage {
        #[serde(rename = "pageId")]
        page_id: u64,
        updates: PageUpdateFields,
    },
    UpdateSettings {
        settings: SettingsFields,
    },
    CreatePage {
        page: CreatePageFields,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PageUpdateFields {
    pub title: Option<String>,
    pub content: Option<String>,
    pub slug: Option<String>,
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFields {
    pub title: Option<String>,
    pub tagline: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreatePageFields {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub status: Option<String>,
}

/// Splits a model reply into its prose (`displayText`) and the action
/// blocks it carried. Malformed JSON inside a fence is logged and
/// skipped; the fence is still removed from `displayText`.
pub fn parse_action_blocks(reply: &str) -> (String, Vec<ActionBlock>) {
    let mut actions = Vec::new();

    for capture in ACTION_BLOCK_RE.captures_iter(reply) {
        let body = &capture[1];
        match serde_json::from_str::<Value>(body) {
            Ok(value) => match serde_json::from_value::<ActionBlock>(value) {
                Ok(action) => actions.push(action),
                Err(err) => {
                    tracing::warn!(error = %err, body, "action block did not match a known action shape");
                }
            },
            Err(err) => {
                tracing::warn!(error = %err, body, "action block body was not valid JSON");
            }
        }
    }

    let display_text = ACTION_BLOCK_RE.replace_all(reply, "").trim().to_string();
    (display_text, actions)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_prose_and_a_single_update_page_action() {
        let reply = "Sure, updating the title.\n:::action\n{\"type\":\"update_page\",\"pageId\":7,\"updates\":{\"title\":\"New Title\"}}\n:::\nDone.";
        let (display, actions) = parse_action_blocks(reply);
        assert_eq!(display, "Sure, updating the title.\n\nDone.");
        assert_eq!(actions.len(), 1);
        match &actions[0] {
            ActionBlock::UpdatePage { page_id, updates } => {
                assert_eq!(*page_id, 7);
                assert_eq!(updates.title.as_deref(), Some("New Title"));
            }
            other => panic!("expected UpdatePage, got {other:?}"),
        }
    }

    #[test]
    fn malformed_json_is_dropped_but_fence_still_stripped() {
        let reply = "Here goes.\n:::action\n{not valid json\n:::\nAll set.";
        let (display, actions) = parse_action_blocks(reply);
        assert!(actions.is_empty());
        assert_eq!(display, "Here goes.\n\nAll set.");
    }

    #[test]
    fn unrecognized_action_type_does_not_panic() {
        let reply = ":::action\n{\"type\":\"delete_everything\"}\n:::";
        let (_, actions) = parse_action_blocks(reply);
        assert_eq!(actions.len(), 1);
        assert!(matches!(actions[0], ActionBlock::Unknown));
    }

    #[test]
    fn plain_text_with_no_actions_round_trips() {
        let reply = "Just a reply, no actions here.";
        let (display, actions) = parse_action_blocks(reply);
        assert_eq!(display, reply);
        assert!(actions.is_empty());
    }
}
