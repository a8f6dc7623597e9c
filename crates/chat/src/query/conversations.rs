//! Conversation list query functions

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::models::{AgentState, Conversation, ConversationId};
use crate::storage::ConversationStore;

static PHONE_GROUPS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{2})(\d{5})(\d{4})").expect("phone grouping pattern is valid"));

/// Summary information for displaying a conversation in a list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub id: ConversationId,
    /// Display title (see [`format_contact_name`])
    pub title: String,
    /// Preview of the latest message
    pub preview: String,
    pub last_activity: Option<DateTime<Utc>>,
    pub unread_count: u32,
    /// Whether the automated agent answers this contact
    pub agent_enabled: bool,
    pub is_selected: bool,
}

impl ConversationSummary {
    pub fn from_conversation(conversation: &Conversation, selected: Option<&ConversationId>) -> Self {
        Self {
            id: conversation.id.clone(),
            title: format_contact_name(&conversation.name, conversation.phone.as_deref()),
            preview: conversation.last_message.clone(),
            last_activity: conversation.activity_at(),
            unread_count: conversation.unread_count,
            agent_enabled: conversation.agent_state == AgentState::Ai,
            is_selected: selected == Some(&conversation.id),
        }
    }
}

/// Name to show for a contact
///
/// The trimmed name if present, else the phone grouped as `(xx) xxxxx-xxxx`,
/// else "Contact".
pub fn format_contact_name(name: &str, phone: Option<&str>) -> String {
    let name = name.trim();
    if !name.is_empty() {
        return name.to_string();
    }
    match phone.map(str::trim).filter(|p| !p.is_empty()) {
        Some(phone) => PHONE_GROUPS.replace(phone, "($1) $2-$3").into_owned(),
        None => "Contact".to_string(),
    }
}

/// List conversations in display order, optionally narrowed by a search term
pub fn list_conversations(
    store: &ConversationStore,
    selected: Option<&ConversationId>,
    search: Option<&str>,
) -> Vec<ConversationSummary> {
    store
        .filter(search.unwrap_or(""))
        .into_iter()
        .map(|c| ConversationSummary::from_conversation(c, selected))
        .collect()
}
