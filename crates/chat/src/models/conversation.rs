//! Conversation model representing a chat thread with one remote contact

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a conversation (the contact's remote address / JID)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who answers the contact: the automated agent or a human operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Ai,
    #[default]
    Human,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentState::Ai => "ai",
            AgentState::Human => "human",
        }
    }

    /// Parse the wire value; anything unknown is `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Some(AgentState::Ai),
            "human" => Some(AgentState::Human),
            _ => None,
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            AgentState::Ai => AgentState::Human,
            AgentState::Human => AgentState::Ai,
        }
    }
}

/// A conversation as held by the conversation store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    /// Remote address of the contact
    pub id: ConversationId,
    /// Display name (may be empty; see `query::format_contact_name`)
    pub name: String,
    /// Phone number used as the send recipient
    pub phone: Option<String>,
    pub agent_state: AgentState,
    /// Preview text of the latest message
    pub last_message: String,
    /// Timestamp of the latest message
    pub last_message_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    /// Messages not yet seen by the operator
    pub unread_count: u32,
    /// Messaging instance this contact belongs to
    pub instance_id: Option<String>,
}

impl Conversation {
    /// Create a conversation with only an identifier and a display name
    pub fn new(id: impl Into<ConversationId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            phone: None,
            agent_state: AgentState::default(),
            last_message: String::new(),
            last_message_at: None,
            updated_at: None,
            created_at: None,
            unread_count: 0,
            instance_id: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_agent_state(mut self, agent_state: AgentState) -> Self {
        self.agent_state = agent_state;
        self
    }

    pub fn with_last_message(mut self, preview: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.last_message = preview.into();
        self.last_message_at = Some(at);
        self
    }

    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = Some(at);
        self
    }

    pub fn with_updated_at(mut self, at: DateTime<Utc>) -> Self {
        self.updated_at = Some(at);
        self
    }

    pub fn with_unread_count(mut self, count: u32) -> Self {
        self.unread_count = count;
        self
    }

    pub fn with_instance(mut self, instance_id: impl Into<String>) -> Self {
        self.instance_id = Some(instance_id.into());
        self
    }

    /// Timestamp used for recency ordering
    ///
    /// Falls back from the last message to `updated_at` to `created_at`.
    pub fn activity_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at.or(self.updated_at).or(self.created_at)
    }

    /// Whether preview or last-message timestamp differ (the sync shallow compare)
    pub fn activity_differs(&self, other: &Conversation) -> bool {
        self.last_message != other.last_message || self.last_message_at != other.last_message_at
    }

    /// Merge a freshly fetched copy of this conversation into the local one
    ///
    /// Metadata is taken from `fresh`. The preview and its timestamp are only
    /// replaced when `fresh` is strictly newer, so a concurrently fetched
    /// stale caption never overwrites a newer local one. With
    /// `keep_unread` the local unread counter survives (the conversation is
    /// open on screen).
    pub fn merge_from(&mut self, fresh: Conversation, keep_unread: bool) {
        let fresh_is_newer = match (self.last_message_at, fresh.last_message_at) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(local), Some(remote)) => remote > local,
        };
        let local_caption_missing = self.last_message.trim().is_empty();

        if fresh_is_newer || local_caption_missing {
            if !fresh.last_message.is_empty() || fresh_is_newer {
                self.last_message = fresh.last_message;
            }
            if fresh_is_newer {
                self.last_message_at = fresh.last_message_at;
            }
        }

        if !fresh.name.is_empty() {
            self.name = fresh.name;
        }
        if fresh.phone.is_some() {
            self.phone = fresh.phone;
        }
        self.agent_state = fresh.agent_state;
        if fresh.updated_at.is_some() {
            self.updated_at = fresh.updated_at;
        }
        if self.created_at.is_none() {
            self.created_at = fresh.created_at;
        }
        if fresh.instance_id.is_some() {
            self.instance_id = fresh.instance_id;
        }
        if !keep_unread {
            self.unread_count = fresh.unread_count;
        }
    }
}

/// Partial update applied in place by `ConversationStore::patch`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationPatch {
    pub name: Option<String>,
    pub agent_state: Option<AgentState>,
    pub last_message: Option<String>,
    pub last_message_at: Option<DateTime<Utc>>,
    pub unread_count: Option<u32>,
    pub instance_id: Option<String>,
}

impl ConversationPatch {
    pub fn agent_state(state: AgentState) -> Self {
        Self {
            agent_state: Some(state),
            ..Default::default()
        }
    }

    /// Preview/timestamp bump after a local send
    pub fn activity(preview: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            last_message: Some(preview.into()),
            last_message_at: Some(at),
            ..Default::default()
        }
    }

    pub fn unread(count: u32) -> Self {
        Self {
            unread_count: Some(count),
            ..Default::default()
        }
    }

    /// Apply to a conversation; returns whether anything changed
    pub fn apply(&self, conversation: &mut Conversation) -> bool {
        let before = conversation.clone();
        if let Some(name) = &self.name {
            conversation.name = name.clone();
        }
        if let Some(state) = self.agent_state {
            conversation.agent_state = state;
        }
        if let Some(preview) = &self.last_message {
            conversation.last_message = preview.clone();
        }
        if let Some(at) = self.last_message_at {
            conversation.last_message_at = Some(at);
        }
        if let Some(count) = self.unread_count {
            conversation.unread_count = count;
        }
        if let Some(instance) = &self.instance_id {
            conversation.instance_id = Some(instance.clone());
        }
        *conversation != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_activity_fallback_order() {
        let created = Utc::now() - Duration::days(3);
        let updated = Utc::now() - Duration::days(1);

        let conv = Conversation::new("a@s.whatsapp.net", "Ana").with_created_at(created);
        assert_eq!(conv.activity_at(), Some(created));

        let conv = conv.with_updated_at(updated);
        assert_eq!(conv.activity_at(), Some(updated));

        let last = Utc::now();
        let conv = conv.with_last_message("hi", last);
        assert_eq!(conv.activity_at(), Some(last));
    }

    #[test]
    fn test_agent_state_toggle_and_parse() {
        assert_eq!(AgentState::Ai.toggled(), AgentState::Human);
        assert_eq!(AgentState::Human.toggled(), AgentState::Ai);
        assert_eq!(AgentState::parse(" AI "), Some(AgentState::Ai));
        assert_eq!(AgentState::parse("robot"), None);
    }

    #[test]
    fn test_merge_never_regresses_caption() {
        let newer = Utc::now();
        let older = newer - Duration::minutes(5);
        let mut local = Conversation::new("a", "Ana").with_last_message("fresh local", newer);
        let stale = Conversation::new("a", "Ana Maria").with_last_message("stale", older);

        local.merge_from(stale, true);

        assert_eq!(local.last_message, "fresh local");
        assert_eq!(local.last_message_at, Some(newer));
        assert_eq!(local.name, "Ana Maria");
    }

    #[test]
    fn test_merge_takes_newer_caption() {
        let older = Utc::now() - Duration::minutes(5);
        let newer = Utc::now();
        let mut local = Conversation::new("a", "Ana")
            .with_last_message("old", older)
            .with_unread_count(0);
        let fresh = Conversation::new("a", "Ana")
            .with_last_message("new", newer)
            .with_unread_count(4);

        local.merge_from(fresh.clone(), true);
        assert_eq!(local.last_message, "new");
        assert_eq!(local.unread_count, 0);

        let mut other = Conversation::new("a", "Ana").with_last_message("old", older);
        other.merge_from(fresh, false);
        assert_eq!(other.unread_count, 4);
    }

    #[test]
    fn test_patch_reports_change() {
        let mut conv = Conversation::new("a", "Ana");
        assert!(ConversationPatch::agent_state(AgentState::Ai).apply(&mut conv));
        assert!(!ConversationPatch::agent_state(AgentState::Ai).apply(&mut conv));
        assert_eq!(conv.agent_state, AgentState::Ai);
    }
}
