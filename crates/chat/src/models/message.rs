//! Message model representing one chat message in a conversation

use super::ConversationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a message
///
/// Server-assigned for confirmed messages; for optimistic placeholders it is
/// the client token submitted with the send.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    /// The operator using this client
    Me,
    /// The automated agent
    Ai,
    /// The remote contact
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Me => "ME",
            Role::Ai => "AI",
            Role::User => "USER",
        }
    }

    /// Parse the wire value (case-insensitive); unknown values are `None`
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ME" => Some(Role::Me),
            "AI" => Some(Role::Ai),
            "USER" => Some(Role::User),
            _ => None,
        }
    }

    /// Whether the message was sent from this side of the conversation
    pub fn is_outgoing(&self) -> bool {
        matches!(self, Role::Me | Role::Ai)
    }
}

/// Delivery state of a message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Optimistic placeholder awaiting server confirmation
    Temp,
    /// Accepted by the server but not confirmed as delivered
    Pending,
    #[default]
    Sent,
    Delivered,
    Read,
}

impl DeliveryStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "temp" => Some(DeliveryStatus::Temp),
            "pending" => Some(DeliveryStatus::Pending),
            "sent" => Some(DeliveryStatus::Sent),
            "delivered" => Some(DeliveryStatus::Delivered),
            "read" => Some(DeliveryStatus::Read),
            _ => None,
        }
    }
}

/// A single chat message within a conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    /// Conversation this message belongs to
    pub conversation_id: ConversationId,
    pub role: Role,
    /// Sanitized body text
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub status: DeliveryStatus,
    pub is_read: bool,
    /// Account that authored the message, when the server reports it
    pub sender_id: Option<String>,
}

impl Message {
    /// Create a new message builder
    pub fn builder(id: MessageId, conversation_id: ConversationId) -> MessageBuilder {
        MessageBuilder::new(id, conversation_id)
    }

    /// Whether this is an unconfirmed optimistic placeholder
    pub fn is_temp(&self) -> bool {
        self.status == DeliveryStatus::Temp
    }
}

/// Builder for creating Message instances
pub struct MessageBuilder {
    id: MessageId,
    conversation_id: ConversationId,
    role: Role,
    content: String,
    created_at: Option<DateTime<Utc>>,
    status: DeliveryStatus,
    is_read: bool,
    sender_id: Option<String>,
}

impl MessageBuilder {
    fn new(id: MessageId, conversation_id: ConversationId) -> Self {
        Self {
            id,
            conversation_id,
            role: Role::User,
            content: String::new(),
            created_at: None,
            status: DeliveryStatus::default(),
            is_read: false,
            sender_id: None,
        }
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    pub fn status(mut self, status: DeliveryStatus) -> Self {
        self.status = status;
        self
    }

    pub fn is_read(mut self, is_read: bool) -> Self {
        self.is_read = is_read;
        self
    }

    pub fn sender_id(mut self, sender_id: Option<String>) -> Self {
        self.sender_id = sender_id;
        self
    }

    pub fn build(self) -> Message {
        Message {
            id: self.id,
            conversation_id: self.conversation_id,
            role: self.role,
            content: self.content,
            created_at: self.created_at.unwrap_or_else(Utc::now),
            status: self.status,
            is_read: self.is_read,
            sender_id: self.sender_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_parse() {
        assert_eq!(Role::parse("me"), Some(Role::Me));
        assert_eq!(Role::parse("AI"), Some(Role::Ai));
        assert_eq!(Role::parse(" user "), Some(Role::User));
        assert_eq!(Role::parse("bot"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_role_serializes_uppercase() {
        assert_eq!(serde_json::to_string(&Role::Me).unwrap(), "\"ME\"");
        assert_eq!(serde_json::to_string(&Role::User).unwrap(), "\"USER\"");
    }

    #[test]
    fn test_builder_defaults() {
        let msg = Message::builder(MessageId::new("m1"), ConversationId::new("c1"))
            .content("hello")
            .build();
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.status, DeliveryStatus::Sent);
        assert!(!msg.is_temp());
        assert!(!msg.is_read);
    }

    #[test]
    fn test_outgoing_roles() {
        assert!(Role::Me.is_outgoing());
        assert!(Role::Ai.is_outgoing());
        assert!(!Role::User.is_outgoing());
    }
}
