//! Backend response normalization
//!
//! Converts wire records to domain models. Malformed rows are repaired to
//! safe defaults instead of being dropped, and every repair is logged.

use chrono::{DateTime, NaiveDateTime, Utc};
use log::warn;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use super::api::{value_to_id, ContactRecord, MessageRecord};
use crate::models::{AgentState, Conversation, ConversationId, DeliveryStatus, Message, MessageId, Role};

/// How to fill in a missing or unknown message role
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleFallback {
    /// `ME` when the sender is the signed-in operator, otherwise `USER`
    SenderIdentity,
    /// The row answers our own send, so it is `ME`
    Outgoing,
}

pub struct NormalizeContext<'a> {
    pub conversation_id: &'a ConversationId,
    pub current_user_id: Option<&'a str>,
    pub fallback: RoleFallback,
    /// Used when the row carries no timestamp
    pub now: DateTime<Utc>,
}

/// Normalize a message row
pub fn normalize_message(record: MessageRecord, ctx: &NormalizeContext<'_>) -> Message {
    let sender_id = record.sender_id.as_ref().and_then(value_to_id);
    let content = record.content.unwrap_or_default();

    let created_at = match record
        .created_at
        .as_deref()
        .or(record.timestamp.as_deref())
        .and_then(parse_timestamp)
    {
        Some(at) => at,
        None => {
            warn!(
                "Message in {} has no usable timestamp, using current time",
                ctx.conversation_id
            );
            ctx.now
        }
    };

    let id = match record.id.as_ref().and_then(value_to_id) {
        Some(id) => MessageId::new(id),
        None => {
            let id = derived_message_id(ctx.conversation_id, created_at, &content);
            warn!(
                "Message in {} has no id, derived {}",
                ctx.conversation_id, id
            );
            id
        }
    };

    let role = match record.role.as_deref().and_then(Role::parse) {
        Some(role) => role,
        None => {
            let role = match ctx.fallback {
                RoleFallback::Outgoing => Role::Me,
                RoleFallback::SenderIdentity => match (sender_id.as_deref(), ctx.current_user_id) {
                    (Some(sender), Some(me)) if sender == me => Role::Me,
                    _ => Role::User,
                },
            };
            if ctx.fallback == RoleFallback::SenderIdentity {
                warn!(
                    "Message {} in {} had role {:?}, corrected to {}",
                    id,
                    ctx.conversation_id,
                    record.role,
                    role.as_str()
                );
            }
            role
        }
    };

    let status = record
        .status
        .as_deref()
        .and_then(DeliveryStatus::parse)
        .unwrap_or(DeliveryStatus::Sent);

    Message::builder(id, ctx.conversation_id.clone())
        .role(role)
        .content(content)
        .created_at(created_at)
        .status(status)
        .is_read(record.is_read.unwrap_or(false))
        .sender_id(sender_id)
        .build()
}

/// Normalize a contact row; rows without any identifier are skipped
pub fn normalize_conversation(record: ContactRecord) -> Option<Conversation> {
    let id = record
        .remote_jid
        .as_deref()
        .map(str::trim)
        .filter(|jid| !jid.is_empty())
        .map(str::to_string)
        .or_else(|| record.id.as_ref().and_then(value_to_id));

    let Some(id) = id else {
        warn!("Skipping contact without remote_jid or id");
        return None;
    };

    let name = record
        .name
        .filter(|n| !n.trim().is_empty())
        .or(record.push_name)
        .unwrap_or_default();

    let agent_state = match record.agent_state.as_deref() {
        None => AgentState::default(),
        Some(raw) => AgentState::parse(raw).unwrap_or_else(|| {
            warn!("Contact {} has unknown agent_state, using human", id);
            AgentState::default()
        }),
    };

    Some(Conversation {
        id: ConversationId::new(id),
        name: name.trim().to_string(),
        phone: record.phone.filter(|p| !p.trim().is_empty()),
        agent_state,
        last_message: record.last_message.unwrap_or_default(),
        last_message_at: record.last_message_time.as_deref().and_then(parse_timestamp),
        updated_at: record.updated_at.as_deref().and_then(parse_timestamp),
        created_at: record.created_at.as_deref().and_then(parse_timestamp),
        unread_count: record.unread_count.unwrap_or(0),
        instance_id: record.instance_id.as_ref().and_then(value_to_id),
    })
}

/// Parse RFC 3339 timestamps, plus naive UTC forms some rows use
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Stable id for a row the server sent without one
fn derived_message_id(
    conversation_id: &ConversationId,
    created_at: DateTime<Utc>,
    content: &str,
) -> MessageId {
    let mut hasher = DefaultHasher::new();
    conversation_id.as_str().hash(&mut hasher);
    created_at.timestamp_millis().hash(&mut hasher);
    content.hash(&mut hasher);
    MessageId::new(format!("derived-{:016x}", hasher.finish()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn ctx<'a>(conversation_id: &'a ConversationId, user: Option<&'a str>) -> NormalizeContext<'a> {
        NormalizeContext {
            conversation_id,
            current_user_id: user,
            fallback: RoleFallback::SenderIdentity,
            now: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    fn record(value: serde_json::Value) -> MessageRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_null_role_becomes_user() {
        let conv = ConversationId::new("c1");
        let msg = normalize_message(
            record(json!({"id": 7, "role": null, "content": "oi", "created_at": "2026-03-01T10:00:00Z"})),
            &ctx(&conv, Some("42")),
        );
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.id, MessageId::new("7"));
    }

    #[test]
    fn test_null_role_from_self_becomes_me() {
        let conv = ConversationId::new("c1");
        let msg = normalize_message(
            record(json!({"id": "m1", "role": null, "sender_id": 42, "content": "hi"})),
            &ctx(&conv, Some("42")),
        );
        assert_eq!(msg.role, Role::Me);
    }

    #[test]
    fn test_outgoing_fallback_is_me() {
        let conv = ConversationId::new("c1");
        let mut context = ctx(&conv, None);
        context.fallback = RoleFallback::Outgoing;
        let msg = normalize_message(record(json!({"id": "m1", "content": "hi"})), &context);
        assert_eq!(msg.role, Role::Me);
    }

    #[test]
    fn test_missing_fields_defaulted() {
        let conv = ConversationId::new("c1");
        let context = ctx(&conv, None);
        let msg = normalize_message(record(json!({"role": "AI", "content": "hello"})), &context);

        assert_eq!(msg.status, DeliveryStatus::Sent);
        assert_eq!(msg.created_at, context.now);
        assert!(msg.id.as_str().starts_with("derived-"));

        let again = normalize_message(record(json!({"role": "AI", "content": "hello"})), &context);
        assert_eq!(msg.id, again.id);
    }

    #[test]
    fn test_timestamp_fallback_field() {
        let conv = ConversationId::new("c1");
        let msg = normalize_message(
            record(json!({"id": "m1", "role": "USER", "timestamp": "2026-02-01 08:30:00"})),
            &ctx(&conv, None),
        );
        assert_eq!(msg.created_at, Utc.with_ymd_and_hms(2026, 2, 1, 8, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        assert_eq!(parse_timestamp("2026-01-05T09:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-05T06:00:00-03:00"), Some(expected));
        assert_eq!(parse_timestamp("2026-01-05T09:00:00.000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp(""), None);
    }

    #[test]
    fn test_conversation_id_fallbacks() {
        let with_jid: ContactRecord =
            serde_json::from_value(json!({"remote_jid": "5511@s.whatsapp.net", "id": 3})).unwrap();
        assert_eq!(
            normalize_conversation(with_jid).unwrap().id,
            ConversationId::new("5511@s.whatsapp.net")
        );

        let id_only: ContactRecord = serde_json::from_value(json!({"id": 3, "push_name": "Bia"})).unwrap();
        let conv = normalize_conversation(id_only).unwrap();
        assert_eq!(conv.id, ConversationId::new("3"));
        assert_eq!(conv.name, "Bia");

        let nothing: ContactRecord = serde_json::from_value(json!({"name": "Ghost"})).unwrap();
        assert!(normalize_conversation(nothing).is_none());
    }

    #[test]
    fn test_conversation_fields() {
        let record: ContactRecord = serde_json::from_value(json!({
            "remote_jid": "a",
            "name": "Ana",
            "agent_state": "ai",
            "last_message": "ok",
            "last_message_time": "2026-01-05T09:00:00Z",
            "unread_count": 2,
            "instance_id": 9
        }))
        .unwrap();
        let conv = normalize_conversation(record).unwrap();
        assert_eq!(conv.agent_state, AgentState::Ai);
        assert_eq!(conv.unread_count, 2);
        assert_eq!(conv.instance_id.as_deref(), Some("9"));
        assert!(conv.last_message_at.is_some());
    }
}
