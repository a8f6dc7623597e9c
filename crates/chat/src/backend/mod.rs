//! Chat backend integration
//!
//! This module provides:
//! - Wire types for the backend's JSON endpoints
//! - `ChatClient`, typed endpoint calls over the [`Gateway`](crate::gateway::Gateway)
//! - Response normalization to domain models

mod client;
mod normalize;

pub use client::{ChatClient, ConversationQuery, SendResult};
pub use normalize::{
    normalize_conversation, normalize_message, parse_timestamp, NormalizeContext, RoleFallback,
};

/// Backend response types
///
/// Fields are optional wherever the backend has been seen to omit or null
/// them; normalization turns them into safe defaults.
pub mod api {
    use serde::{Deserialize, Serialize};
    use serde_json::Value;

    /// A contact (conversation) row
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct ContactRecord {
        pub remote_jid: Option<String>,
        pub id: Option<Value>,
        pub name: Option<String>,
        pub push_name: Option<String>,
        pub phone: Option<String>,
        pub agent_state: Option<String>,
        pub last_message: Option<String>,
        pub last_message_time: Option<String>,
        pub updated_at: Option<String>,
        pub created_at: Option<String>,
        pub unread_count: Option<u32>,
        #[serde(alias = "instance")]
        pub instance_id: Option<Value>,
    }

    #[derive(Debug, Clone, Default, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Pagination {
        pub page: Option<u32>,
        pub has_more: Option<bool>,
        pub total: Option<u64>,
    }

    /// Response from `GET /contacts`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct ContactsResponse {
        #[serde(default = "default_true")]
        pub success: bool,
        pub contacts: Option<Vec<ContactRecord>>,
        pub has_more: Option<bool>,
        pub pagination: Option<Pagination>,
        pub message: Option<String>,
    }

    /// A message row
    #[derive(Debug, Clone, Default, Deserialize)]
    pub struct MessageRecord {
        pub id: Option<Value>,
        pub role: Option<String>,
        pub content: Option<String>,
        pub created_at: Option<String>,
        pub timestamp: Option<String>,
        pub status: Option<String>,
        pub is_read: Option<bool>,
        pub sender_id: Option<Value>,
    }

    /// Response from `GET /chat/messages/:id`
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MessagesResponse {
        #[serde(default = "default_true")]
        pub success: bool,
        pub messages: Option<Vec<MessageRecord>>,
        pub has_more: Option<bool>,
        pub message: Option<String>,
    }

    /// Response from `GET /chat/messages/:id/last`
    #[derive(Debug, Deserialize)]
    pub struct LastMessageResponse {
        #[serde(default = "default_true")]
        pub success: bool,
        pub message: Option<MessageRecord>,
    }

    /// Body of `POST /messages`
    #[derive(Debug, Clone, PartialEq, Serialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SendMessageRequest {
        pub conversation_id: String,
        pub content: String,
        pub recipient_id: Option<String>,
        pub role: String,
        /// Client token, echoed back for idempotency
        pub message_id: String,
    }

    /// Response from `POST /messages`
    ///
    /// `message` is the stored message object on success and on 202, and a
    /// plain error string on failure.
    #[derive(Debug, Deserialize)]
    pub struct SendMessageResponse {
        #[serde(default)]
        pub success: bool,
        pub message: Option<Value>,
        pub warning: Option<String>,
        pub feedback: Option<String>,
        pub error: Option<String>,
    }

    /// Body of `POST /contacts/:id/state`
    #[derive(Debug, Serialize)]
    pub struct AgentStateRequest<'a> {
        pub agent_state: &'a str,
    }

    /// Generic `{ success, message }` acknowledgement
    #[derive(Debug, Deserialize)]
    pub struct Acknowledgement {
        #[serde(default)]
        pub success: bool,
        pub message: Option<Value>,
        pub error: Option<String>,
    }

    /// Body of `POST /contacts`
    #[derive(Debug, Serialize)]
    pub struct CreateContactRequest<'a> {
        pub name: &'a str,
        pub phone: &'a str,
    }

    #[derive(Debug, Deserialize)]
    pub struct CreateContactResponse {
        #[serde(default)]
        pub success: bool,
        pub contact: Option<ContactRecord>,
        pub message: Option<Value>,
    }

    /// The signed-in operator
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    pub struct CurrentUser {
        pub id: Value,
        pub email: Option<String>,
        pub name: Option<String>,
        pub full_name: Option<String>,
    }

    impl CurrentUser {
        /// Identifier as compared against a message's `sender_id`
        pub fn id_string(&self) -> Option<String> {
            value_to_id(&self.id)
        }

        pub fn display_name(&self) -> Option<&str> {
            self.full_name
                .as_deref()
                .or(self.name.as_deref())
                .or(self.email.as_deref())
        }
    }

    /// Response from `GET /auth/me`; some deployments wrap the user
    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    pub enum CurrentUserResponse {
        Wrapped { user: CurrentUser },
        Bare(CurrentUser),
    }

    /// A messaging instance the operator can filter by
    #[derive(Debug, Clone, PartialEq, Deserialize)]
    pub struct InstanceRecord {
        pub id: Value,
        #[serde(alias = "name")]
        pub instance_name: Option<String>,
        pub phone: Option<String>,
    }

    /// Response from `GET /whatsapp-credentials`
    #[derive(Debug, Deserialize)]
    pub struct InstancesResponse {
        #[serde(default = "default_true")]
        pub success: bool,
        #[serde(alias = "credentials", alias = "instances")]
        pub data: Option<Vec<InstanceRecord>>,
    }

    /// Response from `GET /contacts/count`
    #[derive(Debug, Deserialize)]
    pub struct CountResponse {
        #[serde(default = "default_true")]
        pub success: bool,
        #[serde(alias = "total")]
        pub count: Option<u64>,
    }

    fn default_true() -> bool {
        true
    }

    /// Render a JSON id (string or number) as a string
    pub fn value_to_id(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }
}
