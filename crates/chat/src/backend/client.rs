//! Typed chat backend endpoints
//!
//! Every call goes through the [`Gateway`]; this layer only knows paths,
//! bodies and how to read the responses.

use chrono::{DateTime, Utc};
use log::debug;
use serde_json::Value;

use super::api::{
    Acknowledgement, AgentStateRequest, ContactsResponse, CountResponse,
    CreateContactRequest, CreateContactResponse, CurrentUser, CurrentUserResponse,
    InstanceRecord, InstancesResponse, LastMessageResponse, MessageRecord, MessagesResponse,
    SendMessageRequest, SendMessageResponse,
};
use super::normalize::{normalize_conversation, normalize_message, NormalizeContext, RoleFallback};
use crate::error::{ChatError, ChatResult};
use crate::gateway::{Gateway, HttpResponse};
use crate::models::{AgentState, Conversation, ConversationId, Message};
use crate::storage::Page;

/// Parameters of a conversation page fetch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationQuery {
    pub page: u32,
    pub limit: usize,
    /// `None` means all instances
    pub instance: Option<String>,
    pub search: Option<String>,
}

/// Outcome of `POST /messages` that is not a failure
#[derive(Debug, Clone, PartialEq)]
pub enum SendResult {
    /// Stored and handed on; the server's copy when it returned one
    Confirmed(Option<Message>),
    /// HTTP 202: stored but not delivered downstream yet
    Degraded {
        message: Option<Message>,
        warning: Option<String>,
        feedback: Option<String>,
    },
}

pub struct ChatClient {
    gateway: Gateway,
}

impl ChatClient {
    pub fn new(gateway: Gateway) -> Self {
        Self { gateway }
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut Gateway {
        &mut self.gateway
    }

    /// `GET /contacts?page=&limit=[&instance=][&search=]`
    pub fn list_conversations(&mut self, query: &ConversationQuery) -> ChatResult<Page<Conversation>> {
        let mut params = vec![
            ("page", query.page.to_string()),
            ("limit", query.limit.to_string()),
        ];
        if let Some(instance) = &query.instance {
            params.push(("instance", instance.clone()));
        }
        if let Some(search) = query.search.as_ref().filter(|s| !s.trim().is_empty()) {
            params.push(("search", search.trim().to_string()));
        }

        let response = self.gateway.get(&["contacts"], &params)?;
        let body: ContactsResponse = expect_success(&response)?.json()?;
        if !body.success {
            return Err(server_refused(&response, body.message));
        }

        let has_more = body
            .has_more
            .or_else(|| body.pagination.as_ref().and_then(|p| p.has_more));
        let conversations = body
            .contacts
            .unwrap_or_default()
            .into_iter()
            .filter_map(normalize_conversation)
            .collect();

        Ok(Page::new(conversations, has_more))
    }

    /// `GET /chat/messages/:id?page=&limit=`, newest first as sent by the server
    pub fn list_messages(
        &mut self,
        conversation_id: &ConversationId,
        page: u32,
        limit: usize,
        current_user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ChatResult<Page<Message>> {
        let params = [("page", page.to_string()), ("limit", limit.to_string())];
        let response = self
            .gateway
            .get(&["chat", "messages", conversation_id.as_str()], &params)?;
        let body: MessagesResponse = expect_success(&response)?.json()?;
        if !body.success {
            return Err(server_refused(&response, body.message));
        }

        let ctx = NormalizeContext {
            conversation_id,
            current_user_id,
            fallback: RoleFallback::SenderIdentity,
            now,
        };
        let messages = body
            .messages
            .unwrap_or_default()
            .into_iter()
            .map(|record| normalize_message(record, &ctx))
            .collect();

        Ok(Page::new(messages, body.has_more))
    }

    /// `GET /chat/messages/:id/last`
    pub fn last_message(
        &mut self,
        conversation_id: &ConversationId,
        current_user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ChatResult<Option<Message>> {
        let response = self
            .gateway
            .get(&["chat", "messages", conversation_id.as_str(), "last"], &[])?;
        if response.status == 404 {
            return Ok(None);
        }
        let body: LastMessageResponse = expect_success(&response)?.json()?;
        if !body.success {
            return Ok(None);
        }

        let ctx = NormalizeContext {
            conversation_id,
            current_user_id,
            fallback: RoleFallback::SenderIdentity,
            now,
        };
        Ok(body.message.map(|record| normalize_message(record, &ctx)))
    }

    /// `POST /messages`
    pub fn send_message(
        &mut self,
        request: &SendMessageRequest,
        current_user_id: Option<&str>,
        now: DateTime<Utc>,
    ) -> ChatResult<SendResult> {
        let response = self.gateway.post(&["messages"], request)?;
        let conversation_id = ConversationId::new(request.conversation_id.clone());

        let parsed: Option<SendMessageResponse> = response.json().ok();
        let stored = |value: Option<&Value>| {
            value
                .filter(|v| v.is_object())
                .and_then(|v| serde_json::from_value::<MessageRecord>(v.clone()).ok())
                .map(|record| {
                    let ctx = NormalizeContext {
                        conversation_id: &conversation_id,
                        current_user_id,
                        fallback: RoleFallback::Outgoing,
                        now,
                    };
                    normalize_message(record, &ctx)
                })
        };

        match (response.status, parsed) {
            (202, Some(body)) => Ok(SendResult::Degraded {
                message: stored(body.message.as_ref()),
                warning: body.warning,
                feedback: body.feedback,
            }),
            (202, None) => Ok(SendResult::Degraded {
                message: None,
                warning: None,
                feedback: None,
            }),
            (status, Some(body)) if (200..300).contains(&status) && body.success => {
                Ok(SendResult::Confirmed(stored(body.message.as_ref())))
            }
            (status, Some(body)) => Err(ChatError::Http {
                status,
                message: body
                    .message
                    .as_ref()
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .or(body.error)
                    .unwrap_or_else(|| "Failed to send message".to_string()),
            }),
            (status, None) => Err(ChatError::Http {
                status,
                message: "Failed to send message".to_string(),
            }),
        }
    }

    /// `POST /contacts/:id/state`
    pub fn set_agent_state(
        &mut self,
        conversation_id: &ConversationId,
        state: AgentState,
    ) -> ChatResult<()> {
        let body = AgentStateRequest {
            agent_state: state.as_str(),
        };
        let response = self
            .gateway
            .post(&["contacts", conversation_id.as_str(), "state"], &body)?;
        let ack: Acknowledgement = expect_success(&response)?.json()?;
        if !ack.success {
            let message = ack
                .message
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string)
                .or(ack.error);
            return Err(server_refused(&response, message));
        }
        debug!("Agent state of {} set to {}", conversation_id, state.as_str());
        Ok(())
    }

    /// `POST /contacts`; `None` when the server stored it but echoed nothing
    pub fn create_conversation(&mut self, name: &str, phone: &str) -> ChatResult<Option<Conversation>> {
        let body = CreateContactRequest { name, phone };
        let response = self.gateway.post(&["contacts"], &body)?;
        let created: CreateContactResponse = expect_success(&response)?.json()?;
        if !created.success {
            let message = created
                .message
                .as_ref()
                .and_then(Value::as_str)
                .map(str::to_string);
            return Err(server_refused(&response, message));
        }
        Ok(created.contact.and_then(normalize_conversation))
    }

    /// `GET /auth/me` (cached)
    pub fn current_user(&mut self) -> ChatResult<CurrentUser> {
        let response = self.gateway.get_cached(&["auth", "me"], &[])?;
        let body: CurrentUserResponse = expect_success(&response)?.json()?;
        Ok(match body {
            CurrentUserResponse::Wrapped { user } => user,
            CurrentUserResponse::Bare(user) => user,
        })
    }

    /// Forget the cached `/auth/me` so the next call re-fetches it
    pub fn invalidate_current_user(&mut self) {
        self.gateway.invalidate("/auth/me");
    }

    /// `GET /whatsapp-credentials` (cached)
    pub fn instances(&mut self) -> ChatResult<Vec<InstanceRecord>> {
        let response = self.gateway.get_cached(&["whatsapp-credentials"], &[])?;
        let body: InstancesResponse = expect_success(&response)?.json()?;
        if !body.success {
            return Err(server_refused(&response, None));
        }
        Ok(body.data.unwrap_or_default())
    }

    /// `GET /contacts/count` (cached)
    pub fn conversation_count(&mut self, instance: Option<&str>) -> ChatResult<Option<u64>> {
        let params: Vec<(&str, String)> = instance
            .map(|i| vec![("instance", i.to_string())])
            .unwrap_or_default();
        let response = self.gateway.get_cached(&["contacts", "count"], &params)?;
        let body: CountResponse = expect_success(&response)?.json()?;
        Ok(body.count.filter(|_| body.success))
    }
}

fn expect_success(response: &HttpResponse) -> ChatResult<&HttpResponse> {
    if response.is_success() {
        Ok(response)
    } else {
        Err(ChatError::Http {
            status: response.status,
            message: response
                .error_message()
                .unwrap_or_else(|| "Request failed".to_string()),
        })
    }
}

fn server_refused(response: &HttpResponse, message: Option<String>) -> ChatError {
    ChatError::Http {
        status: response.status,
        message: message.unwrap_or_else(|| "Request was not successful".to_string()),
    }
}
