//! Optimistic send pipeline
//!
//! `prepare` runs the local gates (duplicate token, validation, rate limit)
//! and produces the temp message plus the request body. `reconcile` turns
//! the server's answer into the store mutation to apply. The coordinator
//! sits between the two and owns the stores.

use chrono::{DateTime, Duration, Utc};
use log::{debug, info, warn};
use std::sync::Arc;

use super::validate::validate_message;
use crate::backend::api::SendMessageRequest;
use crate::backend::SendResult;
use crate::clock::Clock;
use crate::error::{ChatError, RateLimitError, ValidationError};
use crate::gateway::RateLimiter;
use crate::models::{Conversation, DeliveryStatus, Message, MessageId, Role};
use crate::sync::timing::within_window;

/// A composed message with its client-generated token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendDraft {
    pub token: String,
    pub content: String,
}

impl SendDraft {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            token: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
        }
    }

    /// Reuse a token, e.g. when the compose box submits the same draft twice
    pub fn with_token(token: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            content: content.into(),
        }
    }
}

/// Why a draft never reached the network
#[derive(Debug, Clone, PartialEq)]
pub enum SendRejection {
    /// Same token as the previous submission inside the dedupe window
    Duplicate,
    Invalid(ValidationError),
    RateLimited(RateLimitError),
}

/// A send that passed every local gate
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSend {
    pub temp: Message,
    pub request: SendMessageRequest,
}

impl PreparedSend {
    pub fn temp_id(&self) -> &MessageId {
        &self.temp.id
    }
}

/// Store mutation that settles an optimistic message
#[derive(Debug, Clone, PartialEq)]
pub enum Reconciliation {
    /// Replace the temp entry with the confirmed message
    Confirmed(Message),
    /// Replace the temp entry with a pending message and warn
    Degraded { message: Message, warning: String },
    /// Remove the temp entry and report the error
    RolledBack(ChatError),
}

pub struct SendPipeline {
    clock: Arc<dyn Clock>,
    dedupe_window: Duration,
    max_length: usize,
    last_submitted: Option<(String, DateTime<Utc>)>,
}

impl SendPipeline {
    pub fn new(clock: Arc<dyn Clock>, dedupe_window: Duration, max_length: usize) -> Self {
        Self {
            clock,
            dedupe_window,
            max_length,
            last_submitted: None,
        }
    }

    /// Run the local gates and build the optimistic message
    pub fn prepare(
        &mut self,
        draft: &SendDraft,
        conversation: &Conversation,
        sender_id: Option<&str>,
        limiter: &mut RateLimiter,
    ) -> Result<PreparedSend, SendRejection> {
        let now = self.clock.now();

        if let Some((token, at)) = &self.last_submitted
            && *token == draft.token
            && within_window(Some(*at), self.dedupe_window, now)
        {
            debug!("Dropping duplicate send {} for {}", draft.token, conversation.id);
            return Err(SendRejection::Duplicate);
        }

        let content = validate_message(&draft.content, self.max_length).map_err(|e| {
            debug!("Send to {} rejected: {}", conversation.id, e);
            SendRejection::Invalid(e)
        })?;

        limiter.try_send().map_err(|e| {
            warn!("Send to {} rate limited: {}", conversation.id, e);
            SendRejection::RateLimited(e)
        })?;

        self.last_submitted = Some((draft.token.clone(), now));

        let temp = Message::builder(MessageId::new(draft.token.clone()), conversation.id.clone())
            .role(Role::Me)
            .content(content.clone())
            .created_at(now)
            .status(DeliveryStatus::Temp)
            .is_read(true)
            .sender_id(sender_id.map(str::to_string))
            .build();

        let request = SendMessageRequest {
            conversation_id: conversation.id.as_str().to_string(),
            content,
            recipient_id: conversation.phone.clone(),
            role: Role::Me.as_str().to_string(),
            message_id: draft.token.clone(),
        };

        info!(
            "Sending {} ({} chars) to {}",
            draft.token,
            request.content.chars().count(),
            conversation.id
        );

        Ok(PreparedSend { temp, request })
    }

    /// Decide how the optimistic message settles
    pub fn reconcile(
        &self,
        prepared: &PreparedSend,
        result: Result<SendResult, ChatError>,
    ) -> Reconciliation {
        match result {
            Ok(SendResult::Confirmed(server)) => {
                let message = server
                    .map(|m| settle(&prepared.temp, m, DeliveryStatus::Sent))
                    .unwrap_or_else(|| with_status(&prepared.temp, DeliveryStatus::Sent));
                info!("Send {} confirmed as {}", prepared.temp.id, message.id);
                Reconciliation::Confirmed(message)
            }
            Ok(SendResult::Degraded {
                message,
                warning,
                feedback,
            }) => {
                let message = message
                    .map(|m| settle(&prepared.temp, m, DeliveryStatus::Pending))
                    .unwrap_or_else(|| with_status(&prepared.temp, DeliveryStatus::Pending));
                let warning = degraded_warning(warning.as_deref(), feedback.as_deref());
                warn!(
                    "Send {} accepted but not delivered yet ({})",
                    prepared.temp.id, message.id
                );
                Reconciliation::Degraded { message, warning }
            }
            Err(e) => {
                warn!("Send {} failed, rolling back: {}", prepared.temp.id, e);
                Reconciliation::RolledBack(e)
            }
        }
    }
}

/// Text of the transient warning shown for a 202
pub fn degraded_warning(warning: Option<&str>, feedback: Option<&str>) -> String {
    let warning = warning
        .filter(|w| !w.trim().is_empty())
        .unwrap_or("Message saved but not delivered yet");
    match feedback.filter(|f| !f.trim().is_empty()) {
        Some(feedback) => format!("⚠️ {}. {}", warning, feedback),
        None => format!("⚠️ {}", warning),
    }
}

/// Server copy wins; a server row that is still temp takes `floor`
fn settle(temp: &Message, mut server: Message, floor: DeliveryStatus) -> Message {
    if server.status == DeliveryStatus::Temp || floor == DeliveryStatus::Pending {
        server.status = floor;
    }
    if server.content.is_empty() {
        server.content = temp.content.clone();
    }
    if server.sender_id.is_none() {
        server.sender_id = temp.sender_id.clone();
    }
    server
}

fn with_status(temp: &Message, status: DeliveryStatus) -> Message {
    let mut message = temp.clone();
    message.status = status;
    message
}
