//! Error types for the chat core
//!
//! Every network-facing operation returns [`ChatError`]. Validation and
//! rate-limit failures are their own types so the send pipeline can reject
//! a draft without touching the network.

use thiserror::Error;

/// Input rejected before any network call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Message cannot be empty")]
    Empty,
    #[error("Message too long (maximum {max} characters)")]
    TooLong { max: usize },
    #[error("Message contains content that is not allowed")]
    Forbidden,
    #[error("Invalid phone number (use 10 to 15 digits)")]
    InvalidPhone,
    #[error("Contact name is required")]
    MissingName,
    #[error("No conversation is open")]
    NoConversation,
}

/// Outbound request refused by the rate limiter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("Please wait {wait_ms}ms before sending another message")]
    TooSoon { wait_ms: i64 },
    #[error("Too many requests. Try again in {retry_after_secs}s")]
    LockedOut { retry_after_secs: i64 },
}

/// Error type for chat operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChatError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    /// The server answered 401/403
    #[error("Session expired (HTTP {status})")]
    SessionExpired { status: u16 },

    /// A previous request expired the session; nothing is sent until re-auth
    #[error("Session suspended until sign-in")]
    SessionSuspended,

    /// Offline or the request never produced a response
    #[error("Network error: {message}")]
    Network { message: String },

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A response arrived but could not be interpreted
    #[error("Malformed response: {message}")]
    Data { message: String },
}

impl ChatError {
    pub fn network(message: impl Into<String>) -> Self {
        ChatError::Network {
            message: message.into(),
        }
    }

    pub fn data(message: impl Into<String>) -> Self {
        ChatError::Data {
            message: message.into(),
        }
    }

    /// Session errors stop polling and require sign-in
    pub fn is_session(&self) -> bool {
        matches!(
            self,
            ChatError::SessionExpired { .. } | ChatError::SessionSuspended
        )
    }

    /// Only bad input and a lost session stop the operator from continuing
    pub fn blocks_further_action(&self) -> bool {
        matches!(self, ChatError::Validation(_)) || self.is_session()
    }

    /// Errors worth retrying once connectivity returns
    pub fn is_transient(&self) -> bool {
        match self {
            ChatError::Network { .. } => true,
            ChatError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;
