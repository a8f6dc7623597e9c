//! Chat crate - synchronization core for the operator chat dashboard
//!
//! This crate provides platform-independent chat functionality including:
//! - Domain models (Conversation, Message, AgentState)
//! - Network gateway with session guard, request cache and rate limiter
//! - Typed backend client and payload normalization
//! - Paginated conversation and message stores
//! - Optimistic send pipeline
//! - Sync coordinator with background polling and retry
//! - Scroll anchoring policy behind a `Viewport` trait
//! - Query API for UI consumption
//!
//! This crate has zero UI dependencies; hosts supply a `Transport`, a
//! `Clock` and a `Viewport`.

pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod notices;
pub mod query;
pub mod scroll;
pub mod send;
pub mod storage;
pub mod sync;

pub use backend::{ChatClient, ConversationQuery, SendResult};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ChatConfig;
pub use error::{ChatError, ChatResult, RateLimitError, ValidationError};
pub use gateway::{
    Gateway, HttpRequest, HttpResponse, Method, RateLimitConfig, RateLimiter, Transport,
    TransportError, UreqTransport, LOGIN_REDIRECT,
};
pub use models::{
    AgentState, Conversation, ConversationId, ConversationPatch, DeliveryStatus, Message,
    MessageId, Role,
};
pub use notices::{Notice, NoticeLevel, Notices};
pub use query::{
    date_separator_label, format_contact_name, list_conversations, timeline, ConversationSummary,
    TimelineItem,
};
pub use scroll::{
    AnchorConfig, AnchorOptions, AnchorPosition, ScrollAnchorController, ScrollMetrics, Viewport,
    VirtualViewport,
};
pub use send::{SendDraft, SendPipeline};
pub use storage::{ConversationStore, ListState, MessageStore, Page};
pub use sync::{
    // Coordination
    SendOutcome, SyncCoordinator, SyncStats,
    // Scheduling
    PollHandle, RetryOp, RetryQueue,
    cooldown_elapsed,
};
