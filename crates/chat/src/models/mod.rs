//! Domain models for chat entities

mod conversation;
mod message;

pub use conversation::{AgentState, Conversation, ConversationId, ConversationPatch};
pub use message::{DeliveryStatus, Message, MessageBuilder, MessageId, Role};
