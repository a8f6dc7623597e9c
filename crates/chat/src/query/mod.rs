//! Query API for UI consumption
//!
//! Provides read-only views of the stores formatted for display.

mod conversations;
mod messages;

pub use conversations::{format_contact_name, list_conversations, ConversationSummary};
pub use messages::{date_separator_label, sender_label, timeline, TimelineItem};
