//! In-memory stores for conversations and messages
//!
//! Both stores are split-phase: `begin_*` hands out a [`PageRequest`] ticket
//! and flips the typed [`ListState`]; `complete_load` merges the fetched
//! page. Fetching is the coordinator's job, so the stores never block.

mod conversations;
mod cursor;
mod messages;

pub use conversations::ConversationStore;
pub use cursor::{ListState, LoadKind, LoadSummary, Page, PageCursor, PageRequest};
pub use messages::{HistoryBlock, HistoryGate, MessageStore};
