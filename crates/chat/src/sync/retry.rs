//! Sync operations remembered for replay after a transient failure

use crate::models::ConversationId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryOp {
    LoadConversations,
    LoadMessages(ConversationId),
    BackgroundSync,
    Metadata,
}

/// Deduplicated FIFO of failed operations
#[derive(Debug, Default)]
pub struct RetryQueue {
    ops: Vec<RetryOp>,
}

impl RetryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an operation unless it is already waiting
    pub fn push(&mut self, op: RetryOp) -> bool {
        if self.ops.contains(&op) {
            return false;
        }
        // A newer conversation load supersedes an older one
        if let RetryOp::LoadMessages(_) = op {
            self.ops.retain(|o| !matches!(o, RetryOp::LoadMessages(_)));
        }
        self.ops.push(op);
        true
    }

    pub fn drain(&mut self) -> Vec<RetryOp> {
        std::mem::take(&mut self.ops)
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_dedupes() {
        let mut queue = RetryQueue::new();
        assert!(queue.push(RetryOp::BackgroundSync));
        assert!(!queue.push(RetryOp::BackgroundSync));
        assert!(queue.push(RetryOp::LoadConversations));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_latest_message_load_wins() {
        let mut queue = RetryQueue::new();
        queue.push(RetryOp::LoadMessages("a".into()));
        queue.push(RetryOp::LoadMessages("b".into()));
        assert_eq!(queue.drain(), vec![RetryOp::LoadMessages("b".into())]);
        assert!(queue.is_empty());
    }
}
