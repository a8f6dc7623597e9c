//! Operator-facing banners: errors, transient warnings, info

use chrono::{DateTime, Duration, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Notice {
    pub id: u64,
    pub level: NoticeLevel,
    pub text: String,
    /// `None` stays until dismissed
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct Notices {
    next_id: u64,
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a banner; an identical active banner is refreshed instead
    pub fn push(&mut self, level: NoticeLevel, text: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> u64 {
        let text = text.into();
        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|n| n.level == level && n.text == text)
        {
            existing.expires_at = expires_at;
            return existing.id;
        }

        self.next_id += 1;
        self.items.push(Notice {
            id: self.next_id,
            level,
            text,
            expires_at,
        });
        self.next_id
    }

    pub fn error(&mut self, text: impl Into<String>) -> u64 {
        self.push(NoticeLevel::Error, text, None)
    }

    /// A banner that disappears on its own after `ttl`
    pub fn transient(
        &mut self,
        level: NoticeLevel,
        text: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> u64 {
        self.push(level, text, Some(now + ttl))
    }

    /// Drop expired banners; returns how many went away
    pub fn expire(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.items.len();
        self.items
            .retain(|n| n.expires_at.is_none_or(|at| now < at));
        before - self.items.len()
    }

    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.items.len();
        self.items.retain(|n| n.id != id);
        before != self.items.len()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn active(&self) -> &[Notice] {
        &self.items
    }

    pub fn latest(&self, level: NoticeLevel) -> Option<&Notice> {
        self.items.iter().rev().find(|n| n.level == level)
    }

    pub fn next_expiry(&self) -> Option<DateTime<Utc>> {
        self.items.iter().filter_map(|n| n.expires_at).min()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_notice_expires() {
        let now = Utc::now();
        let mut notices = Notices::new();
        notices.transient(NoticeLevel::Warning, "slow", now, Duration::seconds(5));
        notices.error("broken");

        assert_eq!(notices.expire(now + Duration::milliseconds(4999)), 0);
        assert_eq!(notices.expire(now + Duration::seconds(5)), 1);
        assert_eq!(notices.active().len(), 1);
        assert_eq!(notices.latest(NoticeLevel::Error).unwrap().text, "broken");
    }

    #[test]
    fn test_identical_notice_is_refreshed() {
        let now = Utc::now();
        let mut notices = Notices::new();
        let a = notices.transient(NoticeLevel::Warning, "same", now, Duration::seconds(5));
        let b = notices.transient(NoticeLevel::Warning, "same", now + Duration::seconds(3), Duration::seconds(5));
        assert_eq!(a, b);
        assert_eq!(notices.next_expiry(), Some(now + Duration::seconds(8)));
    }

    #[test]
    fn test_dismiss() {
        let mut notices = Notices::new();
        let id = notices.error("x");
        assert!(notices.dismiss(id));
        assert!(!notices.dismiss(id));
        assert!(notices.is_empty());
    }
}
