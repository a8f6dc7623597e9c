//! Message timeline query functions

use chrono::{Days, NaiveDate, TimeZone};

use crate::models::{Message, Role};

/// One row of a rendered timeline
#[derive(Debug, Clone, PartialEq)]
pub enum TimelineItem<'a> {
    DateSeparator { date: NaiveDate, label: String },
    Message(&'a Message),
}

/// Interleave date separators into a chronological message list
///
/// A separator precedes the first message and every message whose calendar
/// day (in `tz`) differs from the previous one.
pub fn timeline<'a, Tz: TimeZone>(messages: &'a [Message], tz: &Tz, today: NaiveDate) -> Vec<TimelineItem<'a>> {
    let mut items = Vec::with_capacity(messages.len() + 4);
    let mut previous_day: Option<NaiveDate> = None;

    for message in messages {
        let day = message.created_at.with_timezone(tz).date_naive();
        if previous_day != Some(day) {
            items.push(TimelineItem::DateSeparator {
                date: day,
                label: date_separator_label(day, today),
            });
            previous_day = Some(day);
        }
        items.push(TimelineItem::Message(message));
    }

    items
}

/// "Today", "Yesterday", or a long date such as "Sunday, March 1, 2026"
pub fn date_separator_label(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.checked_sub_days(Days::new(1)) == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%A, %B %-d, %Y").to_string()
    }
}

/// Who wrote a message, for display next to it
pub fn sender_label(role: Role, contact_title: &str) -> &str {
    match role {
        Role::Me => "You",
        Role::Ai => "AI",
        Role::User => contact_title,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationId, MessageId};
    use chrono::Utc;

    fn at(day: u32, hour: u32, id: &str) -> Message {
        Message::builder(MessageId::new(id), ConversationId::new("c1"))
            .created_at(Utc.with_ymd_and_hms(2026, 3, day, hour, 0, 0).unwrap())
            .build()
    }

    #[test]
    fn test_separator_labels() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        assert_eq!(date_separator_label(today, today), "Today");
        assert_eq!(
            date_separator_label(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(), today),
            "Yesterday"
        );
        assert_eq!(
            date_separator_label(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(), today),
            "Sunday, March 1, 2026"
        );
    }

    #[test]
    fn test_timeline_inserts_separators_per_day() {
        let messages = vec![at(9, 8, "a"), at(9, 20, "b"), at(10, 7, "c")];
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let items = timeline(&messages, &Utc, today);

        assert_eq!(items.len(), 5);
        assert_eq!(
            items[0],
            TimelineItem::DateSeparator {
                date: NaiveDate::from_ymd_opt(2026, 3, 9).unwrap(),
                label: "Yesterday".into()
            }
        );
        assert!(matches!(items[2], TimelineItem::Message(m) if m.id.as_str() == "b"));
        assert!(matches!(&items[3], TimelineItem::DateSeparator { label, .. } if label == "Today"));
    }

    #[test]
    fn test_timeline_respects_timezone() {
        // 02:00 UTC on the 10th is still the 9th at UTC-3
        let messages = vec![at(9, 22, "a"), at(10, 2, "b")];
        let offset = chrono::FixedOffset::west_opt(3 * 3600).unwrap();
        let today = NaiveDate::from_ymd_opt(2026, 3, 10).unwrap();
        let items = timeline(&messages, &offset, today);
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_sender_label() {
        assert_eq!(sender_label(Role::Me, "Ana"), "You");
        assert_eq!(sender_label(Role::User, "Ana"), "Ana");
    }
}
