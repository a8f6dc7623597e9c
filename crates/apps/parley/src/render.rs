//! Plain-text rendering of the coordinator state

use chat::query::{format_contact_name, list_conversations, sender_label, timeline, TimelineItem};
use chat::{NoticeLevel, SyncCoordinator};
use chrono::Local;

const TITLE_WIDTH: usize = 28;
const PREVIEW_WIDTH: usize = 48;

pub fn print_conversations(coordinator: &SyncCoordinator) {
    let summaries = list_conversations(coordinator.conversations(), coordinator.selected(), None);
    match coordinator.conversation_total() {
        Some(total) => println!("Conversations ({} of {})", summaries.len(), total),
        None => println!("Conversations ({})", summaries.len()),
    }

    for summary in &summaries {
        let marker = if summary.is_selected { ">" } else { " " };
        let agent = if summary.agent_enabled { "ai" } else { "  " };
        let when = summary
            .last_activity
            .map(|at| at.with_timezone(&Local).format("%H:%M").to_string())
            .unwrap_or_default();
        let unread = if summary.unread_count > 0 {
            format!(" ({})", summary.unread_count)
        } else {
            String::new()
        };
        println!(
            "{} {:<width$} {:>5} {} {}{}",
            marker,
            truncate(&summary.title, TITLE_WIDTH),
            when,
            agent,
            truncate(&summary.preview, PREVIEW_WIDTH),
            unread,
            width = TITLE_WIDTH
        );
    }
}

pub fn print_timeline(coordinator: &SyncCoordinator) {
    let Some(conversation) = coordinator.selected_conversation() else {
        return;
    };
    let title = format_contact_name(&conversation.name, conversation.phone.as_deref());
    println!();
    println!("== {} ==", title);

    let today = Local::now().date_naive();
    for item in timeline(coordinator.messages().messages(), &Local, today) {
        match item {
            TimelineItem::DateSeparator { label, .. } => println!("-- {} --", label),
            TimelineItem::Message(message) => println!(
                "[{}] {}: {}",
                message.created_at.with_timezone(&Local).format("%H:%M"),
                sender_label(message.role, &title),
                message.content
            ),
        }
    }
}

/// Print notices newer than `seen`; returns the newest id printed
pub fn print_notices(coordinator: &SyncCoordinator, seen: u64) -> u64 {
    let mut newest = seen;
    for notice in coordinator.notices().active().iter().filter(|n| n.id > seen) {
        let prefix = match notice.level {
            NoticeLevel::Error => "error",
            NoticeLevel::Warning => "warning",
            NoticeLevel::Info => "info",
        };
        eprintln!("[{}] {}", prefix, notice.text);
        newest = newest.max(notice.id);
    }
    newest
}

fn truncate(text: &str, max: usize) -> String {
    let single_line = text.replace('\n', " ");
    if single_line.chars().count() <= max {
        return single_line;
    }
    let mut out: String = single_line.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}
