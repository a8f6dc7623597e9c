//! Chronological message buffer for the open conversation
//!
//! Pages arrive newest-first and are reversed before merging. Every mutation
//! path deduplicates by id and keeps `created_at` non-decreasing; equal
//! timestamps keep their relative order.

use chrono::TimeZone;
use log::{debug, info, warn};
use std::collections::HashSet;

use super::cursor::{ListState, LoadKind, LoadSummary, Page, PageCursor, PageRequest};
use crate::models::{ConversationId, DeliveryStatus, Message, MessageId, Role};

/// Load-phase flags owned by the scroll controller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryGate {
    /// Infinite scroll has been unlocked after the initial load settled
    pub history_enabled: bool,
    /// The initial load of this conversation has not been anchored yet
    pub initial_load: bool,
}

/// Why a history fetch was not started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryBlock {
    NoConversation,
    Loading,
    NoMoreHistory,
    HistoryDisabled,
    InitialLoad,
}

pub struct MessageStore {
    conversation_id: Option<ConversationId>,
    messages: Vec<Message>,
    cursor: PageCursor,
    state: ListState,
    /// Bumped on every reset; completions from older epochs are dropped
    epoch: u64,
    /// Bumped on every mutation of the buffer
    revision: u64,
    /// Sent messages the server confirmed without returning its own copy
    provisional: HashSet<MessageId>,
}

impl MessageStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            conversation_id: None,
            messages: Vec::new(),
            cursor: PageCursor::new(page_size),
            state: ListState::Idle,
            epoch: 0,
            revision: 0,
            provisional: HashSet::new(),
        }
    }

    pub fn conversation_id(&self) -> Option<&ConversationId> {
        self.conversation_id.as_ref()
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn get(&self, id: &MessageId) -> Option<&Message> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Open `conversation_id`: clear the buffer and start loading page 1
    ///
    /// `None` if a reset of the same conversation is already in flight.
    pub fn begin_reset(&mut self, conversation_id: ConversationId) -> Option<PageRequest> {
        if self.state.is_loading_reset() && self.conversation_id.as_ref() == Some(&conversation_id) {
            debug!("Reset of {} already in flight, ignoring", conversation_id);
            return None;
        }

        self.epoch += 1;
        self.conversation_id = Some(conversation_id);
        if !self.messages.is_empty() {
            self.messages.clear();
            self.revision += 1;
        }
        self.provisional.clear();
        self.cursor.reset();
        self.state = ListState::LoadingReset;

        Some(PageRequest {
            kind: LoadKind::Reset,
            page: 1,
            limit: self.cursor.page_size,
            epoch: self.epoch,
        })
    }

    /// Check every condition for fetching an older page
    pub fn history_guard(&self, gate: HistoryGate) -> Result<(), HistoryBlock> {
        if self.conversation_id.is_none() {
            return Err(HistoryBlock::NoConversation);
        }
        if self.state.is_loading() {
            return Err(HistoryBlock::Loading);
        }
        if !self.cursor.has_more {
            return Err(HistoryBlock::NoMoreHistory);
        }
        if gate.initial_load {
            return Err(HistoryBlock::InitialLoad);
        }
        if !gate.history_enabled {
            return Err(HistoryBlock::HistoryDisabled);
        }
        Ok(())
    }

    /// Start fetching the next older page if the guard allows it
    pub fn begin_load_more(&mut self, gate: HistoryGate) -> Option<PageRequest> {
        if let Err(reason) = self.history_guard(gate) {
            debug!("History fetch suppressed: {:?}", reason);
            return None;
        }
        self.state = ListState::LoadingMore;
        Some(PageRequest {
            kind: LoadKind::More,
            page: self.cursor.page + 1,
            limit: self.cursor.page_size,
            epoch: self.epoch,
        })
    }

    /// Merge a page started with `begin_reset` or `begin_load_more`
    pub fn complete_load(
        &mut self,
        request: &PageRequest,
        result: Result<Page<Message>, String>,
    ) -> Option<LoadSummary> {
        if request.epoch != self.epoch {
            debug!(
                "Discarding message page {} from epoch {} (now {})",
                request.page, request.epoch, self.epoch
            );
            return None;
        }

        let page = match result {
            Ok(page) => page,
            Err(message) => {
                self.state = ListState::Error(message);
                return None;
            }
        };

        let has_more = page.has_more(request.limit);
        let received = page.items.len();
        let mut chronological = page.items;
        chronological.reverse();

        let mut seen: HashSet<MessageId> = self.messages.iter().map(|m| m.id.clone()).collect();
        let fresh: Vec<Message> = chronological
            .into_iter()
            .filter(|m| seen.insert(m.id.clone()))
            .collect();
        let added = fresh.len();

        match request.kind {
            LoadKind::Reset => {
                // Locally appended sends that raced the reset stay after the page
                let local = std::mem::take(&mut self.messages);
                self.messages = fresh;
                self.messages.extend(local);
            }
            LoadKind::More => {
                let newer = std::mem::replace(&mut self.messages, fresh);
                self.messages.extend(newer);
            }
        }
        self.messages.sort_by_key(|m| m.created_at);

        self.cursor.page = request.page;
        self.cursor.has_more = has_more;
        self.state = ListState::Idle;
        self.revision += 1;

        info!(
            "Loaded message page {} for {} ({} new, {} duplicate, has_more={})",
            request.page,
            self.conversation_label(),
            added,
            received - added,
            has_more
        );

        Some(LoadSummary {
            kind: request.kind,
            added,
            duplicates: received - added,
        })
    }

    /// Merge a leading (newest-first) page without touching history or cursor
    ///
    /// Used by manual refresh and background catch-up. Returns the messages
    /// that were not in the buffer before.
    pub fn merge_latest(&mut self, conversation_id: &ConversationId, page: Page<Message>) -> Vec<Message> {
        if self.conversation_id.as_ref() != Some(conversation_id) {
            return Vec::new();
        }

        let mut changed = false;
        let mut added = Vec::new();
        for incoming in page.items.into_iter().rev() {
            match self.messages.iter_mut().find(|m| m.id == incoming.id) {
                Some(existing) => {
                    if existing.status != incoming.status || existing.is_read != incoming.is_read {
                        existing.status = incoming.status;
                        existing.is_read = incoming.is_read;
                        changed = true;
                    }
                }
                None => {
                    if !self.adopt_server_copy(&incoming) {
                        added.push(incoming.clone());
                        self.insert_sorted(incoming);
                    }
                    changed = true;
                }
            }
        }

        if changed {
            self.revision += 1;
        }
        if !added.is_empty() {
            debug!("Merged {} new message(s) into {}", added.len(), conversation_id);
        }
        added
    }

    /// Append a new message at its chronological position
    pub fn append(&mut self, message: Message) -> bool {
        if self.conversation_id.as_ref() != Some(&message.conversation_id) {
            return false;
        }
        if self.contains(&message.id) {
            debug!("Message {} already in buffer, not appending", message.id);
            return false;
        }
        self.insert_sorted(message);
        self.revision += 1;
        true
    }

    /// Swap an optimistic message for its confirmed counterpart
    ///
    /// The temp entry disappears and the confirmed one appears in the same
    /// mutation. If the confirmed id is already buffered (a sync got there
    /// first) the existing row is updated instead.
    pub fn replace(&mut self, temp_id: &MessageId, confirmed: Message) -> bool {
        if self.conversation_id.as_ref() != Some(&confirmed.conversation_id) {
            return false;
        }

        let removed = self.messages.iter().position(|m| &m.id == temp_id).map(|idx| self.messages.remove(idx));
        if removed.is_none() {
            debug!("Temp message {} not in buffer during reconciliation", temp_id);
        }

        if &confirmed.id == temp_id {
            self.provisional.insert(confirmed.id.clone());
        }
        match self.messages.iter_mut().find(|m| m.id == confirmed.id) {
            Some(existing) => *existing = confirmed,
            None => self.insert_sorted(confirmed),
        }
        self.messages.sort_by_key(|m| m.created_at);
        self.revision += 1;
        true
    }

    pub fn remove(&mut self, id: &MessageId) -> Option<Message> {
        self.provisional.remove(id);
        let idx = self.messages.iter().position(|m| &m.id == id)?;
        self.revision += 1;
        Some(self.messages.remove(idx))
    }

    pub fn set_status(&mut self, id: &MessageId, status: DeliveryStatus) -> bool {
        match self.messages.iter_mut().find(|m| &m.id == id) {
            Some(message) if message.status != status => {
                message.status = status;
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    /// Drop the buffer and forget the conversation
    pub fn close(&mut self) {
        self.epoch += 1;
        self.conversation_id = None;
        self.messages.clear();
        self.provisional.clear();
        self.cursor.reset();
        self.state = ListState::Idle;
        self.revision += 1;
    }

    /// Swap a provisional sent message for the server row it turned into
    fn adopt_server_copy(&mut self, incoming: &Message) -> bool {
        if self.provisional.is_empty() || incoming.role != Role::Me {
            return false;
        }
        let Some(idx) = self.messages.iter().position(|m| {
            self.provisional.contains(&m.id) && m.content == incoming.content
        }) else {
            return false;
        };

        let local = self.messages.remove(idx);
        self.provisional.remove(&local.id);
        warn!(
            "Sent message {} in {} came back as {}, keeping the server id",
            local.id,
            self.conversation_label(),
            incoming.id
        );
        self.insert_sorted(incoming.clone());
        true
    }

    /// Whether the message at `index` starts a new calendar day in `tz`
    pub fn needs_date_separator<Tz: TimeZone>(&self, index: usize, tz: &Tz) -> bool {
        let Some(current) = self.messages.get(index) else {
            return false;
        };
        if index == 0 {
            return true;
        }
        let previous = &self.messages[index - 1];
        current.created_at.with_timezone(tz).date_naive()
            != previous.created_at.with_timezone(tz).date_naive()
    }

    fn insert_sorted(&mut self, message: Message) {
        let idx = self
            .messages
            .partition_point(|m| m.created_at <= message.created_at);
        self.messages.insert(idx, message);
    }

    fn conversation_label(&self) -> &str {
        self.conversation_id.as_ref().map(|c| c.as_str()).unwrap_or("<none>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    const OPEN_GATE: HistoryGate = HistoryGate {
        history_enabled: true,
        initial_load: false,
    };

    fn base() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn msg(id: &str, minutes: i64) -> Message {
        Message::builder(MessageId::new(id), ConversationId::new("c1"))
            .role(Role::User)
            .content(format!("body {}", id))
            .created_at(base() + Duration::minutes(minutes))
            .build()
    }

    /// Newest-first page of ids `m{from}..m{to}` (higher = newer)
    fn newest_first(from: i64, to: i64) -> Page<Message> {
        Page::new((from..to).rev().map(|i| msg(&format!("m{}", i), i)).collect(), None)
    }

    fn opened(page_size: usize) -> (MessageStore, PageRequest) {
        let mut store = MessageStore::new(page_size);
        let request = store.begin_reset(ConversationId::new("c1")).unwrap();
        (store, request)
    }

    fn assert_sorted(store: &MessageStore) {
        assert!(store
            .messages()
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_reset_reverses_to_chronological() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 5)));

        let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m0", "m1", "m2", "m3", "m4"]);
        assert!(!store.cursor().has_more);
    }

    #[test]
    fn test_prepend_dedupes_and_keeps_order() {
        let (mut store, request) = opened(3);
        store.complete_load(&request, Ok(newest_first(10, 13)));
        assert!(store.cursor().has_more);

        let request = store.begin_load_more(OPEN_GATE).unwrap();
        assert_eq!(request.page, 2);
        // Overlaps m10 with the buffer
        store.complete_load(&request, Ok(newest_first(8, 11)));

        let ids: Vec<&str> = store.messages().iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m8", "m9", "m10", "m11", "m12"]);
        assert_sorted(&store);
    }

    #[test]
    fn test_history_guard_conditions() {
        let store = MessageStore::new(20);
        assert_eq!(store.history_guard(OPEN_GATE), Err(HistoryBlock::NoConversation));

        let (mut store, request) = opened(3);
        assert_eq!(store.history_guard(OPEN_GATE), Err(HistoryBlock::Loading));
        store.complete_load(&request, Ok(newest_first(0, 3)));

        let initial = HistoryGate { initial_load: true, ..OPEN_GATE };
        assert_eq!(store.history_guard(initial), Err(HistoryBlock::InitialLoad));

        let disabled = HistoryGate { history_enabled: false, ..OPEN_GATE };
        assert_eq!(store.history_guard(disabled), Err(HistoryBlock::HistoryDisabled));

        assert!(store.history_guard(OPEN_GATE).is_ok());
        assert!(store.begin_load_more(OPEN_GATE).is_some());
        // Second request while the first is in flight
        assert!(store.begin_load_more(OPEN_GATE).is_none());
    }

    #[test]
    fn test_stale_epoch_discarded() {
        let (mut store, stale) = opened(20);
        let current = store.begin_reset(ConversationId::new("c2")).unwrap();

        assert!(store.complete_load(&stale, Ok(newest_first(0, 3))).is_none());
        assert!(store.is_empty());

        let page = Page::new(
            vec![Message::builder(MessageId::new("x"), ConversationId::new("c2")).build()],
            None,
        );
        assert!(store.complete_load(&current, Ok(page)).is_some());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_duplicate_reset_is_noop() {
        let (mut store, _) = opened(20);
        assert!(store.begin_reset(ConversationId::new("c1")).is_none());
    }

    #[test]
    fn test_append_dedupes() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));

        assert!(store.append(msg("m9", 9)));
        assert!(!store.append(msg("m9", 9)));
        assert_eq!(store.len(), 4);
        assert_eq!(store.messages().last().unwrap().id.as_str(), "m9");
    }

    #[test]
    fn test_replace_swaps_temp_atomically() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));
        let temp = Message::builder(MessageId::new("tmp-1"), ConversationId::new("c1"))
            .role(Role::Me)
            .status(DeliveryStatus::Temp)
            .created_at(base() + Duration::minutes(5))
            .build();
        store.append(temp);

        let confirmed = Message::builder(MessageId::new("srv-1"), ConversationId::new("c1"))
            .role(Role::Me)
            .created_at(base() + Duration::minutes(5))
            .build();
        let revision = store.revision();
        assert!(store.replace(&MessageId::new("tmp-1"), confirmed));

        assert!(!store.contains(&MessageId::new("tmp-1")));
        assert!(store.contains(&MessageId::new("srv-1")));
        assert_eq!(store.len(), 4);
        assert_eq!(store.revision(), revision + 1);
    }

    #[test]
    fn test_replace_when_confirmed_already_synced() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));
        store.append(
            Message::builder(MessageId::new("tmp"), ConversationId::new("c1"))
                .status(DeliveryStatus::Temp)
                .build(),
        );

        store.replace(&MessageId::new("tmp"), msg("m2", 2));
        assert_eq!(store.len(), 3);
        assert_sorted(&store);
    }

    #[test]
    fn test_merge_latest_adopts_server_copy_of_unechoed_send() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));
        let sent = Message::builder(MessageId::new("t1"), ConversationId::new("c1"))
            .role(Role::Me)
            .content("on my way")
            .created_at(base() + Duration::minutes(5))
            .build();
        store.append(Message { status: DeliveryStatus::Temp, ..sent.clone() });
        // Confirmed without a server copy: the row keeps the client token
        assert!(store.replace(&MessageId::new("t1"), sent));

        let server = Message::builder(MessageId::new("srv-9"), ConversationId::new("c1"))
            .role(Role::Me)
            .content("on my way")
            .created_at(base() + Duration::minutes(5))
            .build();
        let mut page = newest_first(0, 3);
        page.items.insert(0, server);
        let added = store.merge_latest(&ConversationId::new("c1"), page);

        assert!(added.is_empty());
        assert_eq!(store.len(), 4);
        assert!(!store.contains(&MessageId::new("t1")));
        assert!(store.contains(&MessageId::new("srv-9")));
        assert_sorted(&store);

        // An incoming message with the same text is new once the row is adopted
        let mut again = newest_first(0, 3);
        again.items.insert(
            0,
            Message::builder(MessageId::new("srv-10"), ConversationId::new("c1"))
                .role(Role::Me)
                .content("on my way")
                .created_at(base() + Duration::minutes(6))
                .build(),
        );
        assert_eq!(store.merge_latest(&ConversationId::new("c1"), again).len(), 1);
        assert_eq!(store.len(), 5);
    }

    #[test]
    fn test_merge_latest_keeps_history() {
        let (mut store, request) = opened(3);
        store.complete_load(&request, Ok(newest_first(10, 13)));
        let request = store.begin_load_more(OPEN_GATE).unwrap();
        store.complete_load(&request, Ok(newest_first(7, 10)));
        assert_eq!(store.len(), 6);

        let added = store.merge_latest(&ConversationId::new("c1"), newest_first(11, 14));
        assert_eq!(added.len(), 1);
        assert_eq!(store.len(), 7);
        assert_eq!(store.cursor().page, 2);
        assert_sorted(&store);
    }

    #[test]
    fn test_merge_latest_unchanged_keeps_revision() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));
        let revision = store.revision();

        let added = store.merge_latest(&ConversationId::new("c1"), newest_first(0, 3));
        assert!(added.is_empty());
        assert_eq!(store.revision(), revision);

        // Wrong conversation is ignored
        assert!(store.merge_latest(&ConversationId::new("c2"), newest_first(5, 6)).is_empty());
    }

    #[test]
    fn test_date_separators() {
        let (mut store, request) = opened(20);
        let day = |d: u32, h: u32, id: &str| {
            Message::builder(MessageId::new(id), ConversationId::new("c1"))
                .created_at(Utc.with_ymd_and_hms(2026, 3, d, h, 0, 0).unwrap())
                .build()
        };
        let page = Page::new(vec![day(2, 9, "c"), day(1, 18, "b"), day(1, 8, "a")], None);
        store.complete_load(&request, Ok(page));

        assert!(store.needs_date_separator(0, &Utc));
        assert!(!store.needs_date_separator(1, &Utc));
        assert!(store.needs_date_separator(2, &Utc));
        assert!(!store.needs_date_separator(3, &Utc));
    }

    #[test]
    fn test_remove_and_close() {
        let (mut store, request) = opened(20);
        store.complete_load(&request, Ok(newest_first(0, 3)));
        assert!(store.remove(&MessageId::new("m1")).is_some());
        assert!(store.remove(&MessageId::new("m1")).is_none());

        store.close();
        assert!(store.is_empty());
        assert!(store.conversation_id().is_none());
    }
}
