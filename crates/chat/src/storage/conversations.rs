//! Paginated, deduplicated conversation list sorted by recency

use log::{debug, info};
use std::cmp::Ordering;
use std::collections::HashSet;

use super::cursor::{ListState, LoadKind, LoadSummary, Page, PageCursor, PageRequest};
use crate::models::{Conversation, ConversationId, ConversationPatch};

/// Order: most recent activity first, then case-folded name
fn recency_order(a: &Conversation, b: &Conversation) -> Ordering {
    match (a.activity_at(), b.activity_at()) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
    .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
}

pub struct ConversationStore {
    items: Vec<Conversation>,
    cursor: PageCursor,
    state: ListState,
    /// Bumped when the filter changes so older completions are dropped
    epoch: u64,
    /// Bumped on every mutation of `items`
    revision: u64,
    instance: Option<String>,
    search: Option<String>,
    /// Open conversation, kept across reset loads that no longer include it
    open: Option<ConversationId>,
}

impl ConversationStore {
    pub fn new(page_size: usize) -> Self {
        Self {
            items: Vec::new(),
            cursor: PageCursor::new(page_size),
            state: ListState::Idle,
            epoch: 0,
            revision: 0,
            instance: None,
            search: None,
            open: None,
        }
    }

    pub fn all(&self) -> &[Conversation] {
        &self.items
    }

    pub fn first(&self) -> Option<&Conversation> {
        self.items.first()
    }

    pub fn get(&self, id: &ConversationId) -> Option<&Conversation> {
        self.items.iter().find(|c| &c.id == id)
    }

    pub fn contains(&self, id: &ConversationId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn state(&self) -> &ListState {
        &self.state
    }

    pub fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Server-side instance selector; `None` means all instances
    pub fn instance_filter(&self) -> Option<&str> {
        self.instance.as_deref()
    }

    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// Mark the conversation the operator has open
    pub fn set_open(&mut self, id: Option<ConversationId>) {
        self.open = id;
    }

    /// Change the instance selector (`"all"` clears it)
    ///
    /// Returns whether it changed; in-flight loads become stale and the
    /// caller is expected to issue a reset load.
    pub fn set_instance_filter(&mut self, instance: Option<&str>) -> bool {
        let instance = instance
            .map(str::trim)
            .filter(|i| !i.is_empty() && !i.eq_ignore_ascii_case("all"))
            .map(str::to_string);
        if instance == self.instance {
            return false;
        }
        self.instance = instance;
        self.invalidate_in_flight();
        true
    }

    /// Change the server-side search term
    pub fn set_search(&mut self, term: Option<&str>) -> bool {
        let term = term
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        if term == self.search {
            return false;
        }
        self.search = term;
        self.invalidate_in_flight();
        true
    }

    /// Start a page load
    ///
    /// `None` when a load is already in flight, or when extending a list
    /// that has no more pages.
    pub fn begin_load(&mut self, reset: bool) -> Option<PageRequest> {
        if self.state.is_loading() {
            debug!("Conversation load already in flight, ignoring");
            return None;
        }
        if !reset && !self.cursor.has_more {
            return None;
        }

        let (kind, page) = if reset {
            self.state = ListState::LoadingReset;
            (LoadKind::Reset, 1)
        } else {
            self.state = ListState::LoadingMore;
            (LoadKind::More, self.cursor.page + 1)
        };

        Some(PageRequest {
            kind,
            page,
            limit: self.cursor.page_size,
            epoch: self.epoch,
        })
    }

    /// Merge the result of a load started with [`begin_load`](Self::begin_load)
    ///
    /// A reset replaces the list; a next page is appended with the existing
    /// entry winning on id collisions. Stale tickets are ignored.
    pub fn complete_load(
        &mut self,
        request: &PageRequest,
        result: Result<Page<Conversation>, String>,
    ) -> Option<LoadSummary> {
        if request.epoch != self.epoch {
            debug!(
                "Discarding conversation page {} from epoch {} (now {})",
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
        let mut seen: HashSet<ConversationId> = match request.kind {
            LoadKind::Reset => HashSet::new(),
            LoadKind::More => self.items.iter().map(|c| c.id.clone()).collect(),
        };

        let received = page.items.len();
        let fresh: Vec<Conversation> = page
            .items
            .into_iter()
            .filter(|c| seen.insert(c.id.clone()))
            .collect();
        let added = fresh.len();

        match request.kind {
            LoadKind::Reset => {
                let kept = self
                    .open
                    .as_ref()
                    .filter(|id| !seen.contains(*id))
                    .and_then(|id| self.items.iter().position(|c| &c.id == id))
                    .map(|i| self.items.swap_remove(i));
                self.items = fresh;
                if let Some(open) = kept {
                    debug!("Keeping open conversation {} outside page 1", open.id);
                    self.items.push(open);
                }
            }
            LoadKind::More => self.items.extend(fresh),
        }
        self.items.sort_by(recency_order);

        self.cursor.page = request.page;
        self.cursor.has_more = has_more;
        self.state = ListState::Idle;
        self.revision += 1;

        info!(
            "Loaded conversation page {} ({} new, {} duplicate, has_more={})",
            request.page,
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

    /// In-place update followed by a re-sort
    pub fn patch(&mut self, id: &ConversationId, patch: &ConversationPatch) -> bool {
        let Some(conversation) = self.items.iter_mut().find(|c| &c.id == id) else {
            return false;
        };
        if !patch.apply(conversation) {
            return false;
        }
        self.items.sort_by(recency_order);
        self.revision += 1;
        true
    }

    /// Merge a leading page fetched by background sync
    ///
    /// Entries whose preview and timestamp are unchanged are left alone.
    /// Changed entries are merged (never regressing the caption); for
    /// `open` the local unread counter is kept. Unknown ids are inserted.
    /// Returns the ids that changed.
    pub fn merge_sync(
        &mut self,
        updates: Vec<Conversation>,
        open: Option<&ConversationId>,
    ) -> Vec<ConversationId> {
        let mut changed = Vec::new();

        for fresh in updates {
            match self.items.iter_mut().find(|c| c.id == fresh.id) {
                Some(existing) => {
                    if !existing.activity_differs(&fresh) {
                        continue;
                    }
                    let before = existing.clone();
                    let keep_unread = open == Some(&fresh.id);
                    let id = fresh.id.clone();
                    existing.merge_from(fresh, keep_unread);
                    if *existing != before {
                        changed.push(id);
                    }
                }
                None => {
                    debug!("Background sync found new conversation {}", fresh.id);
                    changed.push(fresh.id.clone());
                    self.items.push(fresh);
                }
            }
        }

        if !changed.is_empty() {
            self.items.sort_by(recency_order);
            self.revision += 1;
        }
        changed
    }

    /// Insert a locally created conversation, or merge it if already known
    pub fn upsert(&mut self, conversation: Conversation) {
        match self.items.iter_mut().find(|c| c.id == conversation.id) {
            Some(existing) => existing.merge_from(conversation, true),
            None => self.items.push(conversation),
        }
        self.items.sort_by(recency_order);
        self.revision += 1;
    }

    /// Local search by display name or phone (case-insensitive)
    pub fn filter(&self, term: &str) -> Vec<&Conversation> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            return self.items.iter().collect();
        }
        self.items
            .iter()
            .filter(|c| {
                c.name.to_lowercase().contains(&term)
                    || c.phone.as_deref().is_some_and(|p| p.contains(&term))
                    || c.id.as_str().to_lowercase().contains(&term)
            })
            .collect()
    }

    fn invalidate_in_flight(&mut self) {
        self.epoch += 1;
        if self.state.is_loading() {
            self.state = ListState::Idle;
        }
    }
}
