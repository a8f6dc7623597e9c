//! Pagination cursor and per-list load state

/// Load state of one paginated list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ListState {
    #[default]
    Idle,
    /// Fetching page 1 to replace the list
    LoadingReset,
    /// Fetching the next page to extend the list
    LoadingMore,
    /// The last fetch failed; the list keeps what it had
    Error(String),
}

impl ListState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ListState::LoadingReset | ListState::LoadingMore)
    }

    pub fn is_loading_reset(&self) -> bool {
        matches!(self, ListState::LoadingReset)
    }

    pub fn is_loading_more(&self) -> bool {
        matches!(self, ListState::LoadingMore)
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            ListState::Error(message) => Some(message),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor {
    /// Last page merged into the list (0 before the first load)
    pub page: u32,
    pub page_size: usize,
    pub has_more: bool,
}

impl PageCursor {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size,
            has_more: true,
        }
    }

    pub fn reset(&mut self) {
        self.page = 0;
        self.has_more = true;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadKind {
    Reset,
    More,
}

/// Ticket for one in-flight page fetch
///
/// Carries the list epoch at issue time; completing with a ticket from an
/// older epoch is a no-op.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub kind: LoadKind,
    pub page: u32,
    pub limit: usize,
    pub epoch: u64,
}

/// One fetched page as the server returned it
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Explicit `hasMore` flag, when the server sent one
    pub server_has_more: Option<bool>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, server_has_more: Option<bool>) -> Self {
        Self {
            items,
            server_has_more,
        }
    }

    /// More pages exist if the server says so or the page came back full
    pub fn has_more(&self, page_size: usize) -> bool {
        self.server_has_more.unwrap_or(false) || (page_size > 0 && self.items.len() >= page_size)
    }
}

/// What a completed page load changed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadSummary {
    pub kind: LoadKind,
    pub added: usize,
    /// Rows dropped because their id was already present
    pub duplicates: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_has_more_inference() {
        let full = Page::new(vec![1; 15], None);
        assert!(full.has_more(15));

        let short = Page::new(vec![1; 3], None);
        assert!(!short.has_more(15));

        let flagged = Page::new(vec![1; 3], Some(true));
        assert!(flagged.has_more(15));

        // A full page wins over an explicit false
        let full_but_false = Page::new(vec![1; 15], Some(false));
        assert!(full_but_false.has_more(15));
    }

    #[test]
    fn test_list_state_predicates() {
        assert!(ListState::LoadingReset.is_loading());
        assert!(ListState::LoadingMore.is_loading());
        assert!(!ListState::Idle.is_loading());
        assert_eq!(ListState::Error("boom".into()).error(), Some("boom"));
    }
}
