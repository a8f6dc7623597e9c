//! Scroll anchoring policy
//!
//! Decides when the message pane moves: to the bottom for new content and
//! sends, by the height delta after a history prepend, and not at all for
//! background sync. All timers are caller-driven through `now`.

use chrono::{DateTime, Duration, Utc};
use log::{debug, warn};

use super::viewport::Viewport;
use crate::storage::HistoryGate;
use crate::sync::timing::{earliest, Deadline};

#[derive(Debug, Clone)]
pub struct AnchorConfig {
    /// Distance from the bottom that still counts as "at bottom"
    pub bottom_threshold: f64,
    /// Scroll offset below which older history is requested
    pub near_top_threshold: f64,
    pub scroll_debounce: Duration,
    pub bottom_retry_interval: Duration,
    pub bottom_retry_attempts: u32,
    /// Delay after the initial anchor before history loading unlocks
    pub history_settle: Duration,
}

impl Default for AnchorConfig {
    fn default() -> Self {
        Self {
            bottom_threshold: 5.0,
            near_top_threshold: 100.0,
            scroll_debounce: Duration::milliseconds(10),
            bottom_retry_interval: Duration::milliseconds(50),
            bottom_retry_attempts: 20,
            history_settle: Duration::milliseconds(500),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnchorPosition {
    Bottom,
    /// An absolute scroll offset
    Offset(f64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnchorOptions {
    pub immediate: bool,
    pub smooth: bool,
    /// The call belongs to the initial load and may run while it is flagged
    pub during_initial_load: bool,
}

impl AnchorOptions {
    pub fn immediate() -> Self {
        Self {
            immediate: true,
            ..Default::default()
        }
    }

    pub fn smooth() -> Self {
        Self {
            smooth: true,
            ..Default::default()
        }
    }

    pub fn initial_load() -> Self {
        Self {
            immediate: true,
            during_initial_load: true,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct BottomRetry {
    next_at: DateTime<Utc>,
    attempts_left: u32,
    initial: bool,
}

pub struct ScrollAnchorController {
    config: AnchorConfig,
    at_bottom: bool,
    unread: u32,
    initial_load: bool,
    history_enabled: bool,
    history_unlock: Deadline,
    history_check: Deadline,
    /// Content height captured before a history prepend
    pending_prepend: Option<f64>,
    bottom_retry: Option<BottomRetry>,
}

impl ScrollAnchorController {
    pub fn new(config: AnchorConfig) -> Self {
        Self {
            config,
            at_bottom: true,
            unread: 0,
            initial_load: false,
            history_enabled: false,
            history_unlock: Deadline::default(),
            history_check: Deadline::default(),
            pending_prepend: None,
            bottom_retry: None,
        }
    }

    pub fn is_at_bottom(&self) -> bool {
        self.at_bottom
    }

    pub fn unread(&self) -> u32 {
        self.unread
    }

    pub fn is_initial_load(&self) -> bool {
        self.initial_load
    }

    pub fn has_pending_prepend(&self) -> bool {
        self.pending_prepend.is_some()
    }

    /// Move the viewport; returns `false` if suppressed by the initial load
    pub fn anchor(
        &mut self,
        viewport: &mut dyn Viewport,
        position: AnchorPosition,
        options: AnchorOptions,
    ) -> bool {
        if self.initial_load && !options.during_initial_load {
            debug!("Anchor to {:?} suppressed during initial load", position);
            return false;
        }

        match position {
            AnchorPosition::Bottom => {
                let target = viewport.scroll_metrics().max_scroll_top();
                if options.smooth && !options.immediate {
                    viewport.smooth_scroll_to(target);
                } else {
                    viewport.set_scroll_top(target);
                }
                self.at_bottom = true;
                self.unread = 0;
            }
            AnchorPosition::Offset(top) => {
                viewport.set_scroll_top(top.max(0.0));
                self.refresh_at_bottom(viewport);
            }
        }
        true
    }

    /// A conversation is being opened: suppress anchoring until it lands
    pub fn begin_initial_load(&mut self) {
        self.cancel_timers();
        self.initial_load = true;
        self.history_enabled = false;
        self.at_bottom = true;
        self.unread = 0;
    }

    /// The initial page is in the buffer; anchor to bottom once it has height
    ///
    /// Returns whether the anchor happened now. Otherwise it is retried on
    /// [`run_bottom_retry`](Self::run_bottom_retry).
    pub fn finish_initial_load(&mut self, viewport: &mut dyn Viewport, now: DateTime<Utc>) -> bool {
        if !self.initial_load {
            return false;
        }
        self.schedule_bottom_retry(now, true);
        self.run_bottom_retry(viewport, now)
    }

    /// The initial page failed to load
    pub fn abort_initial_load(&mut self) {
        self.initial_load = false;
        self.bottom_retry = None;
    }

    /// Flags for the message store's history guard
    pub fn history_gate(&mut self, now: DateTime<Utc>) -> HistoryGate {
        if self.history_unlock.take_due(now) {
            self.history_enabled = true;
            debug!("History loading enabled");
        }
        HistoryGate {
            history_enabled: self.history_enabled,
            initial_load: self.initial_load,
        }
    }

    /// Immediate branch of a user scroll; arms the debounced history check
    pub fn on_user_scroll(&mut self, viewport: &dyn Viewport, now: DateTime<Utc>) -> bool {
        self.refresh_at_bottom(viewport);
        self.history_check.arm(now, self.config.scroll_debounce);
        self.at_bottom
    }

    /// Debounced branch: `true` once the debounce expired near the top
    pub fn take_history_check(&mut self, viewport: &dyn Viewport, now: DateTime<Utc>) -> bool {
        self.history_check.take_due(now)
            && viewport.scroll_metrics().scroll_top < self.config.near_top_threshold
    }

    pub fn begin_prepend(&mut self, viewport: &dyn Viewport) {
        self.pending_prepend = Some(viewport.content_height());
    }

    /// Shift the offset by the height the prepend added
    ///
    /// Returns the applied delta, or `None` if the viewport has not grown
    /// yet (the capture stays pending for the next call).
    pub fn finish_prepend(&mut self, viewport: &mut dyn Viewport) -> Option<f64> {
        let before = self.pending_prepend?;
        let metrics = viewport.scroll_metrics();
        let delta = metrics.content_height - before;
        if delta <= 0.0 {
            return None;
        }
        self.pending_prepend = None;
        viewport.set_scroll_top(metrics.scroll_top + delta);
        self.refresh_at_bottom(viewport);
        debug!("Preserved scroll position after prepend (+{:.0}px)", delta);
        Some(delta)
    }

    pub fn abandon_prepend(&mut self) {
        self.pending_prepend = None;
    }

    /// Background content arrived; count it unless the operator sees it
    pub fn note_incoming(&mut self, viewport: &dyn Viewport, count: u32) {
        self.refresh_at_bottom(viewport);
        if !self.at_bottom {
            self.unread += count;
        }
    }

    /// Force a bottom anchor once the viewport reports content
    pub fn schedule_bottom_retry(&mut self, now: DateTime<Utc>, initial: bool) {
        self.bottom_retry = Some(BottomRetry {
            next_at: now,
            attempts_left: self.config.bottom_retry_attempts.max(1),
            initial,
        });
    }

    /// Run a due bottom-retry attempt; returns whether it anchored
    pub fn run_bottom_retry(&mut self, viewport: &mut dyn Viewport, now: DateTime<Utc>) -> bool {
        let Some(mut retry) = self.bottom_retry else {
            return false;
        };
        if now < retry.next_at {
            return false;
        }

        if viewport.content_height() > 0.0 {
            self.bottom_retry = None;
            let options = if retry.initial {
                AnchorOptions::initial_load()
            } else {
                AnchorOptions::immediate()
            };
            let applied = self.anchor(viewport, AnchorPosition::Bottom, options);
            if retry.initial {
                self.complete_initial_load(now);
            }
            return applied;
        }

        retry.attempts_left -= 1;
        if retry.attempts_left == 0 {
            warn!("Viewport never reported content height, giving up bottom anchor");
            self.bottom_retry = None;
            if retry.initial {
                self.complete_initial_load(now);
            }
            return false;
        }
        retry.next_at = now + self.config.bottom_retry_interval;
        self.bottom_retry = Some(retry);
        false
    }

    /// Cancel every pending timer (conversation switch, teardown)
    pub fn cancel_timers(&mut self) {
        self.history_check.cancel();
        self.history_unlock.cancel();
        self.bottom_retry = None;
        self.pending_prepend = None;
    }

    /// When the host should next call back in
    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        earliest([
            self.history_check.at(),
            self.history_unlock.at(),
            self.bottom_retry.map(|r| r.next_at),
        ])
    }

    fn complete_initial_load(&mut self, now: DateTime<Utc>) {
        self.initial_load = false;
        self.history_unlock.arm(now, self.config.history_settle);
    }

    fn refresh_at_bottom(&mut self, viewport: &dyn Viewport) {
        self.at_bottom =
            viewport.scroll_metrics().distance_from_bottom() < self.config.bottom_threshold;
        if self.at_bottom {
            self.unread = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scroll::ScrollMetrics;

    struct TestViewport {
        metrics: ScrollMetrics,
    }

    impl TestViewport {
        fn new(content_height: f64) -> Self {
            Self {
                metrics: ScrollMetrics {
                    scroll_top: 0.0,
                    viewport_height: 400.0,
                    content_height,
                },
            }
        }
    }

    impl Viewport for TestViewport {
        fn scroll_metrics(&self) -> ScrollMetrics {
            self.metrics
        }

        fn set_scroll_top(&mut self, top: f64) {
            self.metrics.scroll_top = top.clamp(0.0, self.metrics.max_scroll_top());
        }
    }

    fn ms(n: i64) -> Duration {
        Duration::milliseconds(n)
    }

    #[test]
    fn test_anchor_bottom_clears_unread() {
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);
        controller.note_incoming(&viewport, 3);
        assert_eq!(controller.unread(), 3);

        assert!(controller.anchor(&mut viewport, AnchorPosition::Bottom, AnchorOptions::immediate()));
        assert_eq!(viewport.metrics.scroll_top, 600.0);
        assert_eq!(controller.unread(), 0);
        assert!(controller.is_at_bottom());
    }

    #[test]
    fn test_anchor_suppressed_during_initial_load() {
        let now = Utc::now();
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);
        controller.begin_initial_load();

        assert!(!controller.anchor(&mut viewport, AnchorPosition::Bottom, AnchorOptions::immediate()));
        assert_eq!(viewport.metrics.scroll_top, 0.0);

        assert!(controller.finish_initial_load(&mut viewport, now));
        assert_eq!(viewport.metrics.scroll_top, 600.0);
        assert!(!controller.is_initial_load());
    }

    #[test]
    fn test_history_unlocks_after_settle() {
        let now = Utc::now();
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);
        controller.begin_initial_load();
        assert!(controller.history_gate(now).initial_load);

        controller.finish_initial_load(&mut viewport, now);
        let gate = controller.history_gate(now + ms(499));
        assert!(!gate.history_enabled);
        assert!(!gate.initial_load);
        assert!(controller.history_gate(now + ms(500)).history_enabled);
    }

    #[test]
    fn test_initial_anchor_waits_for_content_height() {
        let now = Utc::now();
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(0.0);
        controller.begin_initial_load();

        assert!(!controller.finish_initial_load(&mut viewport, now));
        assert!(controller.is_initial_load());
        assert_eq!(controller.next_deadline(), Some(now + ms(50)));

        viewport.metrics.content_height = 800.0;
        assert!(!controller.run_bottom_retry(&mut viewport, now + ms(20)));
        assert!(controller.run_bottom_retry(&mut viewport, now + ms(50)));
        assert_eq!(viewport.metrics.scroll_top, 400.0);
        assert!(!controller.is_initial_load());
    }

    #[test]
    fn test_bottom_retry_gives_up() {
        let now = Utc::now();
        let config = AnchorConfig {
            bottom_retry_attempts: 3,
            ..Default::default()
        };
        let mut controller = ScrollAnchorController::new(config);
        let mut viewport = TestViewport::new(0.0);
        controller.schedule_bottom_retry(now, false);

        for i in 0..3 {
            assert!(!controller.run_bottom_retry(&mut viewport, now + ms(50 * i)));
        }
        assert_eq!(controller.next_deadline(), None);
    }

    #[test]
    fn test_user_scroll_updates_bottom_and_debounces_history_check() {
        let now = Utc::now();
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);

        viewport.metrics.scroll_top = 597.0;
        assert!(controller.on_user_scroll(&viewport, now));

        viewport.metrics.scroll_top = 50.0;
        assert!(!controller.on_user_scroll(&viewport, now));
        assert!(!controller.take_history_check(&viewport, now + ms(5)));
        assert!(controller.take_history_check(&viewport, now + ms(10)));
        // Consumed
        assert!(!controller.take_history_check(&viewport, now + ms(20)));

        viewport.metrics.scroll_top = 300.0;
        controller.on_user_scroll(&viewport, now);
        assert!(!controller.take_history_check(&viewport, now + ms(10)));
    }

    #[test]
    fn test_prepend_preserves_position() {
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);
        viewport.metrics.scroll_top = 20.0;

        controller.begin_prepend(&viewport);
        assert_eq!(controller.finish_prepend(&mut viewport), None);
        assert!(controller.has_pending_prepend());

        viewport.metrics.content_height = 1800.0;
        assert_eq!(controller.finish_prepend(&mut viewport), Some(800.0));
        assert_eq!(viewport.metrics.scroll_top, 820.0);
        assert!(!controller.has_pending_prepend());
    }

    #[test]
    fn test_incoming_while_at_bottom_not_counted() {
        let mut controller = ScrollAnchorController::new(AnchorConfig::default());
        let mut viewport = TestViewport::new(1000.0);
        viewport.metrics.scroll_top = 600.0;
        controller.note_incoming(&viewport, 2);
        assert_eq!(controller.unread(), 0);
    }
}
