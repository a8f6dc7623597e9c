//! The scrollable message pane as seen by the anchor controller

use crate::models::Message;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ScrollMetrics {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub content_height: f64,
}

impl ScrollMetrics {
    pub fn max_scroll_top(&self) -> f64 {
        (self.content_height - self.viewport_height).max(0.0)
    }

    pub fn distance_from_bottom(&self) -> f64 {
        (self.content_height - self.viewport_height - self.scroll_top).max(0.0)
    }
}

pub trait Viewport {
    fn scroll_metrics(&self) -> ScrollMetrics;

    fn set_scroll_top(&mut self, top: f64);

    fn content_height(&self) -> f64 {
        self.scroll_metrics().content_height
    }

    /// Animated scroll; hosts without animation jump
    fn smooth_scroll_to(&mut self, top: f64) {
        self.set_scroll_top(top);
    }

    /// Called after the message buffer changed
    ///
    /// Hosts that lay out synchronously re-measure here; others do nothing
    /// and report the new height on their next frame.
    fn content_updated(&mut self, _messages: &[Message]) {}
}

/// A viewport with fixed-height rows, for headless hosts
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualViewport {
    pub scroll_top: f64,
    pub viewport_height: f64,
    pub row_height: f64,
    rows: usize,
}

impl VirtualViewport {
    pub fn new(viewport_height: f64, row_height: f64) -> Self {
        Self {
            scroll_top: 0.0,
            viewport_height,
            row_height,
            rows: 0,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    /// Indices of the rows currently on screen
    pub fn visible_rows(&self) -> std::ops::Range<usize> {
        if self.row_height <= 0.0 {
            return 0..self.rows;
        }
        let first = (self.scroll_top / self.row_height).floor() as usize;
        let count = (self.viewport_height / self.row_height).ceil() as usize + 1;
        first.min(self.rows)..(first + count).min(self.rows)
    }
}

impl Viewport for VirtualViewport {
    fn scroll_metrics(&self) -> ScrollMetrics {
        ScrollMetrics {
            scroll_top: self.scroll_top,
            viewport_height: self.viewport_height,
            content_height: self.rows as f64 * self.row_height,
        }
    }

    fn set_scroll_top(&mut self, top: f64) {
        let max = self.scroll_metrics().max_scroll_top();
        self.scroll_top = top.clamp(0.0, max);
    }

    fn content_updated(&mut self, messages: &[Message]) {
        self.rows = messages.len();
    }
}
