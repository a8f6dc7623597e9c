//! Scroll anchoring for the message pane

mod anchor;
mod viewport;

pub use anchor::{AnchorConfig, AnchorOptions, AnchorPosition, ScrollAnchorController};
pub use viewport::{ScrollMetrics, Viewport, VirtualViewport};
