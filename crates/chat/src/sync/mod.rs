//! Sync engine: background polling, retry, and the coordinator that drives
//! every store
//!
//! Provides idempotent merge operations that can be safely replayed.

mod coordinator;
mod poller;
mod retry;
pub mod timing;

pub use coordinator::{SendOutcome, SyncCoordinator, SyncStats};
pub use poller::PollHandle;
pub use retry::{RetryOp, RetryQueue};
pub use timing::{cooldown_elapsed, within_window, Deadline};
