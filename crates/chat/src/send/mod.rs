//! Outgoing message pipeline: validate, rate-limit, send optimistically, reconcile

mod pipeline;
mod validate;

pub use pipeline::{
    degraded_warning, PreparedSend, Reconciliation, SendDraft, SendPipeline, SendRejection,
};
pub use validate::{
    contains_dangerous_pattern, sanitize_content, validate_message, validate_phone,
    MAX_MESSAGE_LENGTH,
};
