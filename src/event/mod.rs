//! Event Module - audit trail for pipeline execution
//!
//! - `Event`: Envelope with id + timestamp + kind
//! - `EventKind`: pipeline / batch / task / fine-grained variants
//! - `EventLog`: Thread-safe, append-only log

mod log;

pub use log::{Event, EventKind, EventLog};
