//! Runtime Module - pipeline execution
//!
//! - `runner`: the layered batch scheduler (single owner of the live tables)
//! - `executor`: the four task handlers behind `match` dispatch
//! - `state`: ExecutionContext, TaskState, LiveTask
//! - `view`: read-only ContextView handed to handlers and functions
//! - `registrar`: fan-out child registration port

mod executor;
mod registrar;
mod runner;
mod state;
mod view;

pub use executor::{TaskExecutor, TaskOutcome};
pub use registrar::{Registrar, Registration};
pub use runner::Runner;
pub use state::{ExecutionContext, LiveTask, TaskState};
pub use view::ContextView;
