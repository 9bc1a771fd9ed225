//! Utilities Module - shared infrastructure
//!
//! - `constants`: Centralized timeouts, limits and sentinels
//! - `interner`: String interning for task IDs (Arc<str> deduplication)
//! - `path`: Dot-path parsing and traversal over JSON values

pub mod constants;
mod interner;
pub mod path;

// Re-export public types
pub use constants::{
    CONNECT_TIMEOUT, DEFAULT_FANOUT_VAR, INFER_TIMEOUT, NO_OUTPUT_SENTINEL, OUTPUTS_NAMESPACE,
};
pub use interner::{intern, Interner};
