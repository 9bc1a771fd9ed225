//! DAG Module - dependency graph built from task references
//!
//! - `refs`: `outputs.<id>` token scanning and bare-reference heads
//! - `graph`: forward/reverse adjacency, growable at runtime, cycle report

mod graph;
mod refs;

pub use graph::DependencyGraph;
pub use refs::{extract_dependencies, output_refs, reference_head};
