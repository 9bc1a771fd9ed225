//! AST Module - declarative pipeline input
//!
//! Contains parsed Rust types from YAML pipeline definitions:
//! - `pipeline`: Pipeline (schema, final task, default settings, tasks)
//! - `task`: TaskDefinition and the closed `TaskKind` variant set
//! - `context`: PipelineContext, the one-time history/actor/field bundle
//!
//! These types represent the "what" - immutable structure supplied once.
//! For runtime execution, see the `runtime` module.

mod context;
mod pipeline;
mod task;

// Re-export all public types
pub use context::{PipelineContext, Turn};
pub use pipeline::{Pipeline, SCHEMA_V01};
pub use task::{
    ComputationParams, DecisionParams, ExpansionConfig, FanoutParams, FunctionParams,
    GenerationSettings, IdList, TaskDefinition, TaskKind,
};
pub use task::source_task_ids;
