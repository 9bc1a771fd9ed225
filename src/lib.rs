//! Weft - dynamic DAG scheduler for multi-step generation pipelines
//!
//! ## Module Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        DOMAIN MODEL                          │
//! │  ast/        YAML → Rust types (Pipeline, TaskDefinition)    │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                      APPLICATION LAYER                       │
//! │  runtime/    Batch scheduler + handlers (Runner, Executor)   │
//! │  dag/        Dependency graph (refs, DependencyGraph)        │
//! │  binding/    {{path}} templates over a layered Scope         │
//! │  functions/  Function registry + built-ins                   │
//! └──────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                    INFRASTRUCTURE LAYER                      │
//! │  store/      Task outputs (OutputStore)                      │
//! │  event/      Event sourcing (EventLog, EventKind)            │
//! │  provider/   Generation backends (mock, OpenAI-compatible)   │
//! │  expansion/  Content expansion (ContentExpander)             │
//! │  util/       Interner, dot paths, constants                  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module | Responsibility |
//! |--------|----------------|
//! | [`ast`] | YAML parsing → `Pipeline`, `TaskDefinition`, `PipelineContext` |
//! | [`runtime`] | Layered concurrent execution, fan-out growth, branch skipping |
//! | [`dag`] | `outputs.<id>` extraction, forward/reverse adjacency, cycle report |
//! | [`binding`] | Template resolution with empty-string misses |
//! | [`functions`] | `module::name` registry for `function` tasks |
//! | [`store`] | Recorded task outputs |
//! | [`event`] | Event sourcing for audit trail |
//! | [`provider`] | Generation backend abstraction |
//! | [`expansion`] | Keyword-activated content injection |
//! | [`util`] | String interning, dot paths |
//! | [`error`] | Error types with fix suggestions |
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use weft::{MockProvider, Pipeline, Runner, TaskDefinition};
//!
//! let pipeline = Pipeline::new([
//!     TaskDefinition::computation("greet", "Say hi to {{user}}"),
//! ]);
//! let mut runner = Runner::new(pipeline).with_provider(Arc::new(MockProvider::new()));
//! let output = runner.run().await?;
//! ```

// ═══════════════════════════════════════════════════════════════
// DOMAIN MODEL - YAML → Rust types
// ═══════════════════════════════════════════════════════════════
pub mod ast;

// ═══════════════════════════════════════════════════════════════
// APPLICATION LAYER - Execution logic
// ═══════════════════════════════════════════════════════════════
pub mod binding;
pub mod dag;
pub mod functions;
pub mod runtime;

// ═══════════════════════════════════════════════════════════════
// INFRASTRUCTURE LAYER - Storage, events, backends
// ═══════════════════════════════════════════════════════════════
pub mod event;
pub mod expansion;
pub mod provider;
pub mod store;
pub mod util;

// ═══════════════════════════════════════════════════════════════
// CROSS-CUTTING - Error handling, configuration
// ═══════════════════════════════════════════════════════════════
pub mod config;
pub mod error;

// ═══════════════════════════════════════════════════════════════
// PUBLIC API RE-EXPORTS
// ═══════════════════════════════════════════════════════════════

pub use error::{FixSuggestion, WeftError};

pub use config::{mask_api_key, WeftConfig};

pub use ast::{
    GenerationSettings, Pipeline, PipelineContext, TaskDefinition, TaskKind, Turn,
};

pub use runtime::{ContextView, ExecutionContext, Runner, TaskExecutor, TaskState};

pub use dag::DependencyGraph;

pub use binding::{render, Scope};

pub use functions::{FunctionReference, FunctionRegistry, PipelineFunction};

pub use event::{Event, EventKind, EventLog};

pub use store::OutputStore;

pub use provider::{create_provider, MockProvider, OpenAiProvider, Provider};

pub use expansion::{ContentExpander, KeywordExpander, NoopExpander};
