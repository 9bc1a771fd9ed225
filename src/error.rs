// The #[error] attribute from thiserror uses struct fields via string interpolation,
// but Rust's unused_assignments lint doesn't recognize this.
#![allow(unused_assignments)]

//! Weft Error Types with Error Codes
//!
//! Error code ranges:
//! - WEFT-000-009: Pipeline file errors
//! - WEFT-010-019: Definition errors
//! - WEFT-020-029: Scheduling errors
//! - WEFT-030-039: Handler errors
//! - WEFT-040-049: Provider errors
//! - WEFT-050-059: Config/IO errors
//!
//! Template reference misses are deliberately absent: they resolve to an
//! empty string and are only reported as diagnostics.

use miette::Diagnostic;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeftError>;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

#[derive(Error, Debug, Diagnostic)]
pub enum WeftError {
    // ═══════════════════════════════════════════
    // PIPELINE FILE ERRORS (000-009)
    // ═══════════════════════════════════════════
    #[error("[WEFT-001] Failed to parse pipeline: {details}")]
    #[diagnostic(
        code(weft::parse_error),
        help("Check YAML syntax: indentation and quoting")
    )]
    ParseError { details: String },

    #[error("[WEFT-002] Invalid schema version: expected '{expected}', got '{actual}'")]
    #[diagnostic(code(weft::invalid_schema))]
    InvalidSchema { expected: String, actual: String },

    #[error("[WEFT-003] Pipeline file not found: {path}")]
    #[diagnostic(code(weft::pipeline_not_found))]
    PipelineNotFound { path: String },

    // ═══════════════════════════════════════════
    // DEFINITION ERRORS (010-019)
    // ═══════════════════════════════════════════
    #[error("[WEFT-010] Duplicate task id '{task_id}'")]
    #[diagnostic(code(weft::duplicate_task))]
    DuplicateTaskId { task_id: String },

    #[error("[WEFT-011] Task '{task_id}' has unknown type '{task_type}'")]
    #[diagnostic(code(weft::unknown_task_type))]
    UnknownTaskType { task_id: String, task_type: String },

    #[error("[WEFT-012] Task '{task_id}' is malformed: {reason}")]
    #[diagnostic(code(weft::invalid_task))]
    InvalidTask { task_id: String, reason: String },

    #[error("[WEFT-013] Final task '{task_id}' is not an enabled task")]
    #[diagnostic(code(weft::unknown_final_task))]
    UnknownFinalTask { task_id: String },

    // ═══════════════════════════════════════════
    // SCHEDULING ERRORS (020-029)
    // ═══════════════════════════════════════════
    #[error("[WEFT-020] Cycle detected in pipeline graph: {cycle}")]
    #[diagnostic(code(weft::cycle_detected))]
    CycleDetected { cycle: String },

    #[error("[WEFT-021] Pipeline stalled: {} task(s) never executed: {}", .pending.len(), .pending.join(", "))]
    #[diagnostic(code(weft::stalled))]
    Stalled { pending: Vec<String> },

    // ═══════════════════════════════════════════
    // HANDLER ERRORS (030-039)
    // ═══════════════════════════════════════════
    #[error("[WEFT-030] Task '{task_id}' failed: {reason}")]
    #[diagnostic(code(weft::task_failed))]
    TaskFailed { task_id: String, reason: String },

    #[error("[WEFT-031] Unknown function '{name}'")]
    #[diagnostic(code(weft::unknown_function))]
    UnknownFunction { name: String },

    #[error("[WEFT-032] Invalid function reference '{reference}': {reason}")]
    #[diagnostic(code(weft::invalid_function_reference))]
    InvalidFunctionReference { reference: String, reason: String },

    #[error("[WEFT-033] Function '{name}' failed: {reason}")]
    #[diagnostic(code(weft::function_failed))]
    FunctionFailed { name: String, reason: String },

    #[error("[WEFT-034] Content expansion failed: {reason}")]
    #[diagnostic(code(weft::expansion_failed))]
    ExpansionFailed { reason: String },

    // ═══════════════════════════════════════════
    // PROVIDER ERRORS (040-049)
    // ═══════════════════════════════════════════
    #[error("[WEFT-040] Unknown provider '{name}'")]
    #[diagnostic(code(weft::unknown_provider))]
    UnknownProvider { name: String },

    #[error("[WEFT-041] Provider '{provider}' error: {message}")]
    #[diagnostic(code(weft::provider_error))]
    Provider { provider: String, message: String },

    #[error("[WEFT-042] Missing API key for provider '{provider}'")]
    #[diagnostic(code(weft::missing_api_key))]
    MissingApiKey { provider: String },

    // ═══════════════════════════════════════════
    // CONFIG / IO ERRORS (050-059)
    // ═══════════════════════════════════════════
    #[error("[WEFT-050] Configuration error: {reason}")]
    #[diagnostic(code(weft::config_error))]
    ConfigError { reason: String },

    #[error("[WEFT-051] IO error: {0}")]
    #[diagnostic(code(weft::io_error))]
    Io(#[from] std::io::Error),

    #[error("[WEFT-052] JSON error: {0}")]
    #[diagnostic(code(weft::json_error))]
    Json(#[from] serde_json::Error),
}

impl From<serde_yaml::Error> for WeftError {
    fn from(e: serde_yaml::Error) -> Self {
        WeftError::ParseError {
            details: e.to_string(),
        }
    }
}

impl WeftError {
    /// Short machine-friendly code, e.g. `WEFT-021`
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParseError { .. } => "WEFT-001",
            Self::InvalidSchema { .. } => "WEFT-002",
            Self::PipelineNotFound { .. } => "WEFT-003",
            Self::DuplicateTaskId { .. } => "WEFT-010",
            Self::UnknownTaskType { .. } => "WEFT-011",
            Self::InvalidTask { .. } => "WEFT-012",
            Self::UnknownFinalTask { .. } => "WEFT-013",
            Self::CycleDetected { .. } => "WEFT-020",
            Self::Stalled { .. } => "WEFT-021",
            Self::TaskFailed { .. } => "WEFT-030",
            Self::UnknownFunction { .. } => "WEFT-031",
            Self::InvalidFunctionReference { .. } => "WEFT-032",
            Self::FunctionFailed { .. } => "WEFT-033",
            Self::ExpansionFailed { .. } => "WEFT-034",
            Self::UnknownProvider { .. } => "WEFT-040",
            Self::Provider { .. } => "WEFT-041",
            Self::MissingApiKey { .. } => "WEFT-042",
            Self::ConfigError { .. } => "WEFT-050",
            Self::Io(_) => "WEFT-051",
            Self::Json(_) => "WEFT-052",
        }
    }

    /// Wrap a handler error with the identity of the failing task.
    ///
    /// Errors that already carry a task id are returned unchanged.
    pub fn in_task(self, task_id: &str) -> Self {
        match self {
            e @ Self::TaskFailed { .. } => e,
            other => Self::TaskFailed {
                task_id: task_id.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl FixSuggestion for WeftError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            WeftError::ParseError { .. } => Some("Check YAML syntax: indentation and quoting"),
            WeftError::InvalidSchema { .. } => Some("Use 'weft/pipeline@0.1' as the schema"),
            WeftError::PipelineNotFound { .. } => Some("Check the file path exists"),
            WeftError::DuplicateTaskId { .. } => Some("Give every task a unique id"),
            WeftError::UnknownTaskType { .. } => {
                Some("Use one of: computation, function, decision, fanout")
            }
            WeftError::InvalidTask { .. } => Some("Check the fields required by the task type"),
            WeftError::UnknownFinalTask { .. } => {
                Some("Point 'final' at an enabled task id, or omit it")
            }
            WeftError::CycleDetected { .. } => {
                Some("Remove the circular reference between the listed tasks")
            }
            WeftError::Stalled { .. } => Some(
                "Look for a dependency cycle, a self reference, or depends_on naming a missing/disabled task",
            ),
            WeftError::TaskFailed { .. } => Some("Inspect the failing task's backend or function"),
            WeftError::UnknownFunction { .. } => {
                Some("Register the function before running, or fix its name")
            }
            WeftError::InvalidFunctionReference { .. } => Some("Use the 'module::name' format"),
            WeftError::FunctionFailed { .. } => Some("Check the function params"),
            WeftError::ExpansionFailed { .. } => Some("Check the expansion entry sets"),
            WeftError::UnknownProvider { .. } => Some("Available providers: mock, openai"),
            WeftError::Provider { .. } => Some("Check the backend is reachable and the model exists"),
            WeftError::MissingApiKey { .. } => {
                Some("Set OPENAI_API_KEY or add it to ~/.config/weft/config.toml")
            }
            WeftError::ConfigError { .. } => Some("Check ~/.config/weft/config.toml syntax"),
            WeftError::Io(_) => Some("Check file path and permissions"),
            WeftError::Json(_) => Some("Check the JSON document is valid"),
        }
    }
}
