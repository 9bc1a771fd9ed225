//! Centralized constants for Weft runtime configuration

use std::time::Duration;

// ═══════════════════════════════════════════════════════════════
// Backend Timeouts
// ═══════════════════════════════════════════════════════════════

/// Timeout for a single generation call
pub const INFER_TIMEOUT: Duration = Duration::from_secs(120);

/// Timeout for establishing HTTP connections
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

// ═══════════════════════════════════════════════════════════════
// Pipeline Conventions
// ═══════════════════════════════════════════════════════════════

/// Returned when the final task recorded no output (skipped, or never designated)
pub const NO_OUTPUT_SENTINEL: &str = "No output produced.";

/// Namespace under which task outputs are addressed in templates
pub const OUTPUTS_NAMESPACE: &str = "outputs";

/// Per-item variable name injected into fan-out children when `as` is absent
pub const DEFAULT_FANOUT_VAR: &str = "item";

/// Route key used when no declared route matches a decision
pub const DEFAULT_ROUTE: &str = "default";
