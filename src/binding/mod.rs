//! Binding Module - template and variable resolution
//!
//! - `scope`: layered lookup (injected params > context fields > outputs)
//! - `template`: `{{path}}` substitution with value-to-text rules
//!
//! Data flow:
//! ```text
//! fan-out item vars ─┐
//! context bundle ────┼─▶ Scope ──▶ render("…{{path}}…") ──▶ text + misses
//! outputs map ───────┘                 │
//!                                      └─▶ resolve_value("outputs.x") ──▶ Value
//! ```

mod scope;
mod template;

pub use scope::Scope;
pub use template::{render, render_with, resolve_value, value_to_text, Rendered, TextStyle};
