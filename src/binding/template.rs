//! Template Resolution - `{{path}}` substitution
//!
//! Single syntax: `{{path}}` with dot segments (`{{outputs.plan.steps.0}}`).
//! Resolution never fails: an undefined path renders as an empty string and
//! is reported back as a miss, except under `outputs.` where a missing value
//! (skipped branch, optional producer) is an expected case.
//!
//! Value rendering:
//! - string → verbatim
//! - number/bool → `to_string()`
//! - null/undefined → ""
//! - object/array → pretty JSON, or a `Name: content` transcript for
//!   history-shaped arrays when [`TextStyle::Transcript`] is requested

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::util::OUTPUTS_NAMESPACE;

use super::scope::Scope;

/// Pre-compiled regex for `{{path}}`
static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{\{\s*([^{}]*?)\s*\}\}").expect("valid token regex"));

/// How structured values turn into text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextStyle {
    #[default]
    Json,
    /// History-shaped arrays render turn by turn
    Transcript,
}

/// Result of rendering a template
#[derive(Debug, Clone, PartialEq)]
pub struct Rendered<'a> {
    pub text: Cow<'a, str>,
    /// Unresolved paths outside `outputs.`
    pub misses: Vec<String>,
}

/// Render with [`TextStyle::Json`]
pub fn render<'a>(template: &'a str, scope: &Scope<'_>) -> Rendered<'a> {
    render_with(template, scope, TextStyle::Json)
}

/// Resolve all `{{path}}` tokens in a single pass.
///
/// Returns `Cow::Borrowed` when the template has no tokens.
pub fn render_with<'a>(template: &'a str, scope: &Scope<'_>, style: TextStyle) -> Rendered<'a> {
    if !template.contains("{{") {
        return Rendered {
            text: Cow::Borrowed(template),
            misses: Vec::new(),
        };
    }

    let mut result = String::with_capacity(template.len() + 64);
    let mut misses = Vec::new();
    let mut last_end = 0;

    for cap in TOKEN_RE.captures_iter(template) {
        let Some(whole) = cap.get(0) else { continue };
        let path = cap.get(1).map_or("", |m| m.as_str());

        result.push_str(&template[last_end..whole.start()]);
        last_end = whole.end();

        match scope.lookup(path) {
            Some(value) => result.push_str(&value_to_text(&value, style)),
            None => {
                if !path.is_empty() && !is_outputs_path(path) {
                    misses.push(path.to_string());
                }
            }
        }
    }

    result.push_str(&template[last_end..]);

    Rendered {
        text: Cow::Owned(result),
        misses,
    }
}

fn is_outputs_path(path: &str) -> bool {
    path.strip_prefix(OUTPUTS_NAMESPACE)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
}

/// Resolve a reference to a JSON value instead of text.
///
/// Accepted forms:
/// - `{{path}}` alone → the value at `path` (lists stay lists)
/// - a template with surrounding text → rendered string
/// - a bare path (`outputs.x.items`, `history`) → the value at `path`
/// - a bare task id (`split`, `split.items`) → that task's output
///
/// Returns the value (or `None`) and the misses to report.
pub fn resolve_value(reference: &str, scope: &Scope<'_>) -> (Option<Value>, Vec<String>) {
    let reference = reference.trim();

    if let Some(cap) = TOKEN_RE.captures(reference) {
        let whole = cap.get(0).map_or(0..0, |m| m.range());
        if whole == (0..reference.len()) {
            let path = cap.get(1).map_or("", |m| m.as_str());
            return lookup_reference(path, scope);
        }
        let rendered = render(reference, scope);
        return (
            Some(Value::String(rendered.text.into_owned())),
            rendered.misses,
        );
    }

    lookup_reference(reference, scope)
}

fn lookup_reference(path: &str, scope: &Scope<'_>) -> (Option<Value>, Vec<String>) {
    if let Some(value) = scope.lookup(path) {
        return (Some(value), Vec::new());
    }

    // A bare task id is shorthand for `outputs.<id>`
    let head = path.split('.').next().unwrap_or_default();
    if scope.has_output(head) {
        return (scope.outputs().resolve_path(path), Vec::new());
    }

    if path.is_empty() || is_outputs_path(path) {
        (None, Vec::new())
    } else {
        (None, vec![path.to_string()])
    }
}

/// Convert a JSON value to template text
pub fn value_to_text(value: &Value, style: TextStyle) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => {
            if style == TextStyle::Transcript {
                if let Some(transcript) = as_transcript(other) {
                    return transcript;
                }
            }
            serde_json::to_string_pretty(other).unwrap_or_default()
        }
    }
}

/// `[{name, content}, ...]` → "Name: content" lines
fn as_transcript(value: &Value) -> Option<String> {
    let turns = value.as_array()?;
    if turns.is_empty() {
        return Some(String::new());
    }

    let mut lines = Vec::with_capacity(turns.len());
    for turn in turns {
        let content = turn.get("content")?.as_str()?;
        let speaker = turn
            .get("name")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .or_else(|| turn.get("role").and_then(Value::as_str))?;
        lines.push(format!("{speaker}: {content}"));
    }
    Some(lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::OutputStore;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Map};
    use std::sync::Arc;

    fn fixture() -> (Value, OutputStore) {
        let context = json!({
            "user": "Ana",
            "char": "Bot",
            "history": [
                {"name": "Ana", "content": "hi"},
                {"name": "Bot", "role": "assistant", "content": "hello"}
            ]
        });
        let mut outputs = OutputStore::new();
        outputs.insert(Arc::from("plan"), json!({"steps": ["a", "b"], "n": 2}));
        outputs.insert(Arc::from("text"), json!("plain"));
        (context, outputs)
    }

    #[test]
    fn no_tokens_returns_borrowed() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render("nothing to do", &scope);
        assert!(matches!(rendered.text, Cow::Borrowed("nothing to do")));
        assert!(rendered.misses.is_empty());
    }

    #[test]
    fn resolves_context_and_outputs() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render("{{user}} → {{ outputs.text }} ({{outputs.plan.n}})", &scope);
        assert_eq!(rendered.text, "Ana → plain (2)");
    }

    #[test]
    fn missing_output_is_empty_and_silent() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render("[{{outputs.missing}}]", &scope);
        assert_eq!(rendered.text, "[]");
        assert!(rendered.misses.is_empty());
    }

    #[test]
    fn missing_context_path_is_reported() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render("x{{persona.name}}y", &scope);
        assert_eq!(rendered.text, "xy");
        assert_eq!(rendered.misses, vec!["persona.name".to_string()]);
    }

    #[test]
    fn objects_render_as_pretty_json() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render("{{outputs.plan.steps}}", &scope);
        assert_eq!(rendered.text, "[\n  \"a\",\n  \"b\"\n]");
    }

    #[test]
    fn history_renders_as_transcript() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let rendered = render_with("{{history}}", &scope, TextStyle::Transcript);
        assert_eq!(rendered.text, "Ana: hi\nBot: hello");

        // Json style keeps the raw structure
        let raw = render("{{history}}", &scope);
        assert!(raw.text.contains("\"content\": \"hi\""));
    }

    #[test]
    fn null_renders_empty() {
        let ctx = json!({"gone": null});
        let outputs = OutputStore::new();
        let scope = Scope::new(&ctx, &outputs);

        assert_eq!(render("a{{gone}}b", &scope).text, "ab");
    }

    #[test]
    fn injected_item_renders() {
        let (ctx, outputs) = fixture();
        let mut injected = Map::new();
        injected.insert("item".into(), json!(7));
        let scope = Scope::new(&ctx, &outputs).with_injected(Some(&injected));

        assert_eq!(render("#{{item}}", &scope).text, "#7");
    }

    #[test]
    fn resolve_value_keeps_lists() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        assert_eq!(
            resolve_value("{{outputs.plan.steps}}", &scope).0,
            Some(json!(["a", "b"]))
        );
        assert_eq!(
            resolve_value("outputs.plan.steps", &scope).0,
            Some(json!(["a", "b"]))
        );
        // bare task id shorthand
        assert_eq!(resolve_value("plan.n", &scope).0, Some(json!(2)));
        // mixed text renders
        assert_eq!(
            resolve_value("n={{outputs.plan.n}}", &scope).0,
            Some(json!("n=2"))
        );
    }

    #[test]
    fn resolve_value_reports_only_non_output_misses() {
        let (ctx, outputs) = fixture();
        let scope = Scope::new(&ctx, &outputs);

        let (value, misses) = resolve_value("outputs.ghost", &scope);
        assert!(value.is_none());
        assert!(misses.is_empty());

        let (value, misses) = resolve_value("ghost_field", &scope);
        assert!(value.is_none());
        assert_eq!(misses, vec!["ghost_field".to_string()]);
    }
}
