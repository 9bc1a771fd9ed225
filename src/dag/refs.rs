//! Reference extraction
//!
//! A task depends on another when any of its text fields mentions
//! `outputs.<id>`. Fan-out inputs and decision conditions may also name a
//! task directly (`split` or `split.items`).

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashSet;
use serde_json::Value;

use crate::ast::{TaskDefinition, TaskKind};
use crate::util::OUTPUTS_NAMESPACE;

/// `outputs.<id>` not preceded by an identifier character
static OUTPUT_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:^|[^A-Za-z0-9_])outputs\.([A-Za-z0-9_\-]+)").expect("valid outputs regex")
});

/// Task ids referenced as `outputs.<id>` in `text`, in order of appearance
pub fn output_refs(text: &str) -> impl Iterator<Item = &str> {
    OUTPUT_REF_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str()))
}

/// First path segment of a bare reference (`split.items` → `split`).
///
/// A single `{{path}}` token is unwrapped first. Returns `None` for mixed
/// templates and for `outputs.` paths, which [`output_refs`] already covers.
pub fn reference_head(reference: &str) -> Option<&str> {
    let mut reference = reference.trim();
    if let Some(inner) = reference
        .strip_prefix("{{")
        .and_then(|r| r.strip_suffix("}}"))
    {
        reference = inner.trim();
    }
    if reference.is_empty() || reference.contains("{{") || reference.contains(char::is_whitespace) {
        return None;
    }

    let head = reference
        .split(['.', '['])
        .next()
        .filter(|h| !h.is_empty())?;
    if head == OUTPUTS_NAMESPACE {
        None
    } else {
        Some(head)
    }
}

fn value_refs<'a>(value: &'a Value, out: &mut Vec<&'a str>) {
    match value {
        Value::String(s) => out.extend(output_refs(s)),
        Value::Array(items) => items.iter().for_each(|v| value_refs(v, out)),
        Value::Object(map) => map.values().for_each(|v| value_refs(v, out)),
        _ => {}
    }
}

/// Ids mentioned by a definition's text fields (recursing into fan-out children).
///
/// A child template may mention its own fan-out: children only run after the
/// fan-out has recorded its output, so that id is not a dependency of the fan-out.
fn textual_refs<'a>(task: &'a TaskDefinition, out: &mut Vec<&'a str>) {
    match &task.kind {
        TaskKind::Computation(c) => {
            out.extend(output_refs(&c.prompt));
            if let Some(expansion) = &c.expansion {
                for scan in &expansion.scan {
                    out.extend(output_refs(scan));
                }
            }
        }
        TaskKind::Function(f) => value_refs(&f.params, out),
        TaskKind::Decision(d) => out.extend(output_refs(&d.condition)),
        TaskKind::Fanout(f) => {
            out.extend(output_refs(&f.input));
            let mut child_refs = Vec::new();
            textual_refs(&f.child, &mut child_refs);
            out.extend(child_refs.into_iter().filter(|id| *id != task.id));
        }
    }
}

/// All dependencies of `task` given the set of live task ids.
///
/// Textual and structural references are kept only when they name a live
/// task. Explicit `depends_on` entries are kept unconditionally. The result
/// is deduplicated in first-seen order and may contain the task itself.
pub fn extract_dependencies(task: &TaskDefinition, known: &FxHashSet<&str>) -> Vec<String> {
    let mut found: Vec<&str> = Vec::new();
    textual_refs(task, &mut found);

    match &task.kind {
        TaskKind::Function(f) => found.extend(f.source_tasks()),
        TaskKind::Decision(d) => found.extend(reference_head(&d.condition)),
        TaskKind::Fanout(f) => found.extend(reference_head(&f.input)),
        TaskKind::Computation(_) => {}
    }

    let mut deps: Vec<String> = Vec::new();
    for id in found {
        if known.contains(id) && !deps.iter().any(|d| d == id) {
            deps.push(id.to_string());
        }
    }
    for id in &task.depends_on {
        if !deps.contains(id) {
            deps.push(id.clone());
        }
    }
    deps
}
