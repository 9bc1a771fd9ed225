//! Dot-path parsing and traversal
//!
//! Supports:
//! - `a.b.c` (dot notation)
//! - `a.0.b` and `a[0].b` (array index)
//!
//! Malformed paths never error: they simply resolve to nothing, which the
//! template layer renders as an empty string.

use serde_json::Value;

/// A parsed path segment
#[derive(Debug, Clone, PartialEq)]
pub enum Segment {
    /// Object field access: .field
    Field(String),
    /// Array index access: [0] or .0
    Index(usize),
}

/// Parse a dot path into segments. Returns `None` for malformed paths.
///
/// Examples:
/// - "summary.title" → [Field("summary"), Field("title")]
/// - "items[0].name" → [Field("items"), Index(0), Field("name")]
pub fn parse(path: &str) -> Option<Vec<Segment>> {
    let path = path.trim();
    if path.is_empty() {
        return Some(vec![]);
    }

    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            return None;
        }

        if let Some(bracket_pos) = part.find('[') {
            let field = &part[..bracket_pos];
            if !field.is_empty() {
                segments.push(Segment::Field(field.to_string()));
            }
            // one or more [n] suffixes
            let mut rest = &part[bracket_pos..];
            while let Some(stripped) = rest.strip_prefix('[') {
                let close = stripped.find(']')?;
                let index: usize = stripped[..close].trim().parse().ok()?;
                segments.push(Segment::Index(index));
                rest = &stripped[close + 1..];
            }
            if !rest.is_empty() {
                return None;
            }
        } else if let Ok(index) = part.parse::<usize>() {
            segments.push(Segment::Index(index));
        } else {
            segments.push(Segment::Field(part.to_string()));
        }
    }

    Some(segments)
}

/// Walk segments by reference
pub fn apply<'a>(value: &'a Value, segments: &[Segment]) -> Option<&'a Value> {
    let mut current = value;
    for segment in segments {
        current = match segment {
            Segment::Field(name) => current.get(name.as_str())?,
            Segment::Index(idx) => current.get(*idx)?,
        };
    }
    Some(current)
}

/// Split off the first dot segment: `"outputs.a.b"` → `("outputs", Some("a.b"))`
pub fn split_head(path: &str) -> (&str, Option<&str>) {
    match path.split_once('.') {
        Some((head, rest)) => (head, Some(rest)),
        None => (path, None),
    }
}
