//! OutputStore - recorded task outputs
//!
//! Owned by the scheduler and mutated only between batches; handlers see it
//! through a shared borrow. Values are `Arc`-wrapped so events and the final
//! result can share them without deep copies.

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde_json::{Map, Value};

use crate::util::path;

#[derive(Debug, Clone, Default)]
pub struct OutputStore {
    values: FxHashMap<Arc<str>, Arc<Value>>,
}

impl OutputStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a task's output (a task records at most once per run)
    pub fn insert(&mut self, task_id: Arc<str>, value: Value) -> Arc<Value> {
        let value = Arc::new(value);
        self.values.insert(task_id, Arc::clone(&value));
        value
    }

    pub fn get(&self, task_id: &str) -> Option<&Arc<Value>> {
        self.values.get(task_id)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.values.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Resolve `task_id.field.0.sub` against the recorded outputs.
    ///
    /// A string output that holds JSON is traversed as JSON when the path
    /// goes below the task id (generated text is often a JSON document).
    pub fn resolve_path(&self, dotted: &str) -> Option<Value> {
        let (task_id, rest) = path::split_head(dotted);
        let output = self.get(task_id)?;

        let Some(rest) = rest else {
            return Some((**output).clone());
        };

        let segments = path::parse(rest)?;
        if let Some(found) = path::apply(output, &segments) {
            return Some(found.clone());
        }

        match &**output {
            Value::String(text) => {
                let parsed: Value = serde_json::from_str(text.trim()).ok()?;
                path::apply(&parsed, &segments).cloned()
            }
            _ => None,
        }
    }

    /// Snapshot as a JSON object (`{ id: value }`)
    pub fn to_value(&self) -> Value {
        let map: Map<String, Value> = self
            .values
            .iter()
            .map(|(k, v)| (k.to_string(), (**v).clone()))
            .collect();
        Value::Object(map)
    }
}
