//! Scope - layered variable lookup
//!
//! Priority (highest first):
//! 1. per-instance injected params (fan-out item variables)
//! 2. handler locals (e.g. `expansion` inside a computation)
//! 3. raw context bundle fields (`user`, `char`, `history`, ...)
//! 4. the live outputs map, under `outputs.`

use serde_json::{Map, Value};

use crate::store::OutputStore;
use crate::util::path;
use crate::util::OUTPUTS_NAMESPACE;

#[derive(Debug, Clone)]
pub struct Scope<'a> {
    injected: Option<&'a Map<String, Value>>,
    locals: Map<String, Value>,
    context: &'a Value,
    outputs: &'a OutputStore,
}

impl<'a> Scope<'a> {
    pub fn new(context: &'a Value, outputs: &'a OutputStore) -> Self {
        Self {
            injected: None,
            locals: Map::new(),
            context,
            outputs,
        }
    }

    pub fn with_injected(mut self, injected: Option<&'a Map<String, Value>>) -> Self {
        self.injected = injected;
        self
    }

    pub fn set_local(&mut self, key: impl Into<String>, value: Value) {
        self.locals.insert(key.into(), value);
    }

    pub fn outputs(&self) -> &'a OutputStore {
        self.outputs
    }

    /// Resolve a dot path; `None` means undefined
    pub fn lookup(&self, dotted: &str) -> Option<Value> {
        let dotted = dotted.trim();
        if dotted.is_empty() {
            return None;
        }
        let (head, rest) = path::split_head(dotted);

        let layered = self
            .injected
            .and_then(|m| m.get(head))
            .or_else(|| self.locals.get(head))
            .or_else(|| self.context.get(head));

        if let Some(base) = layered {
            return match rest {
                None => Some(base.clone()),
                Some(rest) => path::apply(base, &path::parse(rest)?).cloned(),
            };
        }

        if head == OUTPUTS_NAMESPACE {
            return match rest {
                Some(rest) => self.outputs.resolve_path(rest),
                None => Some(self.outputs.to_value()),
            };
        }

        None
    }

    /// True if `task_id` has a recorded output
    pub fn has_output(&self, task_id: &str) -> bool {
        self.outputs.contains(task_id)
    }
}
