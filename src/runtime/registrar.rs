//! Registrar - the fan-out handler's registration port
//!
//! Handlers run against a shared borrow of the execution context, so a
//! fan-out cannot insert its children directly. It records them here; the
//! scheduler applies the registrations once the batch has settled. Ids are
//! made unique at registration time against both the live table and the
//! other registrations of the batch.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::ast::TaskDefinition;
use crate::util::intern;

use super::state::ExecutionContext;

/// A child task waiting to be added to the live table
#[derive(Debug, Clone)]
pub struct Registration {
    pub parent: Arc<str>,
    /// Definition with its final id and `depends_on = [parent]`
    pub definition: TaskDefinition,
    pub injected: Map<String, Value>,
}

pub struct Registrar<'a> {
    live: &'a ExecutionContext,
    pending: Mutex<Vec<Registration>>,
}

impl<'a> Registrar<'a> {
    pub fn new(live: &'a ExecutionContext) -> Self {
        Self {
            live,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Queue a clone of `template` as a child of `parent` and return its id.
    ///
    /// `base_id` gets `_1`, `_2`, ... appended until it is free.
    pub fn register(
        &self,
        parent: &str,
        base_id: &str,
        template: &TaskDefinition,
        injected: Map<String, Value>,
    ) -> Arc<str> {
        let mut pending = self.pending.lock();

        let taken = |candidate: &str| {
            self.live.contains_task(candidate)
                || pending.iter().any(|r| r.definition.id == candidate)
        };
        let mut id = base_id.to_string();
        let mut n = 1;
        while taken(&id) {
            id = format!("{base_id}_{n}");
            n += 1;
        }

        let mut definition = template.clone();
        definition.id = id;
        definition.enabled = true;
        definition.depends_on = vec![parent.to_string()];

        let assigned = intern(&definition.id);
        pending.push(Registration {
            parent: intern(parent),
            definition,
            injected,
        });
        assigned
    }

    /// Registrations in the order they were made
    pub fn into_registrations(self) -> Vec<Registration> {
        self.pending.into_inner()
    }
}
