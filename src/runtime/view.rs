//! ContextView - read-only window handlers get onto the execution context

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::binding::Scope;
use crate::store::OutputStore;

use super::state::{ExecutionContext, LiveTask};

#[derive(Clone, Copy)]
pub struct ContextView<'a> {
    ctx: &'a ExecutionContext,
    task: &'a LiveTask,
}

impl<'a> ContextView<'a> {
    pub fn new(ctx: &'a ExecutionContext, task: &'a LiveTask) -> Self {
        Self { ctx, task }
    }

    /// Id of the task being executed
    pub fn task_id(&self) -> &Arc<str> {
        &self.task.id
    }

    pub fn task(&self) -> &'a LiveTask {
        self.task
    }

    /// Per-item variables if the task was spawned by a fan-out
    pub fn injected(&self) -> Option<&'a Map<String, Value>> {
        self.task.injected.as_deref()
    }

    /// Raw context bundle (history, actors, descriptive fields)
    pub fn context(&self) -> &'a Value {
        self.ctx.context()
    }

    pub fn outputs(&self) -> &'a OutputStore {
        self.ctx.outputs()
    }

    pub fn output(&self, task_id: &str) -> Option<&'a Value> {
        self.ctx.outputs().get(task_id).map(|v| &**v)
    }

    pub fn children(&self, fanout_id: &str) -> &'a [Arc<str>] {
        self.ctx.children(fanout_id)
    }

    /// Template scope: injected vars > context fields > outputs
    pub fn scope(&self) -> Scope<'a> {
        Scope::new(self.ctx.context(), self.ctx.outputs()).with_injected(self.injected())
    }
}

impl std::fmt::Debug for ContextView<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextView")
            .field("task_id", &self.task.id)
            .field("outputs", &self.ctx.outputs().len())
            .finish()
    }
}
