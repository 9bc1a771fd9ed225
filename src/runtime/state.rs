//! ExecutionContext - the scheduler-owned live tables
//!
//! - live task table (`id → LiveTask`), declaration then registration order
//! - state table (`id → TaskState`)
//! - dependency graph (forward + reverse)
//! - in-degree table, including the +1 per fan-out dependency
//! - fan-out children, outputs, and the raw context bundle
//!
//! Only the scheduler mutates this between batches. Handlers read it through
//! [`ContextView`](super::ContextView).

use std::sync::Arc;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::ast::{Pipeline, TaskDefinition};
use crate::dag::DependencyGraph;
use crate::store::OutputStore;
use crate::util::intern;

use super::registrar::Registration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        };
        f.write_str(s)
    }
}

/// A task in the live table
#[derive(Debug, Clone)]
pub struct LiveTask {
    pub id: Arc<str>,
    pub definition: Arc<TaskDefinition>,
    /// Per-item variables of a fan-out child
    pub injected: Option<Arc<Map<String, Value>>>,
    /// Fan-out that spawned this task
    pub parent: Option<Arc<str>>,
}

impl LiveTask {
    pub fn is_fanout(&self) -> bool {
        self.definition.is_fanout()
    }
}

#[derive(Debug)]
pub struct ExecutionContext {
    tasks: FxHashMap<Arc<str>, LiveTask>,
    states: FxHashMap<Arc<str>, TaskState>,
    graph: DependencyGraph,
    in_degree: FxHashMap<Arc<str>, usize>,
    children: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    outputs: OutputStore,
    context: Value,
    batches: Vec<Vec<Arc<str>>>,
}

impl ExecutionContext {
    /// Clone every enabled task into the live table, all `pending`
    pub fn new(pipeline: &Pipeline, context: Value) -> Self {
        let enabled: Vec<Arc<TaskDefinition>> = pipeline.enabled_tasks().cloned().collect();
        let graph = DependencyGraph::build(&enabled);

        let mut tasks = FxHashMap::default();
        let mut states = FxHashMap::default();
        for definition in enabled {
            let id = intern(&definition.id);
            states.insert(Arc::clone(&id), TaskState::Pending);
            tasks.insert(
                Arc::clone(&id),
                LiveTask {
                    id,
                    definition,
                    injected: None,
                    parent: None,
                },
            );
        }

        let in_degree = graph
            .task_ids()
            .iter()
            .map(|id| {
                let deps = graph.dependencies(id);
                let fanouts = deps
                    .iter()
                    .filter(|d| tasks.get(*d).is_some_and(LiveTask::is_fanout))
                    .count();
                (Arc::clone(id), deps.len() + fanouts)
            })
            .collect();

        Self {
            tasks,
            states,
            graph,
            in_degree,
            children: FxHashMap::default(),
            outputs: OutputStore::new(),
            context,
            batches: Vec::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&LiveTask> {
        self.tasks.get(id)
    }

    pub fn contains_task(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn state(&self, id: &str) -> Option<TaskState> {
        self.states.get(id).copied()
    }

    /// `(id, state)` for every live task, in live-table order
    pub fn states(&self) -> Vec<(Arc<str>, TaskState)> {
        self.graph
            .task_ids()
            .iter()
            .filter_map(|id| self.state(id).map(|s| (Arc::clone(id), s)))
            .collect()
    }

    pub fn ids_in_state(&self, state: TaskState) -> Vec<Arc<str>> {
        self.graph
            .task_ids()
            .iter()
            .filter(|id| self.state(id) == Some(state))
            .cloned()
            .collect()
    }

    pub fn in_degree(&self, id: &str) -> Option<usize> {
        self.in_degree.get(id).copied()
    }

    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    pub fn outputs(&self) -> &OutputStore {
        &self.outputs
    }

    pub fn context(&self) -> &Value {
        &self.context
    }

    /// Children spawned by a fan-out, in spawn order
    pub fn children(&self, fanout_id: &str) -> &[Arc<str>] {
        self.children.get(fanout_id).map_or(&[][..], Vec::as_slice)
    }

    /// Batches executed so far
    pub fn batches(&self) -> &[Vec<Arc<str>>] {
        &self.batches
    }

    /// Pending tasks with in-degree 0, in live-table order
    pub fn ready(&self) -> Vec<Arc<str>> {
        self.graph
            .task_ids()
            .iter()
            .filter(|id| self.state(id) == Some(TaskState::Pending) && self.in_degree(id) == Some(0))
            .cloned()
            .collect()
    }

    pub(crate) fn set_state(&mut self, id: &str, state: TaskState) {
        if let Some(current) = self.states.get_mut(id) {
            *current = state;
        }
    }

    pub(crate) fn record_output(&mut self, id: &Arc<str>, value: Value) -> Arc<Value> {
        self.outputs.insert(Arc::clone(id), value)
    }

    pub(crate) fn push_batch(&mut self, batch: Vec<Arc<str>>) {
        self.batches.push(batch);
    }

    /// Add a spawned child: `pending`, depends on its fan-out, in-degree 1
    pub(crate) fn register(&mut self, registration: Registration) -> Arc<str> {
        let Registration {
            parent,
            definition,
            injected,
        } = registration;
        let id = intern(&definition.id);

        self.graph
            .add_task(Arc::clone(&id), vec![Arc::clone(&parent)]);
        self.states.insert(Arc::clone(&id), TaskState::Pending);
        self.in_degree.insert(Arc::clone(&id), 1);
        self.children
            .entry(Arc::clone(&parent))
            .or_default()
            .push(Arc::clone(&id));
        self.tasks.insert(
            Arc::clone(&id),
            LiveTask {
                id: Arc::clone(&id),
                definition: Arc::new(definition),
                injected: Some(Arc::new(injected)),
                parent: Some(parent),
            },
        );
        id
    }

    /// Decrement a pending task's in-degree by `by`.
    ///
    /// Returns true when the task just became ready. Non-pending tasks are
    /// left untouched.
    pub(crate) fn release(&mut self, id: &str, by: usize) -> bool {
        if self.state(id) != Some(TaskState::Pending) {
            return false;
        }
        match self.in_degree.get_mut(id) {
            Some(degree) if *degree > 0 => {
                *degree = degree.saturating_sub(by);
                *degree == 0
            }
            _ => false,
        }
    }

    /// True when every child of the fan-out is terminal
    pub fn fanout_settled(&self, fanout_id: &str) -> bool {
        self.children(fanout_id)
            .iter()
            .all(|child| self.state(child).is_some_and(TaskState::is_terminal))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pipeline() -> Pipeline {
        Pipeline::new([
            TaskDefinition::computation("split", "list things"),
            TaskDefinition::fanout(
                "each",
                "outputs.split",
                TaskDefinition::computation("each", "{{item}}"),
            ),
            TaskDefinition::computation("sum", "{{outputs.each}}"),
            TaskDefinition::computation("off", "x").disabled(),
        ])
    }

    #[test]
    fn disabled_tasks_are_absent() {
        let ctx = ExecutionContext::new(&pipeline(), json!({}));
        assert!(ctx.contains_task("split"));
        assert!(!ctx.contains_task("off"));
        assert_eq!(ctx.state("off"), None);
    }

    #[test]
    fn fanout_dependency_counts_twice() {
        let ctx = ExecutionContext::new(&pipeline(), json!({}));
        assert_eq!(ctx.in_degree("split"), Some(0));
        assert_eq!(ctx.in_degree("each"), Some(1));
        assert_eq!(ctx.in_degree("sum"), Some(2));
        assert_eq!(ctx.ready().iter().map(|s| s.as_ref()).collect::<Vec<_>>(), vec!["split"]);
    }

    #[test]
    fn register_adds_pending_child() {
        let mut ctx = ExecutionContext::new(&pipeline(), json!({}));
        let mut injected = Map::new();
        injected.insert("item".into(), json!("a"));

        let id = ctx.register(Registration {
            parent: intern("each"),
            definition: TaskDefinition::computation("each_0", "{{item}}"),
            injected,
        });

        assert_eq!(&*id, "each_0");
        assert_eq!(ctx.state("each_0"), Some(TaskState::Pending));
        assert_eq!(ctx.in_degree("each_0"), Some(1));
        assert_eq!(ctx.children("each").len(), 1);
        assert!(ctx.graph().dependents("each").iter().any(|d| &**d == "each_0"));
        assert!(!ctx.fanout_settled("each"));
    }

    #[test]
    fn release_only_touches_pending() {
        let mut ctx = ExecutionContext::new(&pipeline(), json!({}));
        assert!(!ctx.release("sum", 1));
        assert!(ctx.release("sum", 1));

        ctx.set_state("each", TaskState::Skipped);
        assert!(!ctx.release("each", 1));
        assert_eq!(ctx.in_degree("each"), Some(1));
    }
}
