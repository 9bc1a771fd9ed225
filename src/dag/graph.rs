//! DependencyGraph - forward and reverse adjacency over live tasks
//!
//! Performance notes:
//! - Arc<str> ids shared with the live task table
//! - FxHashMap for faster hashing
//! - dependents kept in insertion order so readiness is deterministic
//!
//! Cycle detection (three-colour DFS) is advisory: the scheduler never
//! rejects a cyclic graph up front, the cycle surfaces as a stall.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::ast::{TaskDefinition, TaskKind};
use crate::error::WeftError;
use crate::util::intern;

use super::refs::extract_dependencies;

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Task ids in declaration, then registration, order
    order: Vec<Arc<str>>,
    /// task → what it waits on
    dependencies: FxHashMap<Arc<str>, Vec<Arc<str>>>,
    /// task → who waits on it
    dependents: FxHashMap<Arc<str>, Vec<Arc<str>>>,
}

impl DependencyGraph {
    /// Build from the enabled tasks of a pipeline
    pub fn build(tasks: &[Arc<TaskDefinition>]) -> Self {
        let known: FxHashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        let mut graph = Self::default();

        for task in tasks {
            let id = intern(&task.id);
            let deps = extract_dependencies(task, &known)
                .iter()
                .map(|d| intern(d))
                .collect();
            graph.order.push(Arc::clone(&id));
            graph.dependencies.insert(id, deps);
        }

        // Structural pass: branch targets wait on their decision
        for task in tasks {
            let TaskKind::Decision(decision) = &task.kind else {
                continue;
            };
            let decision_id = intern(&task.id);
            for target in decision.targets() {
                if let Some(deps) = graph.dependencies.get_mut(target) {
                    if !deps.contains(&decision_id) {
                        deps.push(Arc::clone(&decision_id));
                    }
                }
            }
        }

        graph.rebuild_dependents();
        graph
    }

    /// Invert the forward map
    fn rebuild_dependents(&mut self) {
        self.dependents.clear();
        for id in &self.order {
            for dep in &self.dependencies[id] {
                self.dependents
                    .entry(Arc::clone(dep))
                    .or_default()
                    .push(Arc::clone(id));
            }
        }
    }

    /// Grow the graph with a task registered at runtime
    pub fn add_task(&mut self, id: Arc<str>, deps: Vec<Arc<str>>) {
        for dep in &deps {
            self.dependents
                .entry(Arc::clone(dep))
                .or_default()
                .push(Arc::clone(&id));
        }
        self.order.push(Arc::clone(&id));
        self.dependencies.insert(id, deps);
    }

    #[inline]
    pub fn dependencies(&self, task_id: &str) -> &[Arc<str>] {
        self.dependencies.get(task_id).map_or(&[][..], Vec::as_slice)
    }

    #[inline]
    pub fn dependents(&self, task_id: &str) -> &[Arc<str>] {
        self.dependents.get(task_id).map_or(&[][..], Vec::as_slice)
    }

    pub fn contains(&self, task_id: &str) -> bool {
        self.dependencies.contains_key(task_id)
    }

    pub fn task_ids(&self) -> &[Arc<str>] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// `(task, dependency)` pairs naming a task that is not in the graph
    pub fn missing_dependencies(&self) -> Vec<(Arc<str>, Arc<str>)> {
        self.order
            .iter()
            .flat_map(|id| {
                self.dependencies(id)
                    .iter()
                    .filter(|dep| !self.contains(dep))
                    .map(move |dep| (Arc::clone(id), Arc::clone(dep)))
            })
            .collect()
    }

    /// Detect cycles using DFS with three-colour marking.
    ///
    /// - White: unvisited
    /// - Gray: on the current DFS stack
    /// - Black: fully processed
    ///
    /// Reaching a Gray node closes a cycle; its path is reported.
    pub fn detect_cycles(&self) -> Result<(), WeftError> {
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        fn dfs(
            node: &Arc<str>,
            graph: &DependencyGraph,
            colors: &mut FxHashMap<Arc<str>, Color>,
            stack: &mut Vec<Arc<str>>,
        ) -> Result<(), String> {
            colors.insert(Arc::clone(node), Color::Gray);
            stack.push(Arc::clone(node));

            for next in graph.dependents(node) {
                match colors.get(next).copied().unwrap_or(Color::White) {
                    Color::Gray => {
                        let start = stack.iter().position(|x| x == next).unwrap_or(0);
                        let cycle: Vec<&str> = stack[start..].iter().map(|s| s.as_ref()).collect();
                        return Err(format!("{} → {}", cycle.join(" → "), next));
                    }
                    Color::White => dfs(next, graph, colors, stack)?,
                    Color::Black => {}
                }
            }

            stack.pop();
            colors.insert(Arc::clone(node), Color::Black);
            Ok(())
        }

        let mut colors: FxHashMap<Arc<str>, Color> = FxHashMap::default();
        let mut stack = Vec::new();

        for id in &self.order {
            if colors.get(id).is_none() {
                dfs(id, self, &mut colors, &mut stack)
                    .map_err(|cycle| WeftError::CycleDetected { cycle })?;
            }
        }
        Ok(())
    }
}
