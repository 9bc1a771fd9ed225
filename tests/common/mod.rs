//! Shared helpers for integration tests

#![allow(dead_code)]

use std::sync::Arc;

use weft::{EventKind, MockProvider, Pipeline, Runner, TaskDefinition};

/// Runner over `tasks` with an echoing mock provider
pub fn echo_runner(tasks: Vec<TaskDefinition>) -> Runner {
    Runner::new(Pipeline::new(tasks)).with_provider(Arc::new(MockProvider::new()))
}

/// Runner over a YAML pipeline with the given mock provider
pub fn yaml_runner(yaml: &str, provider: MockProvider) -> Runner {
    let pipeline = Pipeline::from_yaml(yaml).expect("pipeline should parse");
    Runner::new(pipeline).with_provider(Arc::new(provider))
}

/// Batches as plain strings
pub fn batches(runner: &Runner) -> Vec<Vec<String>> {
    runner
        .batches()
        .iter()
        .map(|batch| batch.iter().map(|id| id.to_string()).collect())
        .collect()
}

/// Index of the batch that ran `task_id`
pub fn batch_of(runner: &Runner, task_id: &str) -> Option<usize> {
    runner
        .batches()
        .iter()
        .position(|batch| batch.iter().any(|id| &**id == task_id))
}

/// Number of `TaskCompleted` events for `task_id`
pub fn completions(runner: &Runner, task_id: &str) -> usize {
    runner.event_log().count(|kind| {
        matches!(kind, EventKind::TaskCompleted { task_id: id, .. } if &**id == task_id)
    })
}
