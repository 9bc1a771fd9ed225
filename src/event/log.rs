//! EventLog - append-only execution log
//!
//! - Event: envelope with id + timestamp + kind
//! - EventKind: pipeline, batch, task and fine-grained (template/provider) levels
//! - EventLog: thread-safe, cloneable handle shared by scheduler and handlers

use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Single event in the pipeline execution log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Monotonic sequence ID (for ordering)
    pub id: u64,
    /// Time since the log was created (ms)
    pub timestamp_ms: u64,
    pub kind: EventKind,
}

/// All possible event types
///
/// Uses Arc<str> for task_id fields to enable zero-cost cloning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    // ═══════════════════════════════════════════
    // PIPELINE LEVEL
    // ═══════════════════════════════════════════
    PipelineStarted {
        run_id: String,
        task_count: usize,
        weft_version: String,
    },
    PipelineCompleted {
        final_output: Arc<Value>,
        batches: usize,
        total_duration_ms: u64,
    },
    PipelineFailed {
        error: String,
        failed_task: Option<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // BATCH LEVEL
    // ═══════════════════════════════════════════
    BatchStarted {
        index: usize,
        tasks: Vec<Arc<str>>,
    },

    // ═══════════════════════════════════════════
    // TASK LEVEL
    // ═══════════════════════════════════════════
    TaskStarted {
        task_id: Arc<str>,
        task_type: String,
    },
    TaskCompleted {
        task_id: Arc<str>,
        output: Arc<Value>,
        duration_ms: u64,
    },
    TaskFailed {
        task_id: Arc<str>,
        error: String,
    },
    TaskSkipped {
        task_id: Arc<str>,
        /// Decision task whose choice excluded this branch
        decided_by: Arc<str>,
    },
    DecisionMade {
        task_id: Arc<str>,
        condition: String,
        chosen: Option<Arc<str>>,
    },
    TasksSpawned {
        task_id: Arc<str>,
        children: Vec<Arc<str>>,
    },
    FanoutFinalized {
        task_id: Arc<str>,
        children: usize,
    },

    // ═══════════════════════════════════════════
    // FINE-GRAINED (template/provider/function)
    // ═══════════════════════════════════════════
    TemplateResolved {
        task_id: Arc<str>,
        template: String,
        result: String,
    },
    /// A `{{path}}` outside `outputs.` did not resolve
    ReferenceMiss {
        task_id: Arc<str>,
        path: String,
    },
    ExpansionApplied {
        task_id: Arc<str>,
        activated: usize,
        length: usize,
    },
    ProviderCalled {
        task_id: Arc<str>,
        provider: String,
        model: String,
        prompt_len: usize,
    },
    ProviderResponded {
        task_id: Arc<str>,
        output_len: usize,
    },
    FunctionCalled {
        task_id: Arc<str>,
        function: String,
    },
}

impl EventKind {
    /// Extract task_id if event is task-related
    pub fn task_id(&self) -> Option<&str> {
        match self {
            Self::TaskStarted { task_id, .. }
            | Self::TaskCompleted { task_id, .. }
            | Self::TaskFailed { task_id, .. }
            | Self::TaskSkipped { task_id, .. }
            | Self::DecisionMade { task_id, .. }
            | Self::TasksSpawned { task_id, .. }
            | Self::FanoutFinalized { task_id, .. }
            | Self::TemplateResolved { task_id, .. }
            | Self::ReferenceMiss { task_id, .. }
            | Self::ExpansionApplied { task_id, .. }
            | Self::ProviderCalled { task_id, .. }
            | Self::ProviderResponded { task_id, .. }
            | Self::FunctionCalled { task_id, .. } => Some(task_id),
            Self::PipelineStarted { .. }
            | Self::PipelineCompleted { .. }
            | Self::PipelineFailed { .. }
            | Self::BatchStarted { .. } => None,
        }
    }

    pub fn is_pipeline_event(&self) -> bool {
        matches!(
            self,
            Self::PipelineStarted { .. }
                | Self::PipelineCompleted { .. }
                | Self::PipelineFailed { .. }
        )
    }
}

/// Append-only log shared by the scheduler and the handlers
///
/// Clones share storage. Ids are the position in the log, assigned under
/// the write lock, so they follow append order across concurrent emitters.
#[derive(Clone)]
pub struct EventLog {
    events: Arc<RwLock<Vec<Event>>>,
    origin: Instant,
}

impl EventLog {
    pub fn new() -> Self {
        Self {
            events: Arc::default(),
            origin: Instant::now(),
        }
    }

    /// Append an event and return its id
    pub fn emit(&self, kind: EventKind) -> u64 {
        let timestamp_ms = self.origin.elapsed().as_millis() as u64;
        let mut events = self.events.write();
        let id = events.len() as u64;
        events.push(Event {
            id,
            timestamp_ms,
            kind,
        });
        id
    }

    /// Snapshot of every event
    pub fn events(&self) -> Vec<Event> {
        self.events.read().clone()
    }

    /// Borrow the events under the read lock
    pub fn with_events<T>(&self, f: impl FnOnce(&[Event]) -> T) -> T {
        let events = self.events.read();
        f(events.as_slice())
    }

    /// Events that concern `task_id`
    pub fn filter_task(&self, task_id: &str) -> Vec<Event> {
        self.with_events(|events| {
            events
                .iter()
                .filter(|event| event.kind.task_id() == Some(task_id))
                .cloned()
                .collect()
        })
    }

    /// Id of the first event matching `pred`
    pub fn position(&self, pred: impl Fn(&EventKind) -> bool) -> Option<u64> {
        self.with_events(|events| {
            events
                .iter()
                .find(|event| pred(&event.kind))
                .map(|event| event.id)
        })
    }

    pub fn count(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.with_events(|events| events.iter().filter(|event| pred(&event.kind)).count())
    }

    /// The whole log as a JSON array
    pub fn to_json(&self) -> Value {
        self.with_events(|events| {
            Value::Array(
                events
                    .iter()
                    .filter_map(|event| serde_json::to_value(event).ok())
                    .collect(),
            )
        })
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }
}

impl Default for EventLog {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "EventLog({} events)", self.len())
    }
}
