//! Pipeline Runner - layered batch scheduler
//!
//! The scheduler is the single owner of the [`ExecutionContext`]. Each round:
//!
//! ```text
//! queue ──▶ batch (running) ──▶ join_all(handlers) ──▶ first error? abort
//!                                      │
//!                                      ▼
//!         record outputs · skip unchosen branches · add fan-out children
//!                                      │
//!                                      ▼
//!             release dependents · finalize settled fan-outs ──▶ queue
//! ```
//!
//! In-degree accounting: one unit per dependency, plus one extra unit per
//! fan-out dependency that is only released once all of its children are
//! terminal. Tasks still pending when the queue runs dry are reported as a
//! stall.

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde_json::{json, Value};
use tracing::{debug, info, instrument, warn};

use crate::ast::{Pipeline, PipelineContext};
use crate::config::WeftConfig;
use crate::error::WeftError;
use crate::event::{EventKind, EventLog};
use crate::expansion::ContentExpander;
use crate::functions::FunctionRegistry;
use crate::provider::Provider;
use crate::store::OutputStore;
use crate::util::NO_OUTPUT_SENTINEL;

use super::executor::{TaskExecutor, TaskOutcome};
use super::registrar::{Registrar, Registration};
use super::state::{ExecutionContext, TaskState};
use super::view::ContextView;

/// Pipeline runner with event sourcing
pub struct Runner {
    pipeline: Pipeline,
    context: PipelineContext,
    final_override: Option<String>,
    executor: TaskExecutor,
    event_log: EventLog,
    /// Live tables of the last run
    state: Option<ExecutionContext>,
}

impl Runner {
    pub fn new(pipeline: Pipeline) -> Self {
        Self::with_config(pipeline, WeftConfig::default())
    }

    pub fn with_config(pipeline: Pipeline, config: WeftConfig) -> Self {
        let event_log = EventLog::new();
        let mut executor = TaskExecutor::new(config, event_log.clone());
        executor.set_pipeline_settings(&pipeline.settings);

        Self {
            pipeline,
            context: PipelineContext::default(),
            final_override: None,
            executor,
            event_log,
            state: None,
        }
    }

    pub fn with_context(mut self, context: PipelineContext) -> Self {
        self.context = context;
        self
    }

    /// Register a provider instance; it also becomes the default provider
    /// when neither the pipeline nor the config names one
    pub fn with_provider(mut self, provider: Arc<dyn Provider>) -> Self {
        if self.executor.defaults().provider.is_none() {
            let mut settings = self.pipeline.settings.clone();
            settings.provider = Some(provider.name().to_string());
            self.executor.set_pipeline_settings(&settings);
        }
        self.executor.add_provider(provider);
        self
    }

    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.executor.set_functions(functions);
        self
    }

    pub fn with_expander(mut self, expander: Arc<dyn ContentExpander>) -> Self {
        self.executor.set_expander(expander);
        self
    }

    /// Read the result from `task_id` instead of the pipeline's final task
    pub fn with_final(mut self, task_id: impl Into<String>) -> Self {
        self.final_override = Some(task_id.into());
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Get the event log for inspection/export
    pub fn event_log(&self) -> &EventLog {
        &self.event_log
    }

    /// Live tables of the last run
    pub fn execution(&self) -> Option<&ExecutionContext> {
        self.state.as_ref()
    }

    pub fn outputs(&self) -> Option<&OutputStore> {
        self.state.as_ref().map(ExecutionContext::outputs)
    }

    pub fn state(&self, task_id: &str) -> Option<TaskState> {
        self.state.as_ref()?.state(task_id)
    }

    pub fn batches(&self) -> &[Vec<Arc<str>>] {
        self.state
            .as_ref()
            .map_or(&[][..], ExecutionContext::batches)
    }

    fn final_task_id(&self) -> Result<Option<String>, WeftError> {
        match &self.final_override {
            Some(id) => {
                let enabled = self.pipeline.enabled_tasks().any(|t| &t.id == id);
                if enabled {
                    Ok(Some(id.clone()))
                } else {
                    Err(WeftError::UnknownFinalTask {
                        task_id: id.clone(),
                    })
                }
            }
            None => Ok(self.pipeline.final_task_id().map(str::to_string)),
        }
    }

    /// Run the pipeline and return the final task's output
    #[instrument(skip(self), fields(tasks = self.pipeline.tasks.len()))]
    pub async fn run(&mut self) -> Result<Value, WeftError> {
        let started = Instant::now();
        let final_id = self.final_task_id()?;
        let mut ctx = ExecutionContext::new(&self.pipeline, self.context.to_value());

        info!(live_tasks = ctx.graph().len(), "Starting pipeline");
        self.event_log.emit(EventKind::PipelineStarted {
            run_id: format!("run-{}", uuid::Uuid::new_v4()),
            task_count: ctx.graph().len(),
            weft_version: env!("CARGO_PKG_VERSION").to_string(),
        });

        let outcome = self.schedule(&mut ctx).await;
        let batches = ctx.batches().len();
        let final_output = final_id
            .as_deref()
            .and_then(|id| ctx.outputs().get(id).cloned());
        self.state = Some(ctx);

        match outcome {
            Ok(()) => {
                let output = final_output
                    .unwrap_or_else(|| Arc::new(Value::String(NO_OUTPUT_SENTINEL.to_string())));
                let total_duration_ms = started.elapsed().as_millis() as u64;
                info!(batches, total_duration_ms, "Pipeline completed");
                self.event_log.emit(EventKind::PipelineCompleted {
                    final_output: Arc::clone(&output),
                    batches,
                    total_duration_ms,
                });
                Ok((*output).clone())
            }
            Err((failed_task, error)) => {
                warn!(error = %error, "Pipeline failed");
                self.event_log.emit(EventKind::PipelineFailed {
                    error: error.to_string(),
                    failed_task,
                });
                Err(error)
            }
        }
    }

    /// The batch loop; on error returns the failing task (if any) with it
    async fn schedule(
        &self,
        ctx: &mut ExecutionContext,
    ) -> Result<(), (Option<Arc<str>>, WeftError)> {
        let mut queue = ctx.ready();

        while !queue.is_empty() {
            let batch: Vec<Arc<str>> = std::mem::take(&mut queue)
                .into_iter()
                .filter(|id| ctx.state(id) == Some(TaskState::Pending))
                .collect();
            if batch.is_empty() {
                break;
            }

            let index = ctx.batches().len();
            debug!(index, tasks = batch.len(), "Starting batch");
            self.event_log.emit(EventKind::BatchStarted {
                index,
                tasks: batch.clone(),
            });
            for id in &batch {
                ctx.set_state(id, TaskState::Running);
            }
            ctx.push_batch(batch.clone());

            let (results, registrations) = self.execute_batch(ctx, &batch).await;

            // Any failure aborts the run; sibling results are discarded
            let mut outcomes = Vec::with_capacity(results.len());
            for (id, result, duration_ms) in results {
                match result {
                    Ok(outcome) => outcomes.push((id, outcome, duration_ms)),
                    Err(error) => {
                        ctx.set_state(&id, TaskState::Failed);
                        self.event_log.emit(EventKind::TaskFailed {
                            task_id: Arc::clone(&id),
                            error: error.to_string(),
                        });
                        let error = error.in_task(&id);
                        return Err((Some(id), error));
                    }
                }
            }

            let mut settled: Vec<Arc<str>> = Vec::new();
            let mut fanouts_ran: Vec<Arc<str>> = Vec::new();

            for (id, outcome, duration_ms) in outcomes {
                match outcome {
                    TaskOutcome::Value(value) => {
                        self.complete(ctx, &id, value, duration_ms);
                        settled.push(id);
                    }
                    TaskOutcome::Decided { chosen } => {
                        let targets: Vec<String> = ctx
                            .task(&id)
                            .map(|t| {
                                t.definition
                                    .branch_targets()
                                    .into_iter()
                                    .map(str::to_string)
                                    .collect()
                            })
                            .unwrap_or_default();
                        let output = json!({ "decision": chosen.as_deref() });
                        self.complete(ctx, &id, output, duration_ms);
                        settled.push(Arc::clone(&id));

                        for target in targets {
                            if chosen.as_deref() == Some(target.as_str())
                                || ctx.state(&target) != Some(TaskState::Pending)
                            {
                                continue;
                            }
                            let Some(target_id) = ctx.task(&target).map(|t| Arc::clone(&t.id))
                            else {
                                continue;
                            };
                            debug!(task_id = %target_id, decided_by = %id, "Branch skipped");
                            ctx.set_state(&target_id, TaskState::Skipped);
                            self.event_log.emit(EventKind::TaskSkipped {
                                task_id: Arc::clone(&target_id),
                                decided_by: Arc::clone(&id),
                            });
                            settled.push(target_id);
                        }
                    }
                    TaskOutcome::Spawned { children } => {
                        let list = children
                            .iter()
                            .map(|c| Value::String(c.to_string()))
                            .collect();
                        ctx.record_output(&id, Value::Array(list));
                        fanouts_ran.push(id);
                    }
                }
            }

            for registration in registrations {
                ctx.register(registration);
            }

            // Propagation
            for id in &settled {
                let release = match ctx.task(id) {
                    // a skipped fan-out never spawns: both units go at once
                    Some(t) if t.is_fanout() && ctx.state(id) == Some(TaskState::Skipped) => 2,
                    _ => 1,
                };
                release_dependents(ctx, id, release, false, &mut queue);
            }
            for id in &fanouts_ran {
                release_dependents(ctx, id, 1, false, &mut queue);
            }

            self.finalize_fanouts(ctx, &mut queue);
        }

        let pending = ctx.ids_in_state(TaskState::Pending);
        if pending.is_empty() {
            Ok(())
        } else {
            Err((
                None,
                WeftError::Stalled {
                    pending: pending.iter().map(|s| s.to_string()).collect(),
                },
            ))
        }
    }

    /// Run every task of the batch concurrently against a shared view
    async fn execute_batch(
        &self,
        ctx: &ExecutionContext,
        batch: &[Arc<str>],
    ) -> (
        Vec<(Arc<str>, Result<TaskOutcome, WeftError>, u64)>,
        Vec<Registration>,
    ) {
        let registrar = Registrar::new(ctx);

        let futures = batch.iter().filter_map(|id| ctx.task(id)).map(|task| {
            let view = ContextView::new(ctx, task);
            let registrar = &registrar;
            async move {
                let started = Instant::now();
                self.event_log.emit(EventKind::TaskStarted {
                    task_id: Arc::clone(&task.id),
                    task_type: task.definition.type_name().to_string(),
                });
                let result = self.executor.execute(&view, registrar).await;
                (
                    Arc::clone(&task.id),
                    result,
                    started.elapsed().as_millis() as u64,
                )
            }
        });
        let results = join_all(futures).await;

        (results, registrar.into_registrations())
    }

    fn complete(&self, ctx: &mut ExecutionContext, id: &Arc<str>, value: Value, duration_ms: u64) {
        let output = ctx.record_output(id, value);
        ctx.set_state(id, TaskState::Completed);
        self.event_log.emit(EventKind::TaskCompleted {
            task_id: Arc::clone(id),
            output,
            duration_ms,
        });
    }

    /// Complete every running fan-out whose children are all terminal,
    /// repeating until nothing changes (nested fan-outs settle outward)
    fn finalize_fanouts(&self, ctx: &mut ExecutionContext, queue: &mut Vec<Arc<str>>) {
        loop {
            let settled: Vec<Arc<str>> = ctx
                .ids_in_state(TaskState::Running)
                .into_iter()
                .filter(|id| ctx.task(id).is_some_and(|t| t.is_fanout()) && ctx.fanout_settled(id))
                .collect();
            if settled.is_empty() {
                return;
            }

            for id in settled {
                ctx.set_state(&id, TaskState::Completed);
                let children = ctx.children(&id).len();
                debug!(task_id = %id, children, "Fan-out finalized");

                let output = ctx
                    .outputs()
                    .get(&id)
                    .cloned()
                    .unwrap_or_else(|| Arc::new(Value::Array(Vec::new())));
                self.event_log.emit(EventKind::TaskCompleted {
                    task_id: Arc::clone(&id),
                    output,
                    duration_ms: 0,
                });
                self.event_log.emit(EventKind::FanoutFinalized {
                    task_id: Arc::clone(&id),
                    children,
                });

                release_dependents(ctx, &id, 1, true, queue);
            }
        }
    }
}

/// Release `by` units on each pending dependent of `id`, queueing those that
/// become ready. With `static_only`, the fan-out's own children are skipped.
fn release_dependents(
    ctx: &mut ExecutionContext,
    id: &Arc<str>,
    by: usize,
    static_only: bool,
    queue: &mut Vec<Arc<str>>,
) {
    let dependents: Vec<Arc<str>> = ctx
        .graph()
        .dependents(id)
        .iter()
        .filter(|d| !static_only || !ctx.children(id).contains(*d))
        .cloned()
        .collect();

    for dependent in dependents {
        if ctx.release(&dependent, by) {
            queue.push(dependent);
        }
    }
}
