//! Task Executor - the four task handlers
//!
//! Dispatch is a `match` over the closed [`TaskKind`] set. Handlers read the
//! execution context through a [`ContextView`] and report what happened as a
//! [`TaskOutcome`]; the scheduler applies outcomes after the batch settles.
//! Uses DashMap for lock-free provider caching.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::{Map, Value};
use tracing::{debug, instrument, warn};

use crate::ast::{
    ComputationParams, DecisionParams, ExpansionConfig, FanoutParams, FunctionParams,
    GenerationSettings, TaskKind,
};
use crate::binding::{render_with, resolve_value, value_to_text, Scope, TextStyle};
use crate::config::WeftConfig;
use crate::error::WeftError;
use crate::event::{EventKind, EventLog};
use crate::expansion::{ContentExpander, ExpansionRequest, ExpansionResult, NoopExpander};
use crate::functions::FunctionRegistry;
use crate::provider::{create_provider, Provider};
use crate::util::constants::DEFAULT_ROUTE;
use crate::util::{intern, DEFAULT_FANOUT_VAR};

use super::registrar::Registrar;
use super::view::ContextView;

/// What a handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome {
    /// Output to record (computation, function)
    Value(Value),
    /// Chosen branch target, if any route matched
    Decided { chosen: Option<Arc<str>> },
    /// Ids of the children queued through the registrar
    Spawned { children: Vec<Arc<str>> },
}

/// Task executor with cached providers, functions, expander and event logging
#[derive(Clone)]
pub struct TaskExecutor {
    /// Cached providers (lock-free)
    provider_cache: Arc<DashMap<String, Arc<dyn Provider>>>,
    functions: Arc<FunctionRegistry>,
    expander: Arc<dyn ContentExpander>,
    config: Arc<WeftConfig>,
    /// Pipeline settings over config defaults
    defaults: GenerationSettings,
    event_log: EventLog,
}

impl TaskExecutor {
    pub fn new(config: WeftConfig, event_log: EventLog) -> Self {
        let defaults = config.default_settings();
        Self {
            provider_cache: Arc::new(DashMap::new()),
            functions: Arc::new(FunctionRegistry::new()),
            expander: Arc::new(NoopExpander),
            config: Arc::new(config),
            defaults,
            event_log,
        }
    }

    /// Pre-register a provider instance under its own name
    pub fn add_provider(&self, provider: Arc<dyn Provider>) {
        self.provider_cache
            .insert(provider.name().to_ascii_lowercase(), provider);
    }

    pub fn set_functions(&mut self, functions: FunctionRegistry) {
        self.functions = Arc::new(functions);
    }

    pub fn set_expander(&mut self, expander: Arc<dyn ContentExpander>) {
        self.expander = expander;
    }

    /// Layer pipeline-level settings over the configuration defaults
    pub fn set_pipeline_settings(&mut self, settings: &GenerationSettings) {
        self.defaults = settings.or(&self.config.default_settings());
    }

    pub fn defaults(&self) -> &GenerationSettings {
        &self.defaults
    }

    pub fn config(&self) -> &WeftConfig {
        &self.config
    }

    /// Execute one task
    #[instrument(skip_all, fields(task_id = %view.task_id(), task_type = view.task().definition.type_name()))]
    pub async fn execute(
        &self,
        view: &ContextView<'_>,
        registrar: &Registrar<'_>,
    ) -> Result<TaskOutcome, WeftError> {
        debug!("Executing task");
        match &view.task().definition.kind {
            TaskKind::Computation(params) => self
                .run_computation(view, params)
                .await
                .map(TaskOutcome::Value),
            TaskKind::Function(params) => self
                .run_function(view, params)
                .await
                .map(TaskOutcome::Value),
            TaskKind::Decision(params) => Ok(self.run_decision(view, params)),
            TaskKind::Fanout(params) => Ok(self.run_fanout(view, params, registrar)),
        }
    }

    /// Get or create a cached provider (atomic via DashMap entry API)
    fn get_provider(&self, name: &str) -> Result<Arc<dyn Provider>, WeftError> {
        use dashmap::mapref::entry::Entry;

        match self.provider_cache.entry(name.to_ascii_lowercase()) {
            Entry::Occupied(e) => Ok(Arc::clone(e.get())),
            Entry::Vacant(e) => {
                let provider: Arc<dyn Provider> = Arc::from(create_provider(name, &self.config)?);
                e.insert(Arc::clone(&provider));
                Ok(provider)
            }
        }
    }

    fn report_misses(&self, task_id: &Arc<str>, misses: Vec<String>) {
        for path in misses {
            warn!(task_id = %task_id, path = %path, "Unresolved template reference");
            self.event_log.emit(EventKind::ReferenceMiss {
                task_id: Arc::clone(task_id),
                path,
            });
        }
    }

    fn render(&self, task_id: &Arc<str>, template: &str, scope: &Scope<'_>) -> String {
        let rendered = render_with(template, scope, TextStyle::Transcript);
        self.report_misses(task_id, rendered.misses);
        rendered.text.into_owned()
    }

    // ═══════════════════════════════════════════
    // COMPUTATION
    // ═══════════════════════════════════════════

    async fn run_computation(
        &self,
        view: &ContextView<'_>,
        params: &ComputationParams,
    ) -> Result<Value, WeftError> {
        let task_id = view.task_id();
        let mut scope = view.scope();

        let expansion = match params.expansion.as_ref().filter(|c| !c.is_empty()) {
            Some(config) => self.expand(task_id, config, &scope).await?,
            None => ExpansionResult::default(),
        };
        scope.set_local("expansion", expansion.to_scope_value());

        let prompt = self.render(task_id, &params.prompt, &scope);
        self.event_log.emit(EventKind::TemplateResolved {
            task_id: Arc::clone(task_id),
            template: params.prompt.clone(),
            result: prompt.clone(),
        });

        // Resolve settings: task > pipeline > config
        let mut settings = params.settings.or(&self.defaults);
        let provider_name = settings
            .provider
            .clone()
            .ok_or_else(|| WeftError::ConfigError {
                reason: "no provider configured (task settings, pipeline settings, WEFT_PROVIDER or --provider)"
                    .to_string(),
            })?;
        let provider = self.get_provider(&provider_name)?;
        let model = settings
            .model
            .get_or_insert_with(|| provider.default_model().to_string())
            .clone();

        self.event_log.emit(EventKind::ProviderCalled {
            task_id: Arc::clone(task_id),
            provider: provider_name.clone(),
            model,
            prompt_len: prompt.len(),
        });

        let text = provider
            .generate(&prompt, &settings)
            .await
            .map_err(|e| WeftError::Provider {
                provider: provider_name,
                message: format!("{e:#}"),
            })?;

        self.event_log.emit(EventKind::ProviderResponded {
            task_id: Arc::clone(task_id),
            output_len: text.len(),
        });

        Ok(Value::String(text))
    }

    async fn expand(
        &self,
        task_id: &Arc<str>,
        config: &ExpansionConfig,
        scope: &Scope<'_>,
    ) -> Result<ExpansionResult, WeftError> {
        let search_text = if config.scan.is_empty() {
            history_lines(scope)
        } else {
            config
                .scan
                .iter()
                .map(|template| self.render(task_id, template, scope))
                .collect()
        };

        let global_scan: BTreeMap<String, String> = config
            .global_scan
            .iter()
            .filter_map(|field| {
                let value = scope.lookup(field)?;
                Some((field.clone(), value_to_text(&value, TextStyle::Transcript)))
            })
            .collect();

        let result = self
            .expander
            .expand(ExpansionRequest {
                entry_sets: config.entry_sets.clone(),
                search_text,
                global_scan,
                budget: config.budget,
            })
            .await
            .map_err(|e| WeftError::ExpansionFailed {
                reason: format!("{e:#}"),
            })?;

        self.event_log.emit(EventKind::ExpansionApplied {
            task_id: Arc::clone(task_id),
            activated: result.activated_entries.len(),
            length: result.concatenated.len(),
        });
        Ok(result)
    }

    // ═══════════════════════════════════════════
    // FUNCTION
    // ═══════════════════════════════════════════

    async fn run_function(
        &self,
        view: &ContextView<'_>,
        params: &FunctionParams,
    ) -> Result<Value, WeftError> {
        let task_id = view.task_id();
        let scope = view.scope();
        let rendered = self.render_params(task_id, &params.params, &scope);

        self.event_log.emit(EventKind::FunctionCalled {
            task_id: Arc::clone(task_id),
            function: params.function.clone(),
        });

        self.functions.call(&params.function, view, rendered).await
    }

    /// Render every string leaf as a template
    fn render_params(&self, task_id: &Arc<str>, value: &Value, scope: &Scope<'_>) -> Value {
        match value {
            Value::String(s) => Value::String(self.render(task_id, s, scope)),
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|v| self.render_params(task_id, v, scope))
                    .collect(),
            ),
            Value::Object(map) => Value::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), self.render_params(task_id, v, scope)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }

    // ═══════════════════════════════════════════
    // DECISION
    // ═══════════════════════════════════════════

    fn run_decision(&self, view: &ContextView<'_>, params: &DecisionParams) -> TaskOutcome {
        let task_id = view.task_id();
        let (value, misses) = resolve_value(&params.condition, &view.scope());
        self.report_misses(task_id, misses);

        let condition = value
            .map(|v| value_to_text(&v, TextStyle::Json))
            .unwrap_or_default()
            .trim()
            .to_lowercase();

        let chosen = choose_route(&params.routes, &condition).map(intern);
        debug!(condition = %condition, chosen = ?chosen, "Decision made");

        self.event_log.emit(EventKind::DecisionMade {
            task_id: Arc::clone(task_id),
            condition,
            chosen: chosen.clone(),
        });
        TaskOutcome::Decided { chosen }
    }

    // ═══════════════════════════════════════════
    // FAN-OUT
    // ═══════════════════════════════════════════

    fn run_fanout(
        &self,
        view: &ContextView<'_>,
        params: &FanoutParams,
        registrar: &Registrar<'_>,
    ) -> TaskOutcome {
        let task_id = view.task_id();
        let (value, misses) = resolve_value(&params.input, &view.scope());
        self.report_misses(task_id, misses);

        let items = match value {
            Some(Value::Array(items)) => items,
            // Generated text often carries the list as JSON
            Some(Value::String(text)) => match serde_json::from_str(text.trim()) {
                Ok(Value::Array(items)) => items,
                _ => Vec::new(),
            },
            _ => Vec::new(),
        };
        if items.is_empty() {
            debug!("Fan-out input is empty or not a list");
        }

        let var_name = params.var_name.as_deref().unwrap_or(DEFAULT_FANOUT_VAR);
        let children = items
            .into_iter()
            .enumerate()
            .map(|(index, item)| {
                // Outer fan-out variables stay visible to nested children
                let mut injected: Map<String, Value> =
                    view.injected().cloned().unwrap_or_default();
                injected.insert(var_name.to_string(), item);
                injected.insert("index".to_string(), Value::from(index));

                let base_id = format!("{}_{}", params.child.id, index);
                registrar.register(task_id, &base_id, &params.child, injected)
            })
            .collect::<Vec<_>>();

        self.event_log.emit(EventKind::TasksSpawned {
            task_id: Arc::clone(task_id),
            children: children.clone(),
        });
        TaskOutcome::Spawned { children }
    }
}

/// Exact (case-insensitive) route key, else the `default` key
fn choose_route<'a>(routes: &'a BTreeMap<String, String>, condition: &str) -> Option<&'a str> {
    let lookup = |key: &str| {
        routes
            .iter()
            .find(|(k, _)| k.trim().to_lowercase() == key)
            .map(|(_, target)| target.as_str())
    };
    lookup(condition).or_else(|| lookup(DEFAULT_ROUTE))
}

/// History turns as `Name: content` lines (expansion search text)
fn history_lines(scope: &Scope<'_>) -> Vec<String> {
    let Some(Value::Array(turns)) = scope.lookup("history") else {
        return Vec::new();
    };
    turns
        .iter()
        .filter_map(|turn| {
            let content = turn.get("content")?.as_str()?;
            let name = turn.get("name").and_then(Value::as_str).unwrap_or_default();
            Some(if name.is_empty() {
                content.to_string()
            } else {
                format!("{name}: {content}")
            })
        })
        .collect()
}
