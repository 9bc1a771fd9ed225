//! Task Definitions - the 4 task types
//!
//! ```yaml
//! - id: summarize
//!   type: computation
//!   prompt: "Summarize: {{history}}"
//!
//! - id: route
//!   type: decision
//!   condition: "{{outputs.classify}}"
//!   routes: { question: answer, default: chat }
//!
//! - id: per_topic
//!   type: fanout
//!   input: outputs.topics
//!   as: topic
//!   child:
//!     id: expand
//!     type: computation
//!     prompt: "Expand on {{topic}}"
//! ```
//!
//! `type` is parsed as a plain string and mapped onto the closed [`TaskKind`]
//! enum afterwards, so an unknown type surfaces as `UnknownTaskType` rather
//! than a generic YAML error.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WeftError;

/// Generation backend settings for a computation task
///
/// Every field is optional; unset fields fall back to the pipeline defaults
/// and then to the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationSettings {
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

impl GenerationSettings {
    /// Fill unset fields from `fallback` (self wins)
    pub fn or(&self, fallback: &GenerationSettings) -> GenerationSettings {
        GenerationSettings {
            provider: self.provider.clone().or_else(|| fallback.provider.clone()),
            model: self.model.clone().or_else(|| fallback.model.clone()),
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
        }
    }
}

/// Content expansion ("world info") configuration for a computation task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionConfig {
    /// Entry sets to activate against
    #[serde(default)]
    pub entry_sets: Vec<String>,
    /// Templates rendered into the search text (defaults to the history)
    #[serde(default)]
    pub scan: Vec<String>,
    /// Context fields scanned globally (e.g. `description`)
    #[serde(default)]
    pub global_scan: Vec<String>,
    /// Budget or max length handed to the expander
    #[serde(default)]
    pub budget: Option<usize>,
}

impl ExpansionConfig {
    pub fn is_empty(&self) -> bool {
        self.entry_sets.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComputationParams {
    pub prompt: String,
    #[serde(default)]
    pub settings: GenerationSettings,
    #[serde(default)]
    pub expansion: Option<ExpansionConfig>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FunctionParams {
    /// Registry name, `module::name`
    pub function: String,
    #[serde(default)]
    pub params: Value,
}

impl FunctionParams {
    /// Explicit source-task fields, see [`source_task_ids`]
    pub fn source_tasks(&self) -> Vec<&str> {
        source_task_ids(&self.params)
    }
}

/// Ids named by `source_task` (single id) and `source_tasks` (id or list)
pub fn source_task_ids(params: &Value) -> Vec<&str> {
    let mut ids = Vec::new();
    if let Some(id) = params.get("source_task").and_then(Value::as_str) {
        ids.push(id);
    }
    match params.get("source_tasks") {
        Some(Value::Array(items)) => ids.extend(items.iter().filter_map(Value::as_str)),
        Some(Value::String(id)) => ids.push(id.as_str()),
        _ => {}
    }
    ids
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecisionParams {
    /// Template or bare reference producing the route key
    pub condition: String,
    /// Route key → target task id (`default` is the fallback key)
    pub routes: BTreeMap<String, String>,
}

impl DecisionParams {
    /// All declared branch targets (deduplicated, sorted)
    pub fn targets(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = self.routes.values().map(String::as_str).collect();
        targets.sort_unstable();
        targets.dedup();
        targets
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FanoutParams {
    /// Reference to the input list (`outputs.<id>...`, bare task id, or context path)
    pub input: String,
    /// Template cloned once per item
    pub child: Box<TaskDefinition>,
    /// Per-item variable name (`as:` in YAML)
    pub var_name: Option<String>,
}

/// The 4 task types (closed set, dispatched with `match`)
#[derive(Debug, Clone, PartialEq)]
pub enum TaskKind {
    Computation(ComputationParams),
    Function(FunctionParams),
    Decision(DecisionParams),
    Fanout(FanoutParams),
}

impl TaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            TaskKind::Computation(_) => "computation",
            TaskKind::Function(_) => "function",
            TaskKind::Decision(_) => "decision",
            TaskKind::Fanout(_) => "fanout",
        }
    }
}

/// One id or a list of ids
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum IdList {
    Single(String),
    Many(Vec<String>),
}

impl IdList {
    pub fn into_vec(self) -> Vec<String> {
        match self {
            IdList::Single(id) => vec![id],
            IdList::Many(ids) => ids,
        }
    }
}

/// A single unit of pipeline work
#[derive(Debug, Clone, PartialEq)]
pub struct TaskDefinition {
    pub id: String,
    pub enabled: bool,
    /// Explicit dependencies (kept even if unknown, so they surface as a stall)
    pub depends_on: Vec<String>,
    pub kind: TaskKind,
}

/// Raw YAML shape before `type` is mapped onto [`TaskKind`]
#[derive(Debug, Deserialize)]
pub(crate) struct TaskDefinitionRaw {
    /// Optional only for fan-out child templates
    #[serde(default)]
    id: Option<String>,
    #[serde(rename = "type")]
    task_type: String,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    depends_on: Option<IdList>,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct FanoutParamsRaw {
    input: String,
    child: TaskDefinitionRaw,
    #[serde(default, rename = "as")]
    var_name: Option<String>,
}

fn default_enabled() -> bool {
    true
}

impl TaskDefinitionRaw {
    /// Convert into a definition; `fallback_id` is used when `id` is absent
    pub(crate) fn into_definition(self, fallback_id: Option<&str>) -> Result<TaskDefinition, WeftError> {
        let id = match (self.id, fallback_id) {
            (Some(id), _) => id,
            (None, Some(fallback)) => fallback.to_string(),
            (None, None) => {
                return Err(WeftError::ParseError {
                    details: format!("task of type '{}' is missing an id", self.task_type),
                })
            }
        };

        let fields = Value::Object(self.fields);
        let invalid = |e: serde_json::Error| WeftError::InvalidTask {
            task_id: id.clone(),
            reason: e.to_string(),
        };

        let kind = match self.task_type.trim().to_ascii_lowercase().as_str() {
            "computation" => TaskKind::Computation(serde_json::from_value(fields).map_err(invalid)?),
            "function" => TaskKind::Function(serde_json::from_value(fields).map_err(invalid)?),
            "decision" => TaskKind::Decision(serde_json::from_value(fields).map_err(invalid)?),
            "fanout" | "fan-out" | "fan_out" => {
                let raw: FanoutParamsRaw = serde_json::from_value(fields).map_err(invalid)?;
                // Children are named after their template; default to the fan-out id
                let child = raw.child.into_definition(Some(&id))?;
                TaskKind::Fanout(FanoutParams {
                    input: raw.input,
                    child: Box::new(child),
                    var_name: raw.var_name,
                })
            }
            _ => {
                return Err(WeftError::UnknownTaskType {
                    task_id: id.clone(),
                    task_type: self.task_type,
                })
            }
        };

        Ok(TaskDefinition {
            id,
            enabled: self.enabled,
            depends_on: self.depends_on.map(IdList::into_vec).unwrap_or_default(),
            kind,
        })
    }
}

impl TaskDefinition {
    fn with_kind(id: impl Into<String>, kind: TaskKind) -> Self {
        Self {
            id: id.into(),
            enabled: true,
            depends_on: Vec::new(),
            kind,
        }
    }

    pub fn computation(id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self::with_kind(
            id,
            TaskKind::Computation(ComputationParams {
                prompt: prompt.into(),
                settings: GenerationSettings::default(),
                expansion: None,
            }),
        )
    }

    pub fn function(id: impl Into<String>, function: impl Into<String>, params: Value) -> Self {
        Self::with_kind(
            id,
            TaskKind::Function(FunctionParams {
                function: function.into(),
                params,
            }),
        )
    }

    pub fn decision<K, V>(
        id: impl Into<String>,
        condition: impl Into<String>,
        routes: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self::with_kind(
            id,
            TaskKind::Decision(DecisionParams {
                condition: condition.into(),
                routes: routes
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            }),
        )
    }

    pub fn fanout(id: impl Into<String>, input: impl Into<String>, child: TaskDefinition) -> Self {
        Self::with_kind(
            id,
            TaskKind::Fanout(FanoutParams {
                input: input.into(),
                child: Box::new(child),
                var_name: None,
            }),
        )
    }

    /// Set the per-item variable name (fan-out only)
    pub fn with_var(mut self, name: impl Into<String>) -> Self {
        if let TaskKind::Fanout(params) = &mut self.kind {
            params.var_name = Some(name.into());
        }
        self
    }

    /// Set generation settings (computation only)
    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        if let TaskKind::Computation(params) = &mut self.kind {
            params.settings = settings;
        }
        self
    }

    /// Set content expansion (computation only)
    pub fn with_expansion(mut self, expansion: ExpansionConfig) -> Self {
        if let TaskKind::Computation(params) = &mut self.kind {
            params.expansion = Some(expansion);
        }
        self
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn type_name(&self) -> &'static str {
        self.kind.type_name()
    }

    pub fn is_fanout(&self) -> bool {
        matches!(self.kind, TaskKind::Fanout(_))
    }

    /// Branch targets if this is a decision task
    pub fn branch_targets(&self) -> Vec<&str> {
        match &self.kind {
            TaskKind::Decision(d) => d.targets(),
            _ => Vec::new(),
        }
    }
}

impl<'de> Deserialize<'de> for TaskDefinition {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = TaskDefinitionRaw::deserialize(deserializer)?;
        raw.into_definition(None).map_err(serde::de::Error::custom)
    }
}
