//! Pipeline - root of a YAML pipeline file
//!
//! ```yaml
//! schema: weft/pipeline@0.1
//! final: reply
//! settings:
//!   provider: mock
//! tasks:
//!   - id: reply
//!     type: computation
//!     prompt: "{{user}} says hi"
//! ```

use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashSet;
use serde::Deserialize;

use crate::error::WeftError;

use super::task::{GenerationSettings, TaskDefinition, TaskDefinitionRaw};

/// Expected schema version
pub const SCHEMA_V01: &str = "weft/pipeline@0.1";

/// Pipeline parsed from YAML (raw)
#[derive(Debug, Deserialize)]
struct PipelineRaw {
    #[serde(default = "default_schema")]
    schema: String,
    #[serde(default, rename = "final")]
    final_task: Option<String>,
    #[serde(default)]
    settings: GenerationSettings,
    tasks: Vec<TaskDefinitionRaw>,
}

fn default_schema() -> String {
    SCHEMA_V01.to_string()
}

/// Pipeline with Arc-wrapped task definitions for cheap sharing
#[derive(Debug, Clone)]
pub struct Pipeline {
    pub schema: String,
    /// Designated final task (defaults to the last enabled task)
    pub final_task: Option<String>,
    /// Default generation settings for every computation task
    pub settings: GenerationSettings,
    pub tasks: Vec<Arc<TaskDefinition>>,
}

impl Pipeline {
    pub fn new(tasks: impl IntoIterator<Item = TaskDefinition>) -> Self {
        Self {
            schema: SCHEMA_V01.to_string(),
            final_task: None,
            settings: GenerationSettings::default(),
            tasks: tasks.into_iter().map(Arc::new).collect(),
        }
    }

    pub fn with_final(mut self, task_id: impl Into<String>) -> Self {
        self.final_task = Some(task_id.into());
        self
    }

    pub fn with_settings(mut self, settings: GenerationSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Parse and validate a pipeline from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self, WeftError> {
        let raw: PipelineRaw = serde_yaml::from_str(yaml)?;
        let tasks = raw
            .tasks
            .into_iter()
            .map(|t| t.into_definition(None).map(Arc::new))
            .collect::<Result<Vec<_>, _>>()?;

        let pipeline = Self {
            schema: raw.schema,
            final_task: raw.final_task,
            settings: raw.settings,
            tasks,
        };
        pipeline.validate()?;
        Ok(pipeline)
    }

    /// Read a pipeline file (async to not block the runtime)
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WeftError> {
        let path = path.as_ref();
        let yaml = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                WeftError::PipelineNotFound {
                    path: path.display().to_string(),
                }
            } else {
                WeftError::Io(e)
            }
        })?;
        Self::from_yaml(&yaml)
    }

    /// Check schema version, id uniqueness and the final task designation
    pub fn validate(&self) -> Result<(), WeftError> {
        if self.schema != SCHEMA_V01 {
            return Err(WeftError::InvalidSchema {
                expected: SCHEMA_V01.to_string(),
                actual: self.schema.clone(),
            });
        }

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        for task in &self.tasks {
            if !seen.insert(task.id.as_str()) {
                return Err(WeftError::DuplicateTaskId {
                    task_id: task.id.clone(),
                });
            }
        }

        if let Some(final_id) = &self.final_task {
            let enabled = self.tasks.iter().any(|t| t.enabled && &t.id == final_id);
            if !enabled {
                return Err(WeftError::UnknownFinalTask {
                    task_id: final_id.clone(),
                });
            }
        }

        Ok(())
    }

    pub fn enabled_tasks(&self) -> impl Iterator<Item = &Arc<TaskDefinition>> {
        self.tasks.iter().filter(|t| t.enabled)
    }

    /// The task whose output is the pipeline result
    pub fn final_task_id(&self) -> Option<&str> {
        self.final_task
            .as_deref()
            .or_else(|| self.enabled_tasks().last().map(|t| t.id.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_pipeline() {
        let yaml = r#"
tasks:
  - id: a
    type: computation
    prompt: "hi"
  - id: b
    type: function
    function: transform::json
    params: { text: "{{outputs.a}}" }
"#;
        let pipeline = Pipeline::from_yaml(yaml).unwrap();
        assert_eq!(pipeline.schema, SCHEMA_V01);
        assert_eq!(pipeline.tasks.len(), 2);
        assert_eq!(pipeline.final_task_id(), Some("b"));
    }

    #[test]
    fn final_task_defaults_to_last_enabled() {
        let pipeline = Pipeline::new([
            TaskDefinition::computation("a", "x"),
            TaskDefinition::computation("b", "y").disabled(),
        ]);
        assert_eq!(pipeline.final_task_id(), Some("a"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let yaml = r#"
tasks:
  - { id: a, type: computation, prompt: "1" }
  - { id: a, type: computation, prompt: "2" }
"#;
        let err = Pipeline::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, WeftError::DuplicateTaskId { .. }));
    }

    #[test]
    fn wrong_schema_is_rejected() {
        let yaml = "schema: other@1\ntasks: []\n";
        let err = Pipeline::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("WEFT-002"));
    }

    #[test]
    fn final_must_name_enabled_task() {
        let yaml = r#"
final: ghost
tasks:
  - { id: a, type: computation, prompt: "1" }
"#;
        let err = Pipeline::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, WeftError::UnknownFinalTask { .. }));
    }

    #[test]
    fn unknown_task_type_fails_load() {
        let yaml = r#"
tasks:
  - { id: a, type: exec, command: "ls" }
"#;
        let err = Pipeline::from_yaml(yaml).unwrap_err();
        assert_eq!(err.code(), "WEFT-011");
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = Pipeline::from_file("/definitely/not/here.yaml").await.unwrap_err();
        assert!(matches!(err, WeftError::PipelineNotFound { .. }));
    }
}
