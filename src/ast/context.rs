//! PipelineContext - the one-time input bundle
//!
//! Carries the conversation history, the actor names and any descriptive
//! fields. Templates address these directly: `{{user}}`, `{{char}}`,
//! `{{history}}`, `{{description}}`.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::WeftError;

/// One turn of the conversation history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub content: String,
}

impl Turn {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            role: None,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineContext {
    #[serde(default)]
    pub history: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, rename = "char", skip_serializing_if = "Option::is_none")]
    pub character: Option<String>,
    /// Descriptive fields (description, scenario, persona, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl PipelineContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.character = Some(character.into());
        self
    }

    pub fn with_turn(mut self, turn: Turn) -> Self {
        self.history.push(turn);
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Flatten into the JSON object templates resolve against
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    /// Load from a JSON or YAML file (chosen by extension, YAML otherwise)
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self, WeftError> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Ok(serde_json::from_str(&text)?)
        } else {
            Ok(serde_yaml::from_str(&text)?)
        }
    }
}
