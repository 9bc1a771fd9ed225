//! Content Expansion - "world info" injection for computation prompts
//!
//! The executor only depends on the [`ContentExpander`] contract. Two
//! implementations ship with the crate:
//! - [`NoopExpander`]: activates nothing (the default)
//! - [`KeywordExpander`]: in-memory keyword activation with bounded recursion

mod keyword;

pub use keyword::{EntrySet, KeywordExpander, LoreEntry};

use std::collections::BTreeMap;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Input to one expansion call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExpansionRequest {
    pub entry_sets: Vec<String>,
    /// Texts scanned for activation keys (most recent last)
    pub search_text: Vec<String>,
    /// Field name → text scanned in addition to `search_text`
    pub global_scan: BTreeMap<String, String>,
    /// Maximum length of the concatenated result
    pub budget: Option<usize>,
}

/// Output of one expansion call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpansionResult {
    /// Anchor name → joined entry content
    pub segments_by_anchor: BTreeMap<String, String>,
    /// Identifiers of activated entries, activation order
    pub activated_entries: Vec<String>,
    pub concatenated: String,
}

impl ExpansionResult {
    pub fn is_empty(&self) -> bool {
        self.activated_entries.is_empty() && self.concatenated.is_empty()
    }

    /// Shape exposed to prompt templates under `expansion`
    pub fn to_scope_value(&self) -> Value {
        json!({
            "text": self.concatenated,
            "segments": self.segments_by_anchor,
            "entries": self.activated_entries,
        })
    }
}

#[async_trait]
pub trait ContentExpander: Send + Sync {
    async fn expand(&self, request: ExpansionRequest) -> Result<ExpansionResult>;
}

/// Expander that never activates anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopExpander;

#[async_trait]
impl ContentExpander for NoopExpander {
    async fn expand(&self, _request: ExpansionRequest) -> Result<ExpansionResult> {
        Ok(ExpansionResult::default())
    }
}
