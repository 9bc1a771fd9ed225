//! KeywordExpander - keyword-activated entry sets
//!
//! An entry activates when one of its keys occurs (case-insensitive) in the
//! search text, in a global scan field, or in the content of an entry
//! activated on a previous pass. Passes stop at `max_depth` or when nothing
//! new activates. Entries are added in activation order until the budget is
//! exhausted.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use super::{ContentExpander, ExpansionRequest, ExpansionResult};

const DEFAULT_ANCHOR: &str = "before";
const DEFAULT_MAX_DEPTH: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoreEntry {
    pub id: String,
    #[serde(default)]
    pub keys: Vec<String>,
    pub content: String,
    /// Segment the content lands in (`before` by default)
    #[serde(default)]
    pub anchor: Option<String>,
    /// Always active, regardless of keys
    #[serde(default)]
    pub constant: bool,
}

impl LoreEntry {
    fn matches(&self, haystack: &str) -> bool {
        self.keys
            .iter()
            .filter(|k| !k.trim().is_empty())
            .any(|k| haystack.contains(&k.trim().to_lowercase()))
    }

    fn anchor(&self) -> &str {
        self.anchor.as_deref().unwrap_or(DEFAULT_ANCHOR)
    }
}

/// A named list of entries
pub type EntrySet = Vec<LoreEntry>;

#[derive(Debug, Deserialize)]
struct EntryFile {
    #[serde(default)]
    max_depth: Option<usize>,
    #[serde(flatten)]
    sets: BTreeMap<String, EntrySet>,
}

#[derive(Debug, Clone)]
pub struct KeywordExpander {
    sets: FxHashMap<String, EntrySet>,
    max_depth: usize,
}

impl KeywordExpander {
    pub fn new() -> Self {
        Self {
            sets: FxHashMap::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    pub fn with_set(mut self, name: impl Into<String>, entries: EntrySet) -> Self {
        self.sets.insert(name.into(), entries);
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    /// Load `{ set_name: [entries...] }` from YAML or JSON
    pub async fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        Self::new().load_file(path).await
    }

    /// Add the sets of an entries file. A top-level `max_depth` key replaces
    /// the current depth.
    pub async fn load_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read entry sets from {}", path.display()))?;
        let file: EntryFile = serde_yaml::from_str(&text)
            .with_context(|| format!("Invalid entry sets in {}", path.display()))?;

        let expander = match file.max_depth {
            Some(depth) => self.with_max_depth(depth),
            None => self,
        };
        Ok(file
            .sets
            .into_iter()
            .fold(expander, |expander, (name, entries)| expander.with_set(name, entries)))
    }

    fn activate<'a>(&'a self, request: &ExpansionRequest) -> Vec<&'a LoreEntry> {
        let candidates: Vec<&LoreEntry> = request
            .entry_sets
            .iter()
            .filter_map(|name| self.sets.get(name))
            .flatten()
            .collect();

        let mut haystack = request
            .search_text
            .iter()
            .chain(request.global_scan.values())
            .map(|s| s.to_lowercase())
            .collect::<Vec<_>>()
            .join("\n");

        let mut seen: FxHashSet<&str> = FxHashSet::default();
        let mut activated: Vec<&LoreEntry> = Vec::new();

        for _ in 0..self.max_depth {
            let fresh: Vec<&LoreEntry> = candidates
                .iter()
                .copied()
                .filter(|e| !seen.contains(e.id.as_str()))
                .filter(|e| e.constant || e.matches(&haystack))
                .collect();
            if fresh.is_empty() {
                break;
            }
            for entry in fresh {
                seen.insert(&entry.id);
                haystack.push('\n');
                haystack.push_str(&entry.content.to_lowercase());
                activated.push(entry);
            }
        }
        activated
    }
}

impl Default for KeywordExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContentExpander for KeywordExpander {
    async fn expand(&self, request: ExpansionRequest) -> Result<ExpansionResult> {
        let mut result = ExpansionResult::default();
        let budget = request.budget.unwrap_or(usize::MAX);

        for entry in self.activate(&request) {
            let separator = usize::from(!result.concatenated.is_empty());
            if result.concatenated.len() + separator + entry.content.len() > budget {
                break;
            }
            if separator == 1 {
                result.concatenated.push('\n');
            }
            result.concatenated.push_str(&entry.content);

            let segment = result
                .segments_by_anchor
                .entry(entry.anchor().to_string())
                .or_default();
            if !segment.is_empty() {
                segment.push('\n');
            }
            segment.push_str(&entry.content);
            result.activated_entries.push(entry.id.clone());
        }

        Ok(result)
    }
}
