//! Function Registry - named functions for `function` tasks
//!
//! ## Reference Format
//!
//! ```yaml
//! function: module::name
//! ```
//!
//! ## Built-in Functions
//!
//! - `aggregate::collect` - outputs of `source_tasks` as an array
//! - `aggregate::merge` - merge object outputs of `source_tasks`
//! - `fanout::gather` - ordered outputs of a fan-out's children (`source_task`)
//! - `transform::format` - the rendered `template` param as a string
//! - `transform::json` - parse the `text` param as JSON
//! - `text::lines` - split the `text` param into trimmed non-empty lines
//!
//! Custom functions implement [`PipelineFunction`] or are plain closures
//! registered with [`FunctionRegistry::register_fn`].

mod builtins;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;

use crate::error::WeftError;
use crate::runtime::ContextView;

/// Parsed function reference (module::name)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionReference {
    pub module: String,
    pub name: String,
}

impl FunctionReference {
    /// Parse a reference string in the format "module::name"
    pub fn parse(reference: &str) -> Result<Self, WeftError> {
        let invalid = |reason: &str| WeftError::InvalidFunctionReference {
            reference: reference.to_string(),
            reason: reason.to_string(),
        };

        let (module, name) = reference
            .split_once("::")
            .ok_or_else(|| invalid("expected 'module::name' format"))?;
        let (module, name) = (module.trim(), name.trim());

        if module.is_empty() {
            return Err(invalid("module name is empty"));
        }
        if name.is_empty() {
            return Err(invalid("function name is empty"));
        }
        if name.contains("::") {
            return Err(invalid("expected exactly one '::' separator"));
        }

        Ok(Self {
            module: module.to_string(),
            name: name.to_string(),
        })
    }

    pub fn full_name(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

/// A function callable from a `function` task
#[async_trait]
pub trait PipelineFunction: Send + Sync {
    /// `params` arrive with their string leaves already rendered
    async fn call(&self, view: &ContextView<'_>, params: Value) -> Result<Value>;
}

/// Adapter for synchronous closures
struct ClosureFunction<F>(F);

#[async_trait]
impl<F> PipelineFunction for ClosureFunction<F>
where
    F: Fn(&ContextView<'_>, Value) -> Result<Value> + Send + Sync,
{
    async fn call(&self, view: &ContextView<'_>, params: Value) -> Result<Value> {
        (self.0)(view, params)
    }
}

/// Function Registry - `module::name` → implementation
#[derive(Clone)]
pub struct FunctionRegistry {
    functions: FxHashMap<String, Arc<dyn PipelineFunction>>,
}

impl FunctionRegistry {
    /// Registry with the built-in functions
    pub fn new() -> Self {
        let mut registry = Self::empty();
        builtins::register_all(&mut registry);
        registry
    }

    /// Registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: FxHashMap::default(),
        }
    }

    /// Register (or replace) a function
    pub fn register(
        &mut self,
        reference: &str,
        function: impl PipelineFunction + 'static,
    ) -> Result<(), WeftError> {
        let reference = FunctionReference::parse(reference)?;
        self.functions
            .insert(reference.full_name(), Arc::new(function));
        Ok(())
    }

    /// Register a synchronous closure
    pub fn register_fn<F>(&mut self, reference: &str, f: F) -> Result<(), WeftError>
    where
        F: Fn(&ContextView<'_>, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.register(reference, ClosureFunction(f))
    }

    pub fn has_function(&self, reference: &str) -> bool {
        self.functions.contains_key(reference.trim())
    }

    /// Registered names, sorted
    pub fn list_functions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Call a function by name; unknown names are an error
    pub async fn call(
        &self,
        reference: &str,
        view: &ContextView<'_>,
        params: Value,
    ) -> Result<Value, WeftError> {
        let name = FunctionReference::parse(reference)?.full_name();
        let function = self
            .functions
            .get(&name)
            .cloned()
            .ok_or_else(|| WeftError::UnknownFunction { name: name.clone() })?;

        function
            .call(view, params)
            .await
            .map_err(|e| WeftError::FunctionFailed {
                name,
                reason: format!("{e:#}"),
            })
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.list_functions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_reference() {
        let r = FunctionReference::parse(" aggregate :: collect ").unwrap();
        assert_eq!(r.module, "aggregate");
        assert_eq!(r.name, "collect");
        assert_eq!(r.full_name(), "aggregate::collect");
    }

    #[test]
    fn parse_reference_errors() {
        for bad in ["collect", "::collect", "aggregate::", "a::b::c"] {
            let err = FunctionReference::parse(bad).unwrap_err();
            assert_eq!(err.code(), "WEFT-032", "{bad}");
        }
    }

    #[test]
    fn builtins_are_registered() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.list_functions(),
            vec![
                "aggregate::collect",
                "aggregate::merge",
                "fanout::gather",
                "text::lines",
                "transform::format",
                "transform::json",
            ]
        );
        assert!(FunctionRegistry::empty().list_functions().is_empty());
    }

    #[test]
    fn register_closure() {
        let mut registry = FunctionRegistry::empty();
        registry
            .register_fn("math::answer", |_, _| Ok(Value::from(42)))
            .unwrap();
        assert!(registry.has_function("math::answer"));
        assert!(registry.register_fn("bad", |_, p| Ok(p)).is_err());
    }
}
