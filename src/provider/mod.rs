//! Provider abstraction layer
//!
//! The generation backend a computation task calls with its rendered prompt.
//!
//! - [`MockProvider`]: deterministic backend for tests (echo, queue, failure)
//! - [`OpenAiProvider`]: any OpenAI-compatible chat completions endpoint
//!
//! `generate` returns `anyhow::Result`; the executor maps failures into
//! `WeftError::Provider` with the task's identity attached. Construction
//! errors are typed (`UnknownProvider`, `MissingApiKey`).

mod mock;
mod openai;

pub use mock::{MockProvider, ProviderCall};
pub use openai::OpenAiProvider;

use anyhow::Result;
use async_trait::async_trait;

use crate::ast::GenerationSettings;
use crate::config::WeftConfig;
use crate::error::WeftError;

pub const MOCK_DEFAULT_MODEL: &str = "mock-v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Generation backend for computation tasks
///
/// # Example
/// ```rust,ignore
/// let provider = create_provider("mock", &WeftConfig::default())?;
/// let text = provider.generate("Hello", &GenerationSettings::default()).await?;
/// ```
#[async_trait]
pub trait Provider: Send + Sync {
    /// Generate text for a fully rendered prompt
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String>;

    /// Model used when the settings name none
    fn default_model(&self) -> &str;

    /// Provider name (e.g. "openai", "mock")
    fn name(&self) -> &str;
}

/// Create provider by name
pub fn create_provider(name: &str, config: &WeftConfig) -> Result<Box<dyn Provider>, WeftError> {
    if name.eq_ignore_ascii_case("mock") {
        Ok(Box::new(MockProvider::new()))
    } else if name.eq_ignore_ascii_case("openai") {
        Ok(Box::new(OpenAiProvider::from_config(config)?))
    } else {
        Err(WeftError::UnknownProvider {
            name: name.to_string(),
        })
    }
}
