//! Mock provider for testing
//!
//! Returns configurable responses without making real API calls.
//! Default behaviour echoes the prompt back, which makes rendered templates
//! directly observable in pipeline outputs.

use std::collections::VecDeque;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use super::{Provider, MOCK_DEFAULT_MODEL};
use crate::ast::GenerationSettings;

/// One recorded call
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderCall {
    pub prompt: String,
    pub settings: GenerationSettings,
}

#[derive(Debug, Clone)]
enum Fallback {
    Echo,
    Fixed(String),
    Fail(String),
}

/// Mock provider; clones share the response queue and the call record
#[derive(Debug, Clone)]
pub struct MockProvider {
    /// Responses returned first (FIFO)
    responses: Arc<Mutex<VecDeque<String>>>,
    /// Behaviour once the queue is empty
    fallback: Fallback,
    calls: Arc<Mutex<Vec<ProviderCall>>>,
}

impl MockProvider {
    /// Echo provider: returns the prompt unchanged
    pub fn new() -> Self {
        Self {
            responses: Arc::new(Mutex::new(VecDeque::new())),
            fallback: Fallback::Echo,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create with a queue of responses
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let provider = Self::new();
        provider
            .responses
            .lock()
            .extend(responses.into_iter().map(Into::into));
        provider
    }

    /// Return `response` whenever the queue is empty
    pub fn with_default(mut self, response: impl Into<String>) -> Self {
        self.fallback = Fallback::Fixed(response.into());
        self
    }

    /// Fail every call once the queue is empty
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            fallback: Fallback::Fail(message.into()),
            ..Self::new()
        }
    }

    pub fn queue_response(&self, response: impl Into<String>) {
        self.responses.lock().push_back(response.into());
    }

    /// All calls made so far, in call order
    pub fn calls(&self) -> Vec<ProviderCall> {
        self.calls.lock().clone()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.prompt.clone()).collect()
    }

    pub fn last_call(&self) -> Option<ProviderCall> {
        self.calls.lock().last().cloned()
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Provider for MockProvider {
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String> {
        self.calls.lock().push(ProviderCall {
            prompt: prompt.to_string(),
            settings: settings.clone(),
        });

        if let Some(queued) = self.responses.lock().pop_front() {
            return Ok(queued);
        }

        match &self.fallback {
            Fallback::Echo => Ok(prompt.to_string()),
            Fallback::Fixed(text) => Ok(text.clone()),
            Fallback::Fail(message) => anyhow::bail!("{}", message),
        }
    }

    fn default_model(&self) -> &str {
        MOCK_DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echoes_by_default() {
        let mock = MockProvider::new();
        let out = mock.generate("ping", &GenerationSettings::default()).await.unwrap();
        assert_eq!(out, "ping");
        assert_eq!(mock.prompts(), vec!["ping"]);
    }

    #[tokio::test]
    async fn queue_then_default() {
        let mock = MockProvider::with_responses(["first", "second"]).with_default("rest");
        let settings = GenerationSettings::default();

        assert_eq!(mock.generate("a", &settings).await.unwrap(), "first");
        assert_eq!(mock.generate("b", &settings).await.unwrap(), "second");
        assert_eq!(mock.generate("c", &settings).await.unwrap(), "rest");
        assert_eq!(mock.calls().len(), 3);
    }

    #[tokio::test]
    async fn clones_share_records() {
        let mock = MockProvider::new();
        let handle = mock.clone();
        let settings = GenerationSettings {
            model: Some("tiny".into()),
            ..Default::default()
        };
        mock.generate("x", &settings).await.unwrap();

        let last = handle.last_call().unwrap();
        assert_eq!(last.settings.model.as_deref(), Some("tiny"));
    }

    #[tokio::test]
    async fn failing_mock_errors() {
        let mock = MockProvider::failing("backend down");
        let err = mock
            .generate("x", &GenerationSettings::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("backend down"));
    }
}
