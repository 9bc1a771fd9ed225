//! OpenAI-compatible provider (chat completions API)

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use super::{Provider, OPENAI_DEFAULT_MODEL};
use crate::ast::GenerationSettings;
use crate::config::WeftConfig;
use crate::error::WeftError;
use crate::util::{CONNECT_TIMEOUT, INFER_TIMEOUT};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

pub struct OpenAiProvider {
    api_key: String,
    base_url: String,
    client: Client,
}

impl OpenAiProvider {
    pub fn new(api_key: impl Into<String>, base_url: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .timeout(INFER_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("weft/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            api_key: api_key.into(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            client,
        })
    }

    /// Key and base URL from config (env vars merged by the caller)
    pub fn from_config(config: &WeftConfig) -> Result<Self, WeftError> {
        let api_key = config.openai_key().ok_or_else(|| WeftError::MissingApiKey {
            provider: "openai".to_string(),
        })?;
        Self::new(api_key, config.openai_base_url()).map_err(|e| WeftError::Provider {
            provider: "openai".to_string(),
            message: format!("{e:#}"),
        })
    }

    fn request_body(&self, prompt: &str, settings: &GenerationSettings) -> Value {
        let mut body = json!({
            "model": settings.model.as_deref().unwrap_or(OPENAI_DEFAULT_MODEL),
            "messages": [
                { "role": "user", "content": prompt }
            ]
        });
        if let Some(temperature) = settings.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = settings.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }
}

#[async_trait]
impl Provider for OpenAiProvider {
    async fn generate(&self, prompt: &str, settings: &GenerationSettings) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&self.request_body(prompt, settings))
            .send()
            .await
            .context("Failed to send request to OpenAI-compatible API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("API error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        // A null content (e.g. filtered) is an empty generation, not an error
        let choice = json["choices"]
            .get(0)
            .context("Invalid response format: no choices")?;
        Ok(choice["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string())
    }

    fn default_model(&self) -> &str {
        OPENAI_DEFAULT_MODEL
    }

    fn name(&self) -> &str {
        "openai"
    }
}
