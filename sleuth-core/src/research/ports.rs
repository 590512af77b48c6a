//! Capability ports the research loop depends on.
//!
//! The engine only ever talks to `TextGenerator` and `SearchProvider`.
//! Concrete backends live in `crate::providers` and `crate::search`; retry
//! and deadlines are layered on top by `super::guard`.

use super::records::SearchResult;
use crate::brain::LlmProvider;
use crate::error::ServiceError;
use crate::types::{CompletionRequest, Message};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::debug;

/// Text generation: a system context plus a user prompt, returning text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError>;
}

/// Information retrieval for a single query.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &str) -> Result<SearchResult, ServiceError>;

    /// Short backend name for logs.
    fn name(&self) -> &str;
}

/// Adapts any `LlmProvider` to the `TextGenerator` port.
pub struct LlmTextGenerator {
    provider: Arc<dyn LlmProvider>,
    model: Option<String>,
    temperature: f32,
    max_tokens: Option<usize>,
}

impl LlmTextGenerator {
    pub fn new(provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            provider,
            model: None,
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Send requests with a model other than the provider's default.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.model_name())
    }
}

#[async_trait]
impl TextGenerator for LlmTextGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        let request = CompletionRequest {
            messages: vec![Message::system(system), Message::user(prompt)],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            model: self.model.clone(),
        };
        let response = self.provider.complete(request).await?;
        debug!(
            model = %response.model,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Text generation complete"
        );
        if response.message.content.trim().is_empty() {
            return Err(ServiceError::malformed("empty completion"));
        }
        Ok(response.message.content)
    }
}
