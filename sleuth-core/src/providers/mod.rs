//! LLM provider implementations.
//!
//! Provides the OpenAI-compatible implementation of the `LlmProvider` trait
//! (OpenAI, Azure, Ollama, vLLM, LM Studio). Use `create_provider()` to
//! instantiate a provider from config.

pub mod openai_compat;

use crate::brain::LlmProvider;
use crate::config::LlmConfig;
use crate::error::LlmError;
use std::sync::Arc;
use tracing::debug;

pub use openai_compat::OpenAiCompatibleProvider;

const OPENAI_COMPATIBLE: &[&str] = &["openai", "azure", "ollama", "vllm", "lmstudio", "local"];

/// Resolve the API key for a provider.
///
/// Order: inline `api_key`, then the `api_key_env` variable, then a dummy
/// bearer token for local servers that do not check keys.
pub fn resolve_api_key(config: &LlmConfig) -> Result<String, LlmError> {
    if let Some(key) = config.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        return Ok(key.clone());
    }
    if let Ok(key) = std::env::var(&config.api_key_env)
        && !key.trim().is_empty()
    {
        return Ok(key);
    }
    if openai_compat::is_local_url(config.base_url.as_deref()) {
        debug!("No API key set for local provider; using dummy bearer token");
        return Ok("ollama".to_string());
    }
    Err(LlmError::AuthFailed {
        provider: format!(
            "{}: env var '{}' not set",
            config.provider, config.api_key_env
        ),
    })
}

/// Create an LLM provider based on the configuration.
///
/// Every provider name routes to `OpenAiCompatibleProvider`; non-OpenAI
/// backends are reached through `base_url`.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    if !OPENAI_COMPATIBLE.contains(&config.provider.as_str()) {
        debug!(
            provider = %config.provider,
            "Unknown provider name, assuming OpenAI-compatible API"
        );
    }
    Ok(Arc::new(OpenAiCompatibleProvider::new(config)?))
}
