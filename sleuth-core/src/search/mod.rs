//! Search backends implementing the `SearchProvider` port.

pub mod duckduckgo;
pub mod openai_web;

use crate::config::{LlmConfig, SearchBackend, SearchConfig};
use crate::error::LlmError;
use crate::research::ports::SearchProvider;
use std::sync::Arc;

pub use duckduckgo::DuckDuckGoSearch;
pub use openai_web::OpenAiWebSearch;

/// Create the configured search backend. The OpenAI backend shares the LLM
/// credentials.
pub fn create_search_provider(
    search: &SearchConfig,
    llm: &LlmConfig,
) -> Result<Arc<dyn SearchProvider>, LlmError> {
    Ok(match search.provider {
        SearchBackend::OpenAi => Arc::new(OpenAiWebSearch::new(search, llm)?),
        SearchBackend::DuckDuckGo => Arc::new(DuckDuckGoSearch::new(search)?),
    })
}
