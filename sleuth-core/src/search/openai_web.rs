//! OpenAI Responses API with the hosted `web_search` tool.
//!
//! The response id doubles as the result identifier; the first
//! `url_citation` annotation, if any, becomes the source URL.

use crate::config::{LlmConfig, SearchConfig};
use crate::error::{LlmError, ServiceError};
use crate::providers::openai_compat::{DEFAULT_OPENAI_BASE_URL, OpenAiCompatibleProvider};
use crate::providers::resolve_api_key;
use crate::research::ports::SearchProvider;
use crate::research::records::SearchResult;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use tracing::debug;

pub struct OpenAiWebSearch {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiWebSearch {
    pub fn new(search: &SearchConfig, llm: &LlmConfig) -> Result<Self, LlmError> {
        let api_key = resolve_api_key(llm)?;
        Self::new_with_key(search, llm, api_key)
    }

    pub fn new_with_key(
        search: &SearchConfig,
        llm: &LlmConfig,
        api_key: String,
    ) -> Result<Self, LlmError> {
        let base_url = search
            .base_url
            .clone()
            .or_else(|| llm.base_url.clone())
            .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string());

        let client = Client::builder()
            .timeout(Duration::from_secs(search.timeout_secs))
            .user_agent(&search.user_agent)
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model: search.model.clone(),
            timeout_secs: search.timeout_secs,
        })
    }

    fn build_body(&self, query: &str) -> Value {
        json!({
            "model": self.model,
            "tools": [{"type": "web_search"}],
            "input": query,
        })
    }

    /// Extract id, text and first cited URL from a Responses API body.
    pub(crate) fn parse_response(query: &str, body: &Value) -> Result<SearchResult, ServiceError> {
        let id = body
            .get("id")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ServiceError::malformed("response has no id"))?;

        let parts: Vec<&Value> = body
            .get("output")
            .and_then(|v| v.as_array())
            .into_iter()
            .flatten()
            .filter(|item| item.get("type").and_then(|t| t.as_str()) == Some("message"))
            .filter_map(|item| item.get("content").and_then(|c| c.as_array()))
            .flatten()
            .filter(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
            .collect();

        let text = match body.get("output_text").and_then(|v| v.as_str()) {
            Some(text) => text.to_string(),
            None => parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("\n"),
        };
        if text.trim().is_empty() {
            return Err(ServiceError::malformed("response has no output text"));
        }

        let source = parts
            .iter()
            .filter_map(|p| p.get("annotations").and_then(|a| a.as_array()))
            .flatten()
            .find(|a| a.get("type").and_then(|t| t.as_str()) == Some("url_citation"))
            .and_then(|a| a.get("url").and_then(|u| u.as_str()));

        let result = SearchResult::new(query, id, text);
        Ok(match source {
            Some(url) => result.with_source(url),
            None => result,
        })
    }
}

#[async_trait]
impl SearchProvider for OpenAiWebSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ServiceError> {
        let url = format!("{}/responses", self.base_url);
        debug!(url = %url, model = %self.model, query, "Sending web search request");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.build_body(query))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    ServiceError::transport(format!("Search request failed: {}", e))
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ServiceError::transport(format!("Failed to read response body: {}", e)))?;
        if !status.is_success() {
            return Err(OpenAiCompatibleProvider::map_http_error(status, &text).into());
        }

        let body: Value = serde_json::from_str(&text)
            .map_err(|e| ServiceError::malformed(format!("Invalid JSON: {}", e)))?;
        Self::parse_response(query, &body)
    }

    fn name(&self) -> &str {
        "openai-web-search"
    }
}
