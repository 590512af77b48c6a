//! DuckDuckGo instant-answer search. No API key required.

use crate::config::SearchConfig;
use crate::error::{LlmError, ServiceError};
use crate::research::ports::SearchProvider;
use crate::research::records::{SearchResult, stable_id};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

const DEFAULT_DDG_BASE_URL: &str = "https://api.duckduckgo.com";

pub struct DuckDuckGoSearch {
    client: Client,
    base_url: String,
    max_results: usize,
    timeout_secs: u64,
}

impl DuckDuckGoSearch {
    pub fn new(config: &SearchConfig) -> Result<Self, LlmError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| LlmError::Connection {
                message: format!("Failed to create HTTP client: {}", e),
            })?;
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_DDG_BASE_URL.to_string());
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            max_results: config.max_results,
            timeout_secs: config.timeout_secs,
        })
    }

    fn url_for(&self, query: &str) -> String {
        format!(
            "{}/?q={}&format=json&no_html=1&skip_disambig=1",
            self.base_url,
            urlencoding::encode(query)
        )
    }

    /// Fold the abstract, related topics and results into one result.
    ///
    /// The identifier is the abstract URL, else the first topic URL, else a
    /// hash of the query. An answer with no text at all is an error.
    pub(crate) fn parse_instant_answer(
        query: &str,
        body: &Value,
        max_results: usize,
    ) -> Result<SearchResult, ServiceError> {
        let str_field = |v: &Value, key: &str| {
            v.get(key)
                .and_then(|x| x.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        let mut lines = Vec::new();
        let mut urls = Vec::new();

        if let Some(text) = str_field(body, "AbstractText") {
            let source = str_field(body, "AbstractSource").unwrap_or_else(|| "Unknown".into());
            let url = str_field(body, "AbstractURL");
            lines.push(format!(
                "[{}] {}\n  URL: {}",
                source,
                text,
                url.as_deref().unwrap_or("")
            ));
            urls.extend(url);
        }

        let topics = ["RelatedTopics", "Results"]
            .into_iter()
            .filter_map(|key| body.get(key).and_then(|v| v.as_array()))
            .flatten();
        for topic in topics {
            if lines.len() >= max_results {
                break;
            }
            if let Some(text) = str_field(topic, "Text") {
                let url = str_field(topic, "FirstURL");
                lines.push(format!("- {}\n  URL: {}", text, url.as_deref().unwrap_or("")));
                urls.extend(url);
            }
        }
        lines.truncate(max_results);

        if lines.is_empty() {
            return Err(ServiceError::malformed(format!(
                "no instant answers for \"{query}\""
            )));
        }

        let content = format!("Search results for \"{}\":\n\n{}", query, lines.join("\n\n"));
        Ok(match urls.first() {
            Some(url) => SearchResult::new(query, url.clone(), content).with_source(url.clone()),
            None => SearchResult::new(query, stable_id("ddg", query), content),
        })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ServiceError> {
        let url = self.url_for(query);
        debug!(url = %url, "Sending instant answer request");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout {
                    timeout_secs: self.timeout_secs,
                }
            } else {
                ServiceError::transport(format!("Search request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::transport(format!("HTTP {}", status)));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ServiceError::malformed(format!("Failed to parse search response: {}", e)))?;
        Self::parse_instant_answer(query, &body, self.max_results)
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
