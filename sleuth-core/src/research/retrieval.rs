//! Execute-search stage. Never fails: a failed retrieval becomes a
//! placeholder result with a stable identifier.

use super::ports::SearchProvider;
use super::records::{SearchResult, stable_id};
use crate::error::ServiceError;
use tracing::{debug, warn};

pub fn placeholder_content(query: &str) -> String {
    format!("Research results for: {query}")
}

/// The result recorded when a search fails.
pub fn fallback_result(query: &str) -> SearchResult {
    SearchResult::new(query, stable_id("search", query), placeholder_content(query))
}

/// Fill in anything the backend left blank and pin the originating query.
fn normalize(query: &str, mut result: SearchResult) -> SearchResult {
    result.query = query.to_string();
    if result.identifier.trim().is_empty() {
        result.identifier = stable_id("search", query);
    }
    if result.content.trim().is_empty() {
        result.content = placeholder_content(query);
    }
    result
}

/// Remote half of the stage.
pub async fn request_search(
    search: &dyn SearchProvider,
    query: &str,
) -> Result<SearchResult, ServiceError> {
    search.search(query).await.map(|r| normalize(query, r))
}

/// Run one query, substituting the placeholder result on failure.
pub async fn execute_search(search: &dyn SearchProvider, query: &str) -> SearchResult {
    match request_search(search, query).await {
        Ok(result) => {
            debug!(stage = "search", query, identifier = %result.identifier, "Search complete");
            result
        }
        Err(e) => {
            warn!(
                stage = "search",
                backend = search.name(),
                query,
                error = %e,
                "Search failed, recording placeholder"
            );
            fallback_result(query)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::mock::ScriptedSearch;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct BlankSearch;

    #[async_trait]
    impl SearchProvider for BlankSearch {
        async fn search(&self, _query: &str) -> Result<SearchResult, ServiceError> {
            Ok(SearchResult::new("rewritten", "", "  "))
        }

        fn name(&self) -> &str {
            "blank"
        }
    }

    #[tokio::test]
    async fn test_execute_search_success() {
        let result = execute_search(&ScriptedSearch::new(), "perovskite cells").await;
        assert_eq!(result.identifier, "mock://perovskite cells");
        assert_eq!(result.content, "Findings about perovskite cells");
    }

    #[tokio::test]
    async fn test_failed_search_is_stable() {
        let search = ScriptedSearch::failing();
        let first = execute_search(&search, "perovskite cells").await;
        let second = execute_search(&search, "perovskite cells").await;
        assert_eq!(first, second);
        assert_eq!(first.identifier, stable_id("search", "perovskite cells"));
        assert_eq!(first.content, "Research results for: perovskite cells");
        assert_eq!(first.query, "perovskite cells");
    }

    #[tokio::test]
    async fn test_blank_fields_are_filled() {
        let result = execute_search(&BlankSearch, "q").await;
        assert_eq!(result.query, "q");
        assert_eq!(result.identifier, stable_id("search", "q"));
        assert_eq!(result.content, placeholder_content("q"));
    }
}
