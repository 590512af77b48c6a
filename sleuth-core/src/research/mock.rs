//! Scripted capability ports for tests and dry runs.

use super::ports::{SearchProvider, TextGenerator};
use super::records::SearchResult;
use crate::error::ServiceError;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

/// A prompt received by `ScriptedGenerator`.
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub system: String,
    pub prompt: String,
}

/// Replays queued results in order. Once the script runs out every call
/// fails with a transport error.
#[derive(Default)]
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Result<String, ServiceError>>>,
    prompts: Mutex<Vec<RecordedPrompt>>,
}

impl ScriptedGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// A generator whose every call fails.
    pub fn failing() -> Self {
        Self::new()
    }

    pub fn then_text(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    pub fn then_error(self, error: ServiceError) -> Self {
        self.push(Err(error));
        self
    }

    pub fn push(&self, item: Result<String, ServiceError>) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(item);
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, system: &str, prompt: &str) -> Result<String, ServiceError> {
        self.prompts
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(RecordedPrompt {
                system: system.to_string(),
                prompt: prompt.to_string(),
            });
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .unwrap_or_else(|| Err(ServiceError::transport("script exhausted")))
    }
}

/// Search backend answering every query with `mock://<query>` and echo
/// content, unless the query was scripted to fail or the whole backend is
/// failing. Individual queries can be slowed down or made to hang.
#[derive(Default)]
pub struct ScriptedSearch {
    fail_all: bool,
    failures: HashMap<String, ServiceError>,
    delays: HashMap<String, Duration>,
    hangs: HashSet<String>,
    queries: Mutex<Vec<String>>,
    completed: Mutex<Vec<String>>,
}

impl ScriptedSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail_all: true,
            ..Self::default()
        }
    }

    pub fn fail_on(mut self, query: impl Into<String>, error: ServiceError) -> Self {
        self.failures.insert(query.into(), error);
        self
    }

    pub fn delay_on(mut self, query: impl Into<String>, delay: Duration) -> Self {
        self.delays.insert(query.into(), delay);
        self
    }

    /// Never answer `query`.
    pub fn hang_on(mut self, query: impl Into<String>) -> Self {
        self.hangs.insert(query.into());
        self
    }

    /// Queries answered so far, in completion order.
    pub fn completed(&self) -> Vec<String> {
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Queries received so far. Concurrent batches may record in any order.
    pub fn queries(&self) -> Vec<String> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

#[async_trait]
impl SearchProvider for ScriptedSearch {
    async fn search(&self, query: &str) -> Result<SearchResult, ServiceError> {
        self.queries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        if self.hangs.contains(query) {
            std::future::pending::<()>().await;
        }
        if let Some(delay) = self.delays.get(query) {
            tokio::time::sleep(*delay).await;
        }
        self.completed
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(query.to_string());
        if self.fail_all {
            return Err(ServiceError::transport("search backend unavailable"));
        }
        if let Some(err) = self.failures.get(query) {
            return Err(err.clone());
        }
        Ok(SearchResult::new(
            query,
            format!("mock://{query}"),
            format!("Findings about {query}"),
        ))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
