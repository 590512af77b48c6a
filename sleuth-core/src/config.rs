//! Configuration system for Sleuth.
//!
//! Uses `figment` for layered configuration: defaults -> config file -> environment -> overrides.
//! Configuration is loaded from `~/.config/sleuth/config.toml` and/or `.sleuth/config.toml`
//! in the workspace directory.

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use crate::error::{ConfigError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default system context shared by every stage prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are an expert Deep Researcher.\n\
You provide complete and in depth research to the user.";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SleuthConfig {
    pub llm: LlmConfig,
    pub search: SearchConfig,
    pub research: ResearchConfig,
}

impl SleuthConfig {
    /// Validate the whole config and return human-readable warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = self.llm.validate();
        warnings.extend(self.search.validate());
        warnings.extend(self.research.validate());
        warnings
    }
}

/// Configuration for the text-generation provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name: "openai" or any OpenAI-compatible endpoint.
    pub provider: String,
    /// Model used for goal derivation, evaluation, supplemental queries and reports.
    pub model: String,
    /// Cheaper model used for clarifying questions.
    pub fast_model: String,
    /// Environment variable name containing the API key.
    pub api_key_env: String,
    /// Inline API key. Takes precedence over `api_key_env` when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Optional base URL override for the API endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Maximum tokens to generate in a response.
    pub max_tokens: usize,
    /// Default temperature for generation.
    pub temperature: f32,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            fast_model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            api_key: None,
            base_url: None,
            max_tokens: 4096,
            temperature: 0.7,
            request_timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Validate this LLM config and return any warnings.
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.model.trim().is_empty() {
            warnings.push("llm.model is empty".to_string());
        }
        if self.fast_model.trim().is_empty() {
            warnings.push("llm.fast_model is empty; clarifying questions will fail".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            warnings.push(format!(
                "llm.temperature {} is outside the supported range 0.0-2.0",
                self.temperature
            ));
        }
        if self.api_key.is_none() && self.api_key_env.trim().is_empty() {
            warnings.push("neither llm.api_key nor llm.api_key_env is set".to_string());
        }
        warnings
    }
}

/// Which search backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SearchBackend {
    /// OpenAI Responses API with the `web_search` tool.
    #[serde(rename = "openai")]
    OpenAi,
    /// DuckDuckGo instant answers (no API key).
    #[serde(rename = "duckduckgo")]
    DuckDuckGo,
}

/// Configuration for the search capability.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub provider: SearchBackend,
    /// Model driving the web-search tool (OpenAI backend only).
    pub model: String,
    /// Maximum instant-answer entries folded into one result (DuckDuckGo only).
    pub max_results: usize,
    /// HTTP request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Optional base URL override for the search endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchBackend::OpenAi,
            model: "gpt-4o".to_string(),
            max_results: 5,
            timeout_secs: 60,
            user_agent: format!("Sleuth/{}", env!("CARGO_PKG_VERSION")),
            base_url: None,
        }
    }
}

impl SearchConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.max_results == 0 {
            warnings.push("search.max_results is 0; results will only carry placeholders".into());
        }
        if self.timeout_secs == 0 {
            warnings.push("search.timeout_secs is 0; every search will time out".into());
        }
        warnings
    }
}

/// Exponential backoff settings for transient capability failures.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first attempt. Zero disables retrying.
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    pub backoff_multiplier: f64,
    /// Add up to 25% jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 1000,
            max_backoff_ms: 30_000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Configuration for the research loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Deadline for each individual capability call, in seconds.
    pub stage_timeout_secs: u64,
    /// Upper bound on concurrent searches within one batch.
    pub search_concurrency: usize,
    /// System context sent with every text-generation call.
    pub system_prompt: String,
    pub retry: RetryConfig,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            stage_timeout_secs: 120,
            search_concurrency: 5,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl ResearchConfig {
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.stage_timeout_secs == 0 {
            warnings.push("research.stage_timeout_secs is 0; every call will fall back".into());
        }
        if self.search_concurrency == 0 {
            warnings.push("research.search_concurrency is 0; searches will run one at a time".into());
        }
        if self.retry.backoff_multiplier < 1.0 {
            warnings.push("research.retry.backoff_multiplier below 1.0 shrinks delays".into());
        }
        warnings
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("dev", "sleuth", "sleuth")
}

/// Load configuration from layered sources.
///
/// Priority (highest to lowest):
/// 1. Explicit overrides (passed as argument)
/// 2. Environment variables (prefixed with `SLEUTH_`)
/// 3. Workspace-local config (`.sleuth/config.toml`)
/// 4. User config (`~/.config/sleuth/config.toml`)
/// 5. Built-in defaults
pub fn load_config(
    workspace: Option<&Path>,
    overrides: Option<&SleuthConfig>,
) -> Result<SleuthConfig> {
    let mut figment = Figment::from(Serialized::defaults(SleuthConfig::default()));

    if let Some(dirs) = project_dirs() {
        let user_config = dirs.config_dir().join("config.toml");
        if user_config.exists() {
            figment = figment.merge(Toml::file(&user_config));
        }
    }

    if let Some(ws) = workspace {
        let ws_config = ws.join(".sleuth").join("config.toml");
        if ws_config.exists() {
            figment = figment.merge(Toml::file(&ws_config));
        }
    }

    // SLEUTH_LLM__MODEL, SLEUTH_RESEARCH__SEARCH_CONCURRENCY, etc.
    figment = figment.merge(Env::prefixed("SLEUTH_").split("__"));

    if let Some(overrides) = overrides {
        figment = figment.merge(Serialized::defaults(overrides));
    }

    Ok(figment.extract().map_err(config_error)?)
}

/// Syntax failures become `ParseError`; well-formed files with bad values
/// become `Invalid`.
fn config_error(err: figment::Error) -> ConfigError {
    let message = err.to_string();
    match err.kind {
        figment::error::Kind::Message(_) => ConfigError::ParseError { message },
        _ => ConfigError::Invalid { message },
    }
}

/// Check whether any Sleuth configuration file exists (user-level or workspace-level).
pub fn config_exists(workspace: Option<&Path>) -> bool {
    if let Some(dirs) = project_dirs()
        && dirs.config_dir().join("config.toml").exists()
    {
        return true;
    }
    workspace.is_some_and(|ws| ws.join(".sleuth").join("config.toml").exists())
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<std::path::PathBuf> {
    project_dirs().map(|d| d.data_dir().join("logs"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SleuthError;

    #[test]
    fn test_default_config() {
        let config = SleuthConfig::default();
        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.fast_model, "gpt-4o-mini");
        assert_eq!(config.llm.api_key_env, "OPENAI_API_KEY");
        assert_eq!(config.research.search_concurrency, 5);
        assert_eq!(config.research.retry.max_retries, 0);
        assert_eq!(config.search.provider, SearchBackend::OpenAi);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_validate_reports_problems() {
        let mut config = SleuthConfig::default();
        config.llm.temperature = 3.5;
        config.research.stage_timeout_secs = 0;
        config.search.max_results = 0;
        let warnings = config.validate();
        assert_eq!(warnings.len(), 3);
        assert!(warnings.iter().any(|w| w.contains("temperature")));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: SleuthConfig = toml::from_str(
            r#"
            [llm]
            model = "gpt-4.1"

            [search]
            provider = "duckduckgo"
            "#,
        )
        .unwrap();
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.fast_model, "gpt-4o-mini");
        assert_eq!(config.search.provider, SearchBackend::DuckDuckGo);
        assert_eq!(config.research.stage_timeout_secs, 120);
    }

    #[test]
    fn test_load_workspace_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg_dir = dir.path().join(".sleuth");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(
            cfg_dir.join("config.toml"),
            "[research]\nsearch_concurrency = 2\nstage_timeout_secs = 15\n",
        )
        .unwrap();

        let config = load_config(Some(dir.path()), None).unwrap();
        assert_eq!(config.research.search_concurrency, 2);
        assert_eq!(config.research.stage_timeout_secs, 15);
        assert!(config_exists(Some(dir.path())));
    }

    fn write_workspace_config(dir: &Path, body: &str) {
        let cfg_dir = dir.join(".sleuth");
        std::fs::create_dir_all(&cfg_dir).unwrap();
        std::fs::write(cfg_dir.join("config.toml"), body).unwrap();
    }

    #[test]
    fn test_malformed_toml_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        write_workspace_config(dir.path(), "[research\nsearch_concurrency = 2\n");
        let err = load_config(Some(dir.path()), None).unwrap_err();
        assert!(
            matches!(err, SleuthError::Config(ConfigError::ParseError { .. })),
            "{err:?}"
        );
    }

    #[test]
    fn test_wrong_value_type_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        write_workspace_config(dir.path(), "[research]\nsearch_concurrency = \"many\"\n");
        let err = load_config(Some(dir.path()), None).unwrap_err();
        assert!(
            matches!(err, SleuthError::Config(ConfigError::Invalid { .. })),
            "{err:?}"
        );
        assert!(err.to_string().contains("search_concurrency"));
    }

    #[test]
    fn test_overrides_win() {
        let mut overrides = SleuthConfig::default();
        overrides.llm.model = "override-model".into();
        let config = load_config(None, Some(&overrides)).unwrap();
        assert_eq!(config.llm.model, "override-model");
    }
}
