//! # Sleuth Core
//!
//! Core library for the Sleuth research assistant.
//! Provides the research loop (stages, session state machine, engine and
//! controller), the LLM interface, search backends, and configuration.

pub mod brain;
pub mod config;
pub mod error;
pub mod providers;
pub mod research;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use brain::{LlmProvider, MockLlmProvider};
pub use config::{SleuthConfig, load_config};
pub use error::{ConfigError, LlmError, Result, ServiceError, SessionError, SleuthError};
pub use research::{
    CollectedData, MAX_ROUNDS, ResearchCallback, ResearchController, ResearchEngine,
    ResearchOutcome, ResearchPhase, ResearchPlan, SearchResult, TerminationReason,
};
pub use types::{CompletionRequest, CompletionResponse, Message, Role, TokenUsage};
