//! Iterative research loop.
//!
//! Runs a bounded pipeline:
//! 1. **Clarify** - five questions about the topic
//! 2. **Plan** - a goal sentence and five initial queries
//! 3. **Search** - one result per query, in submission order
//! 4. **Evaluate** - a fresh sufficiency verdict each round
//! 5. **Supplement** - new queries while insufficient, up to `MAX_ROUNDS`
//! 6. **Report** - a cited report over everything collected
//!
//! Each stage makes one capability call and, apart from supplementing,
//! falls back to a deterministic result when that call fails.

pub mod citations;
pub mod clarify;
pub mod controller;
pub mod engine;
pub mod evaluate;
pub mod guard;
pub mod mock;
pub mod parse;
pub mod plan;
pub mod ports;
pub mod records;
pub mod report;
pub mod retrieval;
pub mod session;
pub mod supplement;

pub use controller::ResearchController;
pub use engine::{MAX_ROUNDS, ResearchEngine};
pub use plan::ResearchPlan;
pub use ports::{LlmTextGenerator, SearchProvider, TextGenerator};
pub use records::{CollectedData, SearchResult};
pub use session::{
    NoOpResearchCallback, RecordingCallback, ResearchCallback, ResearchOutcome, ResearchPhase,
    Session, TerminationReason,
};
