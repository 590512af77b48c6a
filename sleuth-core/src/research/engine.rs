//! Research engine: drives the stages over a `Session`.
//!
//! Every capability call goes through a `CallPolicy` (deadline plus optional
//! retry), so a hung backend degrades into the stage's fallback instead of
//! stalling the loop.

use super::clarify::derive_questions;
use super::evaluate::evaluate_sufficiency;
use super::guard::{CallPolicy, GuardedGenerator, GuardedSearch};
use super::plan::{ResearchPlan, derive_plan};
use super::ports::{LlmTextGenerator, SearchProvider, TextGenerator};
use super::records::SearchResult;
use super::report::synthesize_report;
use super::retrieval::execute_search;
use super::session::{
    NoOpResearchCallback, ResearchCallback, ResearchOutcome, ResearchPhase, Session,
    TerminationReason,
};
use super::supplement::generate_supplemental_queries;
use crate::config::{ResearchConfig, SleuthConfig};
use crate::error::{SessionError, SleuthError};
use crate::providers::create_provider;
use crate::search::create_search_provider;
use futures::StreamExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Supplemental rounds allowed after the initial search round.
pub const MAX_ROUNDS: usize = 3;

/// The research engine that sequences the stages.
pub struct ResearchEngine {
    generator: Arc<dyn TextGenerator>,
    fast_generator: Arc<dyn TextGenerator>,
    search: Arc<dyn SearchProvider>,
    config: ResearchConfig,
    policy: CallPolicy,
    callback: Arc<dyn ResearchCallback>,
}

impl ResearchEngine {
    /// Create an engine over raw ports. The same generator serves every
    /// stage until `with_fast_generator` is called.
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        search: Arc<dyn SearchProvider>,
        config: ResearchConfig,
    ) -> Self {
        let policy = CallPolicy::new(
            Duration::from_secs(config.stage_timeout_secs),
            config.retry.clone(),
        );
        let generator: Arc<dyn TextGenerator> =
            Arc::new(GuardedGenerator::new(generator, policy.clone()));
        Self {
            fast_generator: generator.clone(),
            generator,
            search: Arc::new(GuardedSearch::new(search, policy.clone())),
            config,
            policy,
            callback: Arc::new(NoOpResearchCallback),
        }
    }

    /// Build the engine from configuration: the main model for every stage
    /// except clarifying questions, which use the fast model.
    pub fn from_config(config: &SleuthConfig) -> Result<Self, SleuthError> {
        let provider = create_provider(&config.llm)?;
        let main = LlmTextGenerator::new(provider.clone())
            .with_model(&config.llm.model)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens);
        let fast = LlmTextGenerator::new(provider)
            .with_model(&config.llm.fast_model)
            .with_temperature(config.llm.temperature)
            .with_max_tokens(config.llm.max_tokens);
        let search = create_search_provider(&config.search, &config.llm)?;
        info!(
            model = %config.llm.model,
            fast_model = %config.llm.fast_model,
            search = search.name(),
            "Research engine configured"
        );
        Ok(Self::new(Arc::new(main), search, config.research.clone())
            .with_fast_generator(Arc::new(fast)))
    }

    /// Use a separate generator for clarifying questions.
    pub fn with_fast_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.fast_generator = Arc::new(GuardedGenerator::new(generator, self.policy.clone()));
        self
    }

    pub fn with_callback(mut self, callback: Arc<dyn ResearchCallback>) -> Self {
        self.callback = callback;
        self
    }

    pub fn config(&self) -> &ResearchConfig {
        &self.config
    }

    fn system(&self) -> &str {
        &self.config.system_prompt
    }

    fn enter(&self, session: &mut Session, phase: ResearchPhase) -> Result<(), SessionError> {
        session.transition(phase)?;
        info!(session = %session.id, phase = %phase, "Research phase changed");
        self.callback.on_phase_change(&phase);
        Ok(())
    }

    /// Exactly five clarifying questions for `topic`.
    pub async fn clarify(&self, topic: &str) -> Vec<String> {
        derive_questions(self.fast_generator.as_ref(), self.system(), topic).await
    }

    /// Goal and initial queries from the session's questions and answers.
    pub async fn plan(&self, topic: &str, questions: &[String], answers: &[String]) -> ResearchPlan {
        derive_plan(self.generator.as_ref(), self.system(), topic, questions, answers).await
    }

    /// Run one batch of queries on a bounded pool. Results come back in
    /// submission order, one per query.
    pub async fn search_batch(&self, round: usize, queries: &[String]) -> Vec<SearchResult> {
        let search = self.search.as_ref();
        let searches: Vec<_> = queries.iter().map(|query| execute_search(search, query)).collect();
        futures::stream::iter(searches)
            .buffered(self.config.search_concurrency.max(1))
            .inspect(|result| self.callback.on_query_complete(round, result))
            .collect::<Vec<_>>()
            .await
    }

    /// Drive a session from `GoalDerived` to `Done`.
    ///
    /// On cancellation the session moves to `Cancelled`; results appended by
    /// completed batches stay, the in-flight batch is discarded.
    pub async fn run(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, SessionError> {
        match self.drive(session, cancel).await {
            Err(SessionError::Cancelled) => {
                warn!(session = %session.id, collected = session.collected.len(), "Research cancelled");
                session.cancel();
                self.callback.on_phase_change(&ResearchPhase::Cancelled);
                Err(SessionError::Cancelled)
            }
            other => other,
        }
    }

    async fn drive(
        &self,
        session: &mut Session,
        cancel: &CancellationToken,
    ) -> Result<ResearchOutcome, SessionError> {
        let Some(plan) = session.plan().cloned() else {
            return Err(SessionError::InvalidStateTransition {
                from: session.phase().to_string(),
                to: ResearchPhase::Searching { round: 0 }.to_string(),
            });
        };

        let mut pending = plan.queries.clone();
        let termination = loop {
            let round = session.round_count;
            self.enter(session, ResearchPhase::Searching { round })?;
            let batch = cancellable(cancel, self.search_batch(round, &pending)).await?;
            session.collected.extend(batch);

            let verdict = cancellable(
                cancel,
                evaluate_sufficiency(
                    self.generator.as_ref(),
                    self.system(),
                    &plan.goal,
                    &session.collected,
                ),
            )
            .await?;
            session.verdicts.push(verdict);
            self.enter(session, ResearchPhase::Evaluated { round })?;
            self.callback
                .on_round_evaluated(round, verdict, session.collected.len());

            if verdict {
                break TerminationReason::Satisfied;
            }
            if round >= MAX_ROUNDS {
                info!(round, "Round cap reached with insufficient data");
                break TerminationReason::RoundCapReached;
            }

            session.round_count += 1;
            let next = cancellable(
                cancel,
                generate_supplemental_queries(
                    self.generator.as_ref(),
                    self.system(),
                    &plan.goal,
                    &session.collected,
                ),
            )
            .await?;
            match next {
                Ok(queries) => {
                    info!(round = session.round_count, count = queries.len(), "Supplemental queries ready");
                    pending = queries;
                }
                Err(e) => {
                    warn!(
                        stage = "supplement",
                        round = session.round_count,
                        error = %e,
                        "Supplemental query generation failed, ending search phase"
                    );
                    break TerminationReason::SupplementFailed;
                }
            }
        };

        self.enter(session, ResearchPhase::Reporting)?;
        let report = cancellable(
            cancel,
            synthesize_report(
                self.generator.as_ref(),
                self.system(),
                &plan.goal,
                &session.collected,
            ),
        )
        .await?;
        session.finish(report, termination)?;
        self.callback.on_phase_change(&ResearchPhase::Done);
        info!(
            session = %session.id,
            rounds = session.round_count,
            collected = session.collected.len(),
            termination = ?termination,
            "Research complete"
        );

        session
            .outcome()
            .ok_or(SessionError::NoActiveSession)
    }

    /// Run the whole pipeline for answers collected elsewhere.
    pub async fn conduct(
        &self,
        topic: &str,
        questions: Vec<String>,
        answers: Vec<String>,
    ) -> Result<ResearchOutcome, SessionError> {
        let mut session = Session::new(topic)?;
        session.set_questions(questions)?;
        session.validate_answers(&answers)?;
        let plan = self.plan(session.topic(), session.questions(), &answers).await;
        session.set_plan(answers, plan)?;
        self.run(&mut session, &CancellationToken::new()).await
    }
}

/// Await `future` unless `cancel` fires first.
pub(crate) async fn cancellable<F: Future>(
    cancel: &CancellationToken,
    future: F,
) -> Result<F::Output, SessionError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SessionError::Cancelled),
        output = future => Ok(output),
    }
}
