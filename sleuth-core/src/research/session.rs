//! Research session state machine and progress callbacks.
//!
//! A `Session` is an explicit value owned by whoever drives it (normally the
//! `ResearchController`). Phase changes go through `transition`, which
//! rejects anything outside the lifecycle
//! `Init → AwaitingAnswers → GoalDerived → Searching(r) → Evaluated(r) →
//! {Searching(r+1) | Reporting} → Done`, with `Cancelled` reachable from any
//! unfinished phase.

use super::engine::MAX_ROUNDS;
use super::plan::ResearchPlan;
use super::records::{CollectedData, SearchResult};
use crate::error::SessionError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Current phase of a research session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case", tag = "phase")]
pub enum ResearchPhase {
    /// Topic accepted, questions not yet asked.
    Init,
    /// Clarifying questions issued.
    AwaitingAnswers,
    /// Goal and initial queries fixed.
    GoalDerived,
    /// Executing the query batch of a round.
    Searching { round: usize },
    /// Sufficiency judged for a round.
    Evaluated { round: usize },
    /// Writing the final report.
    Reporting,
    Done,
    Cancelled,
}

impl ResearchPhase {
    fn can_transition(self, to: ResearchPhase) -> bool {
        use ResearchPhase::*;
        match (self, to) {
            (Done | Cancelled, _) => false,
            (_, Cancelled) => true,
            (Init, AwaitingAnswers) => true,
            (AwaitingAnswers, GoalDerived) => true,
            (GoalDerived, Searching { round }) => round == 0,
            (Searching { round: a }, Evaluated { round: b }) => a == b,
            (Evaluated { round: a }, Searching { round: b }) => b == a + 1 && b <= MAX_ROUNDS,
            (Evaluated { .. }, Reporting) => true,
            (Reporting, Done) => true,
            _ => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, ResearchPhase::Done | ResearchPhase::Cancelled)
    }
}

impl fmt::Display for ResearchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResearchPhase::Init => write!(f, "init"),
            ResearchPhase::AwaitingAnswers => write!(f, "awaiting_answers"),
            ResearchPhase::GoalDerived => write!(f, "goal_derived"),
            ResearchPhase::Searching { round } => write!(f, "searching({round})"),
            ResearchPhase::Evaluated { round } => write!(f, "evaluated({round})"),
            ResearchPhase::Reporting => write!(f, "reporting"),
            ResearchPhase::Done => write!(f, "done"),
            ResearchPhase::Cancelled => write!(f, "cancelled"),
        }
    }
}

/// Why the search phase ended.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TerminationReason {
    /// The evaluator judged the collected data sufficient.
    Satisfied,
    /// The last permitted round was still insufficient.
    RoundCapReached,
    /// Supplemental query generation failed.
    SupplementFailed,
}

/// Everything a finished session produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchOutcome {
    pub session_id: Uuid,
    pub topic: String,
    pub goal: String,
    /// The initial query batch.
    pub queries: Vec<String>,
    pub collected: Vec<SearchResult>,
    pub report: String,
    pub round_count: usize,
    /// One verdict per evaluation, in round order.
    pub verdicts: Vec<bool>,
    pub termination: TerminationReason,
}

/// State for one research session.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    topic: String,
    questions: Vec<String>,
    answers: Vec<String>,
    plan: Option<ResearchPlan>,
    pub(crate) collected: CollectedData,
    pub(crate) round_count: usize,
    pub(crate) verdicts: Vec<bool>,
    report: Option<String>,
    termination: Option<TerminationReason>,
    phase: ResearchPhase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Open a session for `topic`. Blank topics are rejected.
    pub fn new(topic: &str) -> Result<Self, SessionError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(SessionError::InvalidTopic);
        }
        let now = Utc::now();
        Ok(Self {
            id: Uuid::new_v4(),
            topic: topic.to_string(),
            questions: Vec::new(),
            answers: Vec::new(),
            plan: None,
            collected: CollectedData::new(),
            round_count: 0,
            verdicts: Vec::new(),
            report: None,
            termination: None,
            phase: ResearchPhase::Init,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn answers(&self) -> &[String] {
        &self.answers
    }

    pub fn plan(&self) -> Option<&ResearchPlan> {
        self.plan.as_ref()
    }

    pub fn collected(&self) -> &CollectedData {
        &self.collected
    }

    pub fn round_count(&self) -> usize {
        self.round_count
    }

    pub fn verdicts(&self) -> &[bool] {
        &self.verdicts
    }

    pub fn report(&self) -> Option<&str> {
        self.report.as_deref()
    }

    pub fn phase(&self) -> ResearchPhase {
        self.phase
    }

    /// Move to `to`, or fail without changing anything.
    pub fn transition(&mut self, to: ResearchPhase) -> Result<(), SessionError> {
        if !self.phase.can_transition(to) {
            return Err(SessionError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: to.to_string(),
            });
        }
        self.phase = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) {
        if !self.phase.is_terminal() {
            self.phase = ResearchPhase::Cancelled;
            self.updated_at = Utc::now();
        }
    }

    pub fn set_questions(&mut self, questions: Vec<String>) -> Result<(), SessionError> {
        self.transition(ResearchPhase::AwaitingAnswers)?;
        self.questions = questions;
        Ok(())
    }

    /// Check answers against the issued questions without recording them.
    pub fn validate_answers(&self, answers: &[String]) -> Result<(), SessionError> {
        if self.phase != ResearchPhase::AwaitingAnswers {
            return Err(SessionError::InvalidStateTransition {
                from: self.phase.to_string(),
                to: ResearchPhase::GoalDerived.to_string(),
            });
        }
        if answers.len() != self.questions.len() {
            return Err(SessionError::AnswerCountMismatch {
                expected: self.questions.len(),
                got: answers.len(),
            });
        }
        if let Some(index) = answers.iter().position(|a| a.trim().is_empty()) {
            return Err(SessionError::EmptyAnswer { index: index + 1 });
        }
        Ok(())
    }

    /// Record answers and the plan derived from them.
    pub fn set_plan(
        &mut self,
        answers: Vec<String>,
        plan: ResearchPlan,
    ) -> Result<(), SessionError> {
        self.validate_answers(&answers)?;
        self.transition(ResearchPhase::GoalDerived)?;
        self.answers = answers.into_iter().map(|a| a.trim().to_string()).collect();
        self.plan = Some(plan);
        Ok(())
    }

    pub(crate) fn finish(
        &mut self,
        report: String,
        termination: TerminationReason,
    ) -> Result<(), SessionError> {
        self.transition(ResearchPhase::Done)?;
        self.report = Some(report);
        self.termination = Some(termination);
        Ok(())
    }

    /// The finished outcome, once the session reached `Done`.
    pub fn outcome(&self) -> Option<ResearchOutcome> {
        let plan = self.plan.as_ref()?;
        let report = self.report.clone()?;
        let termination = self.termination?;
        Some(ResearchOutcome {
            session_id: self.id,
            topic: self.topic.clone(),
            goal: plan.goal.clone(),
            queries: plan.queries.clone(),
            collected: self.collected.entries().to_vec(),
            report,
            round_count: self.round_count,
            verdicts: self.verdicts.clone(),
            termination,
        })
    }
}

/// Callback trait for progressive research UI updates.
pub trait ResearchCallback: Send + Sync {
    /// Called after every phase change.
    fn on_phase_change(&self, phase: &ResearchPhase);
    /// Called once per query, in submission order, as each result lands.
    fn on_query_complete(&self, round: usize, result: &SearchResult);
    /// Called after each evaluation.
    fn on_round_evaluated(&self, round: usize, verdict: bool, collected: usize);
}

/// No-op callback.
pub struct NoOpResearchCallback;

impl ResearchCallback for NoOpResearchCallback {
    fn on_phase_change(&self, _phase: &ResearchPhase) {}
    fn on_query_complete(&self, _round: usize, _result: &SearchResult) {}
    fn on_round_evaluated(&self, _round: usize, _verdict: bool, _collected: usize) {}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackEvent {
    Phase(ResearchPhase),
    QueryComplete { round: usize, query: String },
    RoundEvaluated { round: usize, verdict: bool, collected: usize },
}

/// Records every callback for later inspection.
#[derive(Default)]
pub struct RecordingCallback {
    events: Mutex<Vec<CallbackEvent>>,
}

impl RecordingCallback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CallbackEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn push(&self, event: CallbackEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

impl ResearchCallback for RecordingCallback {
    fn on_phase_change(&self, phase: &ResearchPhase) {
        self.push(CallbackEvent::Phase(*phase));
    }

    fn on_query_complete(&self, round: usize, result: &SearchResult) {
        self.push(CallbackEvent::QueryComplete {
            round,
            query: result.query.clone(),
        });
    }

    fn on_round_evaluated(&self, round: usize, verdict: bool, collected: usize) {
        self.push(CallbackEvent::RoundEvaluated {
            round,
            verdict,
            collected,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::plan::fallback_plan;
    use pretty_assertions::assert_eq;

    fn five(text: &str) -> Vec<String> {
        (1..=5).map(|i| format!("{text} {i}")).collect()
    }

    fn ready_session() -> Session {
        let mut session = Session::new("tidal power").unwrap();
        session.set_questions(five("question")).unwrap();
        session.set_plan(five("answer"), fallback_plan("tidal power")).unwrap();
        session
    }

    #[test]
    fn test_blank_topic_rejected() {
        assert_eq!(Session::new("   ").unwrap_err(), SessionError::InvalidTopic);
        assert_eq!(Session::new(" x ").unwrap().topic(), "x");
    }

    #[test]
    fn test_answer_validation() {
        let mut session = Session::new("t").unwrap();
        session.set_questions(five("q")).unwrap();

        let err = session.validate_answers(&five("a")[..3]).unwrap_err();
        assert_eq!(
            err,
            SessionError::AnswerCountMismatch {
                expected: 5,
                got: 3
            }
        );

        let mut answers = five("a");
        answers[2] = "  ".into();
        assert_eq!(
            session.validate_answers(&answers).unwrap_err(),
            SessionError::EmptyAnswer { index: 3 }
        );
        assert_eq!(session.phase(), ResearchPhase::AwaitingAnswers);
    }

    #[test]
    fn test_answers_before_questions_rejected() {
        let session = Session::new("t").unwrap();
        assert!(matches!(
            session.validate_answers(&five("a")),
            Err(SessionError::InvalidStateTransition { .. })
        ));
    }

    #[test]
    fn test_round_transitions() {
        let mut session = ready_session();
        session.transition(ResearchPhase::Searching { round: 0 }).unwrap();
        assert!(session.transition(ResearchPhase::Evaluated { round: 1 }).is_err());
        session.transition(ResearchPhase::Evaluated { round: 0 }).unwrap();
        assert!(session.transition(ResearchPhase::Searching { round: 2 }).is_err());
        session.transition(ResearchPhase::Searching { round: 1 }).unwrap();
        session.transition(ResearchPhase::Evaluated { round: 1 }).unwrap();
        session.transition(ResearchPhase::Reporting).unwrap();
        session.finish("report".into(), TerminationReason::Satisfied).unwrap();
        assert_eq!(session.phase(), ResearchPhase::Done);
        assert!(session.transition(ResearchPhase::Cancelled).is_err());
    }

    #[test]
    fn test_round_cap_enforced_by_transitions() {
        let mut session = ready_session();
        session.transition(ResearchPhase::Searching { round: 0 }).unwrap();
        for round in 0..MAX_ROUNDS {
            session.transition(ResearchPhase::Evaluated { round }).unwrap();
            session
                .transition(ResearchPhase::Searching { round: round + 1 })
                .unwrap();
        }
        session
            .transition(ResearchPhase::Evaluated { round: MAX_ROUNDS })
            .unwrap();
        let err = session
            .transition(ResearchPhase::Searching {
                round: MAX_ROUNDS + 1,
            })
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::InvalidStateTransition {
                from: "evaluated(3)".into(),
                to: "searching(4)".into(),
            }
        );
    }

    #[test]
    fn test_outcome_only_when_done() {
        let mut session = ready_session();
        assert!(session.outcome().is_none());
        session.transition(ResearchPhase::Searching { round: 0 }).unwrap();
        session.transition(ResearchPhase::Evaluated { round: 0 }).unwrap();
        session.transition(ResearchPhase::Reporting).unwrap();
        session
            .finish("text".into(), TerminationReason::RoundCapReached)
            .unwrap();
        let outcome = session.outcome().unwrap();
        assert_eq!(outcome.topic, "tidal power");
        assert_eq!(outcome.queries.len(), 5);
        assert_eq!(outcome.termination, TerminationReason::RoundCapReached);
    }

    #[test]
    fn test_cancel_is_sticky() {
        let mut session = ready_session();
        session.cancel();
        assert_eq!(session.phase(), ResearchPhase::Cancelled);
        assert!(session.transition(ResearchPhase::Searching { round: 0 }).is_err());
    }

    #[test]
    fn test_phase_serializes_with_round() {
        let json = serde_json::to_value(ResearchPhase::Searching { round: 2 }).unwrap();
        assert_eq!(json, serde_json::json!({"phase": "searching", "round": 2}));
    }

    #[test]
    fn test_recording_callback() {
        let cb = RecordingCallback::new();
        cb.on_phase_change(&ResearchPhase::Reporting);
        cb.on_round_evaluated(0, true, 5);
        assert_eq!(
            cb.events(),
            vec![
                CallbackEvent::Phase(ResearchPhase::Reporting),
                CallbackEvent::RoundEvaluated {
                    round: 0,
                    verdict: true,
                    collected: 5
                },
            ]
        );
    }
}
