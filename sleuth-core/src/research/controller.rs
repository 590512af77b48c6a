//! Session control surface: start, answer, run, reset.
//!
//! The controller owns at most one `Session`. Every mutating call takes the
//! session lock without waiting, so a second caller while one is in flight
//! gets `SessionError::AlreadyBusy`.

use super::engine::{ResearchEngine, cancellable};
use super::plan::ResearchPlan;
use super::session::{ResearchOutcome, ResearchPhase, Session};
use crate::error::SessionError;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct ResearchController {
    engine: Arc<ResearchEngine>,
    session: Mutex<Option<Session>>,
    cancel: StdMutex<CancellationToken>,
}

impl ResearchController {
    pub fn new(engine: Arc<ResearchEngine>) -> Self {
        Self {
            engine,
            session: Mutex::new(None),
            cancel: StdMutex::new(CancellationToken::new()),
        }
    }

    fn claim(&self) -> Result<MutexGuard<'_, Option<Session>>, SessionError> {
        self.session.try_lock().map_err(|_| SessionError::AlreadyBusy)
    }

    /// Fix the operation's token, then claim the session. A cancel that lands
    /// after the token is taken always reaches the operation.
    fn begin(
        &self,
    ) -> Result<(MutexGuard<'_, Option<Session>>, CancellationToken), SessionError> {
        let cancel = self.live_token();
        let slot = self.claim()?;
        Ok((slot, cancel))
    }

    fn token(&self) -> CancellationToken {
        self.cancel
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The current token, replaced first if an earlier cancel consumed it.
    fn live_token(&self) -> CancellationToken {
        let mut guard = self.cancel.lock().unwrap_or_else(|e| e.into_inner());
        if guard.is_cancelled() {
            *guard = CancellationToken::new();
        }
        guard.clone()
    }

    /// Open a session for `topic` and return its five clarifying questions.
    /// Any previous session is discarded.
    pub async fn start_session(&self, topic: &str) -> Result<Vec<String>, SessionError> {
        let (mut slot, cancel) = self.begin()?;
        let mut session = Session::new(topic)?;
        let questions = cancellable(&cancel, self.engine.clarify(session.topic())).await?;
        session.set_questions(questions.clone())?;
        info!(session = %session.id, topic = %session.topic(), "Research session started");
        *slot = Some(session);
        Ok(questions)
    }

    /// Record answers and derive the goal and initial queries.
    pub async fn submit_answers(&self, answers: Vec<String>) -> Result<ResearchPlan, SessionError> {
        let (mut slot, cancel) = self.begin()?;
        let session = slot.as_mut().ok_or(SessionError::NoActiveSession)?;
        session.validate_answers(&answers)?;
        let plan = cancellable(
            &cancel,
            self.engine
                .plan(session.topic(), session.questions(), &answers),
        )
        .await?;
        session.set_plan(answers, plan.clone())?;
        Ok(plan)
    }

    /// Run the research loop. A finished session returns its stored outcome.
    pub async fn run_research(&self) -> Result<ResearchOutcome, SessionError> {
        let (mut slot, cancel) = self.begin()?;
        let session = slot.as_mut().ok_or(SessionError::NoActiveSession)?;
        if let Some(outcome) = session.outcome() {
            return Ok(outcome);
        }
        self.engine.run(session, &cancel).await
    }

    /// Cancel any in-flight call without discarding the session.
    pub fn cancel(&self) {
        self.token().cancel();
    }

    /// Cancel in-flight work, wait for it to stop, and discard the session.
    pub async fn reset(&self) {
        self.cancel();
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            info!(session = %session.id, "Research session reset");
        }
    }

    pub fn is_busy(&self) -> bool {
        self.session.try_lock().is_err()
    }

    /// Phase of the current session. Waits for any in-flight call.
    pub async fn phase(&self) -> Option<ResearchPhase> {
        self.session.lock().await.as_ref().map(Session::phase)
    }

    /// A copy of the current session. Waits for any in-flight call.
    pub async fn snapshot(&self) -> Option<Session> {
        self.session.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResearchConfig;
    use crate::research::mock::{ScriptedGenerator, ScriptedSearch};
    use crate::research::plan::fallback_plan;

    fn controller(generator: ScriptedGenerator) -> ResearchController {
        let engine = ResearchEngine::new(
            Arc::new(generator),
            Arc::new(ScriptedSearch::new()),
            ResearchConfig::default(),
        );
        ResearchController::new(Arc::new(engine))
    }

    fn answers() -> Vec<String> {
        (1..=5).map(|i| format!("answer {i}")).collect()
    }

    #[tokio::test]
    async fn test_calls_without_session() {
        let controller = controller(ScriptedGenerator::new());
        assert_eq!(
            controller.submit_answers(answers()).await.unwrap_err(),
            SessionError::NoActiveSession
        );
        assert_eq!(
            controller.run_research().await.unwrap_err(),
            SessionError::NoActiveSession
        );
        assert_eq!(controller.phase().await, None);
    }

    #[tokio::test]
    async fn test_blank_topic_keeps_no_session() {
        let controller = controller(ScriptedGenerator::new());
        assert_eq!(
            controller.start_session("  ").await.unwrap_err(),
            SessionError::InvalidTopic
        );
        assert_eq!(controller.phase().await, None);
    }

    #[tokio::test]
    async fn test_run_before_answers_rejected() {
        let controller = controller(ScriptedGenerator::new());
        let questions = controller.start_session("geothermal").await.unwrap();
        assert_eq!(questions.len(), 5);
        assert!(matches!(
            controller.run_research().await.unwrap_err(),
            SessionError::InvalidStateTransition { .. }
        ));
        assert_eq!(controller.phase().await, Some(ResearchPhase::AwaitingAnswers));
    }

    #[tokio::test]
    async fn test_bad_answers_do_not_advance() {
        let controller = controller(ScriptedGenerator::new());
        controller.start_session("geothermal").await.unwrap();
        let err = controller
            .submit_answers(vec!["only one".into()])
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SessionError::AnswerCountMismatch {
                expected: 5,
                got: 1
            }
        );
        assert_eq!(controller.phase().await, Some(ResearchPhase::AwaitingAnswers));

        // The generator script is empty, so the plan falls back.
        let plan = controller.submit_answers(answers()).await.unwrap();
        assert_eq!(plan, fallback_plan("geothermal"));
        assert_eq!(controller.phase().await, Some(ResearchPhase::GoalDerived));
    }

    #[tokio::test]
    async fn test_cancel_after_begin_reaches_operation() {
        let controller = controller(ScriptedGenerator::new());
        let (slot, token) = controller.begin().unwrap();
        controller.cancel();
        assert!(token.is_cancelled());
        drop(slot);
    }

    #[tokio::test]
    async fn test_idle_cancel_does_not_poison_next_operation() {
        let controller = controller(ScriptedGenerator::new());
        controller.cancel();
        let (_slot, token) = controller.begin().unwrap();
        assert!(!token.is_cancelled());
    }

    #[tokio::test]
    async fn test_busy_begin_keeps_running_token_cancelled() {
        let controller = controller(ScriptedGenerator::new());
        let (slot, running) = controller.begin().unwrap();
        controller.cancel();
        assert_eq!(controller.begin().unwrap_err(), SessionError::AlreadyBusy);
        assert!(running.is_cancelled());
        drop(slot);
    }

    #[tokio::test]
    async fn test_reset_discards_session() {
        let controller = controller(ScriptedGenerator::new());
        controller.start_session("geothermal").await.unwrap();
        controller.reset().await;
        assert_eq!(controller.phase().await, None);
        assert!(!controller.is_busy());
    }
}
