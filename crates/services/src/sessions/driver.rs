use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinSet};
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use assess_core::model::{IntegrityCounts, IntegritySignal, ResponseRecord, SessionId, Stage};

use super::lifecycle::PendingEvaluation;
use super::progress::SessionProgress;
use super::question::{AnswerInput, QuestionSession};
use super::task::{CellInput, SpreadsheetTaskSession};
use crate::error::SessionError;
use crate::evaluator::{Evaluation, Evaluator};
use crate::report::AssessmentReport;

const COMMAND_BUFFER: usize = 32;
const TICK_PERIOD: Duration = Duration::from_secs(1);

/// Operations a session variant exposes to the driver loop.
pub trait AssessmentSession: Send + 'static {
    type Input: fmt::Debug + Send + 'static;

    fn id(&self) -> SessionId;
    fn stage(&self) -> Stage;
    fn set_credential(&mut self, raw: &str) -> bool;

    /// # Errors
    ///
    /// Returns `SessionError` when the session cannot leave the welcome stage.
    fn start(&mut self) -> Result<(), SessionError>;

    /// # Errors
    ///
    /// Returns `SessionError` when the input is rejected.
    fn apply_input(&mut self, input: Self::Input) -> Result<(), SessionError>;

    fn record_integrity(&mut self, signal: IntegritySignal) -> bool;

    /// # Errors
    ///
    /// Returns `SessionError` when nothing can be captured right now.
    fn begin_submit(&mut self) -> Result<PendingEvaluation, SessionError>;

    /// # Errors
    ///
    /// Returns `SessionError::StaleEvaluation` for results that no longer apply.
    fn finish_completion(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<ResponseRecord, SessionError>;

    /// One-second tick; returns a capture when a countdown expires.
    fn tick(&mut self) -> Option<PendingEvaluation> {
        None
    }

    fn uses_countdown(&self) -> bool {
        false
    }

    fn reset(&mut self);
    fn snapshot(&self) -> SessionSnapshot;
}

impl AssessmentSession for QuestionSession {
    type Input = AnswerInput;

    fn id(&self) -> SessionId {
        QuestionSession::id(self)
    }

    fn stage(&self) -> Stage {
        QuestionSession::stage(self)
    }

    fn set_credential(&mut self, raw: &str) -> bool {
        QuestionSession::set_credential(self, raw)
    }

    fn start(&mut self) -> Result<(), SessionError> {
        QuestionSession::start(self)
    }

    fn apply_input(&mut self, input: AnswerInput) -> Result<(), SessionError> {
        QuestionSession::apply_input(self, input)
    }

    fn record_integrity(&mut self, signal: IntegritySignal) -> bool {
        QuestionSession::record_integrity(self, signal)
    }

    fn begin_submit(&mut self) -> Result<PendingEvaluation, SessionError> {
        QuestionSession::begin_submit(self)
    }

    fn finish_completion(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<ResponseRecord, SessionError> {
        QuestionSession::finish_completion(self, pending, evaluation)
    }

    fn reset(&mut self) {
        QuestionSession::reset(self);
    }

    fn snapshot(&self) -> SessionSnapshot {
        QuestionSession::snapshot(self)
    }
}

impl AssessmentSession for SpreadsheetTaskSession {
    type Input = CellInput;

    fn id(&self) -> SessionId {
        SpreadsheetTaskSession::id(self)
    }

    fn stage(&self) -> Stage {
        SpreadsheetTaskSession::stage(self)
    }

    fn set_credential(&mut self, raw: &str) -> bool {
        SpreadsheetTaskSession::set_credential(self, raw)
    }

    fn start(&mut self) -> Result<(), SessionError> {
        SpreadsheetTaskSession::start(self)
    }

    fn apply_input(&mut self, input: CellInput) -> Result<(), SessionError> {
        SpreadsheetTaskSession::apply_input(self, input)
    }

    fn record_integrity(&mut self, signal: IntegritySignal) -> bool {
        SpreadsheetTaskSession::record_integrity(self, signal)
    }

    fn begin_submit(&mut self) -> Result<PendingEvaluation, SessionError> {
        SpreadsheetTaskSession::begin_submit(self)
    }

    fn finish_completion(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<ResponseRecord, SessionError> {
        SpreadsheetTaskSession::finish_completion(self, pending, evaluation)
    }

    fn tick(&mut self) -> Option<PendingEvaluation> {
        SpreadsheetTaskSession::tick(self)
    }

    fn uses_countdown(&self) -> bool {
        true
    }

    fn reset(&mut self) {
        SpreadsheetTaskSession::reset(self);
    }

    fn snapshot(&self) -> SessionSnapshot {
        SpreadsheetTaskSession::snapshot(self)
    }
}

/// User-facing events, applied in the order they are sent.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand<In> {
    SetCredential(String),
    Start,
    Input(In),
    Submit,
    Integrity(IntegritySignal),
    Reset,
}

/// Read-only view published after every event the driver handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub stage: Stage,
    pub item_index: usize,
    pub progress: SessionProgress,
    pub remaining_secs: Option<u32>,
    pub loading: bool,
    pub has_credential: bool,
    pub results: Vec<ResponseRecord>,
    pub flags: IntegrityCounts,
    /// Last rejected command, cleared by the next accepted one.
    pub last_error: Option<String>,
    pub report: Option<AssessmentReport>,
}

/// Cloneable front end of a running [`SessionDriver`].
#[derive(Debug)]
pub struct SessionHandle<In> {
    commands: mpsc::Sender<SessionCommand<In>>,
    snapshots: watch::Receiver<SessionSnapshot>,
}

impl<In> Clone for SessionHandle<In> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            snapshots: self.snapshots.clone(),
        }
    }
}

impl<In: Send> SessionHandle<In> {
    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn send(&self, command: SessionCommand<In>) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::DriverClosed)
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn set_credential(&self, raw: impl Into<String>) -> Result<(), SessionError> {
        self.send(SessionCommand::SetCredential(raw.into())).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn start(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Start).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn input(&self, input: In) -> Result<(), SessionError> {
        self.send(SessionCommand::Input(input)).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn submit(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Submit).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn integrity(&self, signal: IntegritySignal) -> Result<(), SessionError> {
        self.send(SessionCommand::Integrity(signal)).await
    }

    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` once the driver has stopped.
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Reset).await
    }

    /// Latest published snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Wait until a published snapshot satisfies `predicate`.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::DriverClosed` if the driver stops first.
    pub async fn wait_until(
        &mut self,
        predicate: impl FnMut(&SessionSnapshot) -> bool,
    ) -> Result<SessionSnapshot, SessionError> {
        self.snapshots
            .wait_for(predicate)
            .await
            .map(|snapshot| snapshot.clone())
            .map_err(|_| SessionError::DriverClosed)
    }
}

/// Build a driver and its handle. Spawn [`SessionDriver::run`] on a runtime.
pub fn channel<S: AssessmentSession>(
    session: S,
    evaluator: Arc<dyn Evaluator>,
) -> (SessionHandle<S::Input>, SessionDriver<S>) {
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(session.snapshot());
    let handle = SessionHandle {
        commands: command_tx,
        snapshots: snapshot_rx,
    };
    let driver = SessionDriver {
        session,
        evaluator,
        commands: command_rx,
        snapshots: snapshot_tx,
        evaluations: JoinSet::new(),
        awaiting: None,
        last_error: None,
    };
    (handle, driver)
}

/// Single owner of a session's mutable state.
///
/// Serializes user commands, countdown ticks and evaluator results so only one
/// of them touches the session at a time. Evaluations run as spawned tasks;
/// a reset aborts them and their results never land.
pub struct SessionDriver<S: AssessmentSession> {
    session: S,
    evaluator: Arc<dyn Evaluator>,
    commands: mpsc::Receiver<SessionCommand<S::Input>>,
    snapshots: watch::Sender<SessionSnapshot>,
    evaluations: JoinSet<Evaluation>,
    awaiting: Option<PendingEvaluation>,
    last_error: Option<String>,
}

impl<S: AssessmentSession> SessionDriver<S> {
    /// Process events until every handle is dropped and no evaluation is in
    /// flight, then hand the session back.
    pub async fn run(mut self) -> S {
        let mut ticker = time::interval_at(Instant::now() + TICK_PERIOD, TICK_PERIOD);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut commands_open = true;
        tracing::debug!(session_id = %self.session.id(), "session driver running");

        loop {
            if !commands_open && self.evaluations.is_empty() {
                break;
            }
            let ticking = self.session.uses_countdown() && self.session.stage() == Stage::Active;

            tokio::select! {
                command = self.commands.recv(), if commands_open => match command {
                    Some(command) => self.handle(command, &mut ticker).await,
                    None => commands_open = false,
                },
                Some(joined) = self.evaluations.join_next(), if !self.evaluations.is_empty() => {
                    self.resolve(joined, &mut ticker);
                }
                _ = ticker.tick(), if ticking => {
                    if let Some(pending) = self.session.tick() {
                        self.dispatch(pending);
                    }
                }
            }
            self.publish();
        }

        tracing::debug!(session_id = %self.session.id(), "session driver stopped");
        self.session
    }

    async fn handle(&mut self, command: SessionCommand<S::Input>, ticker: &mut Interval) {
        tracing::trace!(session_id = %self.session.id(), command = ?command, "session command");
        let result = match command {
            SessionCommand::SetCredential(raw) => {
                self.session.set_credential(&raw);
                Ok(())
            }
            SessionCommand::Start => {
                let started = self.session.start();
                if started.is_ok() {
                    ticker.reset();
                }
                started
            }
            SessionCommand::Input(input) => self.session.apply_input(input),
            SessionCommand::Submit => match self.session.begin_submit() {
                Ok(pending) => {
                    self.dispatch(pending);
                    Ok(())
                }
                Err(err) => Err(err),
            },
            SessionCommand::Integrity(signal) => {
                self.session.record_integrity(signal);
                Ok(())
            }
            SessionCommand::Reset => {
                self.evaluations.shutdown().await;
                self.awaiting = None;
                self.session.reset();
                Ok(())
            }
        };

        self.last_error = match result {
            Ok(()) => None,
            Err(err) => {
                tracing::debug!(session_id = %self.session.id(), error = %err, "command rejected");
                Some(err.to_string())
            }
        };
    }

    fn dispatch(&mut self, pending: PendingEvaluation) {
        let evaluator = Arc::clone(&self.evaluator);
        let request = pending.request().clone();
        self.evaluations
            .spawn(async move { evaluator.evaluate(&request).await });
        self.awaiting = Some(pending);
    }

    fn resolve(&mut self, joined: Result<Evaluation, JoinError>, ticker: &mut Interval) {
        let evaluation = match joined {
            Ok(evaluation) => evaluation,
            Err(err) if err.is_cancelled() => return,
            Err(err) => {
                tracing::warn!(session_id = %self.session.id(), error = %err, "evaluation task failed");
                Evaluation::transport_failed()
            }
        };
        let Some(pending) = self.awaiting.take() else {
            return;
        };

        match self.session.finish_completion(pending, evaluation) {
            Ok(record) => {
                tracing::info!(
                    session_id = %self.session.id(),
                    item_index = record.item_index,
                    score = record.score.value(),
                    "item completed"
                );
                ticker.reset();
            }
            Err(err) => {
                tracing::debug!(session_id = %self.session.id(), error = %err, "evaluation dropped");
            }
        }
    }

    fn publish(&self) {
        let mut snapshot = self.session.snapshot();
        snapshot.last_error.clone_from(&self.last_error);
        self.snapshots.send_replace(snapshot);
    }
}

impl<S: AssessmentSession + fmt::Debug> fmt::Debug for SessionDriver<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDriver")
            .field("session", &self.session)
            .field("in_flight", &self.evaluations.len())
            .field("awaiting", &self.awaiting.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assess_core::model::{
        CellRef, CompletionTrigger, Difficulty, ItemId, Question, Score, Task, Visibility,
    };
    use assess_core::time::fixed_clock;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use crate::evaluator::EvaluationRequest;

    struct FixedEvaluator {
        score: i64,
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FixedEvaluator {
        fn new(score: i64, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                score,
                delay,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl Evaluator for FixedEvaluator {
        async fn evaluate(&self, _request: &EvaluationRequest) -> Evaluation {
            self.calls.fetch_add(1, Ordering::SeqCst);
            time::sleep(self.delay).await;
            Evaluation::scored(Score::new(self.score).unwrap(), "fixed")
        }
    }

    fn questions(n: u32) -> QuestionSession {
        let items = (1..=n)
            .map(|i| Question::new(ItemId::new(i), format!("Q{i}"), format!("A{i}")))
            .collect();
        QuestionSession::new(items, fixed_clock()).unwrap()
    }

    fn tasks(limits: &[u32]) -> SpreadsheetTaskSession {
        let items = limits
            .iter()
            .zip(1u32..)
            .map(|(limit, id)| {
                Task::new(
                    ItemId::new(id),
                    format!("Task {id}"),
                    "=SUM(C2:C6)",
                    CellRef::new(2, 6),
                    *limit,
                    Difficulty::Beginner,
                )
            })
            .collect();
        SpreadsheetTaskSession::new(items, fixed_clock()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn question_flow_reaches_report() {
        let evaluator = FixedEvaluator::new(8, Duration::from_millis(200));
        let (mut handle, driver) = channel(questions(2), evaluator.clone());
        let task = tokio::spawn(driver.run());

        handle.set_credential("key").await.unwrap();
        handle.start().await.unwrap();
        for (done, answer) in ["first", "second"].into_iter().enumerate() {
            handle
                .input(AnswerInput::Typed(answer.to_string()))
                .await
                .unwrap();
            handle.submit().await.unwrap();
            // A second submit while loading is rejected.
            handle.submit().await.unwrap();
            let rejected = handle
                .wait_until(|s| s.loading && s.results.len() == done && s.last_error.is_some())
                .await
                .unwrap();
            assert_eq!(
                rejected.last_error.as_deref(),
                Some(SessionError::EvaluationPending.to_string().as_str())
            );
            assert_eq!(rejected.progress.remaining, 2 - done);
            handle
                .wait_until(|s| s.results.len() == done + 1)
                .await
                .unwrap();
        }

        let snapshot = handle.wait_until(|s| s.stage == Stage::Report).await.unwrap();
        assert_eq!(snapshot.results.len(), 2);
        assert_eq!(snapshot.progress, SessionProgress::new(2, 2, Stage::Report));
        assert_eq!(snapshot.report.unwrap().overall_score.value(), 8);
        assert_eq!(evaluator.calls.load(Ordering::SeqCst), 2);

        drop(handle);
        let session = task.await.unwrap();
        assert_eq!(session.stage(), Stage::Report);
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_credential_reports_error() {
        let (mut handle, driver) = channel(questions(1), FixedEvaluator::new(5, Duration::ZERO));
        tokio::spawn(driver.run());

        handle.start().await.unwrap();
        let snapshot = handle.wait_until(|s| s.last_error.is_some()).await.unwrap();
        assert_eq!(snapshot.stage, Stage::Welcome);
        assert!(!snapshot.has_credential);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_expiry_completes_tasks() {
        let (mut handle, driver) = channel(tasks(&[2, 3]), FixedEvaluator::new(4, Duration::ZERO));
        tokio::spawn(driver.run());

        handle.set_credential("key").await.unwrap();
        handle.start().await.unwrap();
        handle
            .integrity(IntegritySignal::VisibilityChanged(Visibility::Hidden))
            .await
            .unwrap();

        let snapshot = handle.wait_until(|s| s.stage == Stage::Report).await.unwrap();
        assert_eq!(snapshot.results.len(), 2);
        assert!(
            snapshot
                .results
                .iter()
                .all(|r| r.trigger == CompletionTrigger::Expired)
        );
        assert_eq!(snapshot.results[0].elapsed_secs, Some(2));
        assert_eq!(snapshot.results[1].elapsed_secs, Some(3));
        assert_eq!(snapshot.flags.tab_switches, 1);
        assert_eq!(snapshot.remaining_secs, None);
    }

    #[tokio::test(start_paused = true)]
    async fn reset_discards_in_flight_evaluation() {
        let evaluator = FixedEvaluator::new(9, Duration::from_secs(10));
        let (mut handle, driver) = channel(questions(1), evaluator);
        tokio::spawn(driver.run());

        handle.set_credential("key").await.unwrap();
        handle.start().await.unwrap();
        handle
            .input(AnswerInput::Typed("answer".into()))
            .await
            .unwrap();
        handle.submit().await.unwrap();
        let before = handle.wait_until(|s| s.loading).await.unwrap();

        handle.reset().await.unwrap();
        let after = handle
            .wait_until(|s| s.stage == Stage::Welcome)
            .await
            .unwrap();
        assert_ne!(after.session_id, before.session_id);
        assert!(after.has_credential);

        time::sleep(Duration::from_secs(30)).await;
        let latest = handle.snapshot();
        assert_eq!(latest.stage, Stage::Welcome);
        assert!(latest.results.is_empty());
        assert!(!latest.loading);
    }
}
