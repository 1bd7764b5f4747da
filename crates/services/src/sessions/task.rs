use std::fmt;

use chrono::{DateTime, Duration, Utc};

use assess_core::Clock;
use assess_core::catalog::default_tasks;
use assess_core::model::{
    CapturedAnswer, CellAction, CellRef, CompletionTrigger, Grid, IntegrityFlag, IntegritySignal,
    ResponseRecord, SessionId, Stage, Task,
};

use super::countdown::{Countdown, CountdownTick};
use super::driver::SessionSnapshot;
use super::lifecycle::{PendingEvaluation, SessionCore};
use crate::error::SessionError;
use crate::evaluator::{Evaluation, Evaluator, ItemKind};
use crate::report::AssessmentReport;

/// Input accepted by the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellInput {
    Edit { cell: CellRef, value: String },
    /// Clipboard content pasted into a cell; applied as an edit and flagged.
    Paste { cell: CellRef, value: String },
}

/// Timed spreadsheet-task session over an in-memory grid.
///
/// Every edit is appended to a session-wide action log. When a task closes, the
/// actions logged since that task opened form the captured answer.
pub struct SpreadsheetTaskSession {
    core: SessionCore<Task>,
    seed: Grid,
    grid: Grid,
    actions: Vec<CellAction>,
    /// Log index where the current task's window begins.
    window_start: usize,
    countdown: Countdown,
}

impl SpreadsheetTaskSession {
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the list is empty or ids repeat.
    pub fn new(tasks: Vec<Task>, clock: Clock) -> Result<Self, SessionError> {
        Self::with_grid(tasks, Grid::sample_sales(), clock)
    }

    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the list is empty or ids repeat.
    pub fn with_grid(tasks: Vec<Task>, seed: Grid, clock: Clock) -> Result<Self, SessionError> {
        Ok(Self {
            core: SessionCore::new(tasks, clock)?,
            grid: seed.clone(),
            seed,
            actions: Vec::new(),
            window_start: 0,
            countdown: Countdown::new(),
        })
    }

    /// Session over the built-in tasks and the sample sales sheet.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the built-in catalog is invalid.
    pub fn with_default_tasks(clock: Clock) -> Result<Self, SessionError> {
        Self::new(default_tasks(), clock)
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.core.id()
    }

    #[must_use]
    pub fn stage(&self) -> Stage {
        self.core.stage()
    }

    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        self.core.items()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.core.current_index()
    }

    #[must_use]
    pub fn current_task(&self) -> Option<&Task> {
        self.core.current_item()
    }

    #[must_use]
    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    #[must_use]
    pub fn actions(&self) -> &[CellAction] {
        &self.actions
    }

    #[must_use]
    pub fn results(&self) -> &[ResponseRecord] {
        self.core.results()
    }

    #[must_use]
    pub fn flags(&self) -> &[IntegrityFlag] {
        self.core.flags()
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.core.is_loading()
    }

    #[must_use]
    pub fn has_credential(&self) -> bool {
        self.core.has_credential()
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.core.started_at()
    }

    /// Seconds left on the current task; `None` outside the active stage.
    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        (self.core.stage() == Stage::Active).then(|| self.countdown.remaining_secs())
    }

    #[must_use]
    pub fn report(&self) -> Option<AssessmentReport> {
        self.core.report()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.snapshot(self.remaining_secs())
    }

    pub fn set_credential(&mut self, raw: &str) -> bool {
        self.core.set_credential(raw)
    }

    /// Leave the welcome stage and start the first task's countdown.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCredential` without an API key and
    /// `SessionError::AlreadyStarted` outside the welcome stage.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.core.start()?;
        self.window_start = self.actions.len();
        self.restart_countdown();
        Ok(())
    }

    /// Write a value into the grid and log the action.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the active stage and
    /// `SessionError::Grid` for references outside the grid.
    pub fn edit_cell(
        &mut self,
        cell: CellRef,
        value: impl Into<String>,
    ) -> Result<&CellAction, SessionError> {
        self.core.ensure_active()?;
        let action = self.grid.set(cell, value, self.core.now())?;
        tracing::debug!(
            session_id = %self.core.id(),
            cell = %action.cell,
            kind = ?action.kind,
            "cell edited"
        );
        let index = self.actions.len();
        self.actions.push(action);
        Ok(&self.actions[index])
    }

    /// # Errors
    ///
    /// Same as [`SpreadsheetTaskSession::edit_cell`].
    pub fn apply_input(&mut self, input: CellInput) -> Result<(), SessionError> {
        match input {
            CellInput::Edit { cell, value } => {
                self.edit_cell(cell, value)?;
            }
            CellInput::Paste { cell, value } => {
                self.core.record_integrity(IntegritySignal::Paste);
                self.edit_cell(cell, value)?;
            }
        }
        Ok(())
    }

    pub fn record_integrity(&mut self, signal: IntegritySignal) -> bool {
        self.core.record_integrity(signal)
    }

    /// One-second countdown tick. Returns the expiry capture when time runs out.
    ///
    /// Yields nothing if a submission for the current task is already being
    /// evaluated, so expiry and explicit submit never both complete a task.
    pub fn tick(&mut self) -> Option<PendingEvaluation> {
        if self.core.stage() != Stage::Active {
            return None;
        }
        let tick = self.countdown.tick();
        if tick != CountdownTick::Idle {
            self.core.advance_clock(Duration::seconds(1));
        }
        match tick {
            CountdownTick::Expired => {
                tracing::info!(
                    session_id = %self.core.id(),
                    item_index = self.core.current_index(),
                    "task time expired"
                );
                self.capture(CompletionTrigger::Expired).ok()
            }
            CountdownTick::Running { .. } | CountdownTick::Idle => None,
        }
    }

    /// Capture the current task's actions and raise the loading guard.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EvaluationPending` while the task is already being
    /// evaluated and `SessionError::NotActive` outside the active stage.
    pub fn begin_submit(&mut self) -> Result<PendingEvaluation, SessionError> {
        self.capture(CompletionTrigger::Submitted)
    }

    fn capture(&mut self, trigger: CompletionTrigger) -> Result<PendingEvaluation, SessionError> {
        self.core.ensure_active()?;
        if self.core.is_loading() {
            return Err(SessionError::EvaluationPending);
        }
        let captured = self
            .actions
            .get(self.window_start..)
            .unwrap_or_default()
            .to_vec();
        let elapsed = u64::from(self.countdown.elapsed_secs());

        self.core.begin(
            ItemKind::SpreadsheetTask,
            CapturedAnswer::Actions(captured),
            trigger,
            Some(elapsed),
        )
    }

    /// Record the evaluator's verdict, then restart the countdown for the next
    /// task or stop it when the session is finished.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StaleEvaluation` when `pending` no longer matches
    /// the current task.
    pub fn finish_completion(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<ResponseRecord, SessionError> {
        let record = self.core.finish(pending, evaluation)?.clone();
        self.window_start = self.actions.len();
        self.restart_countdown();
        Ok(record)
    }

    /// Submit the current task and wait for its score.
    ///
    /// # Errors
    ///
    /// Same as [`SpreadsheetTaskSession::begin_submit`].
    pub async fn submit(&mut self, evaluator: &dyn Evaluator) -> Result<ResponseRecord, SessionError> {
        let pending = self.begin_submit()?;
        let evaluation = evaluator.evaluate(pending.request()).await;
        self.finish_completion(pending, evaluation)
    }

    /// Discard everything, reseed the grid and return to the welcome stage.
    pub fn reset(&mut self) {
        self.core.reset();
        self.grid = self.seed.clone();
        self.actions.clear();
        self.window_start = 0;
        self.countdown.stop();
    }

    fn restart_countdown(&mut self) {
        match self.core.current_item().map(Task::time_limit) {
            Some(limit) => self.countdown.restart(limit),
            None => self.countdown.stop(),
        }
    }
}

impl fmt::Debug for SpreadsheetTaskSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpreadsheetTaskSession")
            .field("core", &self.core)
            .field("actions_len", &self.actions.len())
            .field("countdown", &self.countdown)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
