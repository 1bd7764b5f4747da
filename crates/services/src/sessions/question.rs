use std::fmt;

use chrono::{DateTime, Utc};

use assess_core::Clock;
use assess_core::catalog::default_questions;
use assess_core::model::{
    CapturedAnswer, CompletionTrigger, IntegrityFlag, IntegritySignal, Question, ResponseRecord,
    SessionId, Stage,
};

use super::driver::SessionSnapshot;
use super::lifecycle::{PendingEvaluation, SessionCore};
use crate::error::SessionError;
use crate::evaluator::{Evaluation, Evaluator, ItemKind};
use crate::report::AssessmentReport;

/// Input accepted by the free-text answer box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerInput {
    /// Replace the draft with what is now in the box.
    Typed(String),
    /// Text pasted into the box; appended to the draft and flagged.
    Pasted(String),
}

/// Open-ended question session: one free-text answer per question.
pub struct QuestionSession {
    core: SessionCore<Question>,
    draft: String,
}

impl QuestionSession {
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the list is empty or ids repeat.
    pub fn new(questions: Vec<Question>, clock: Clock) -> Result<Self, SessionError> {
        Ok(Self {
            core: SessionCore::new(questions, clock)?,
            draft: String::new(),
        })
    }

    /// Session over the built-in five Excel questions.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Catalog` if the built-in catalog is invalid.
    pub fn with_default_questions(clock: Clock) -> Result<Self, SessionError> {
        Self::new(default_questions(), clock)
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
    pub fn questions(&self) -> &[Question] {
        self.core.items()
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.core.current_index()
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.core.current_item()
    }

    #[must_use]
    pub fn draft(&self) -> &str {
        &self.draft
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

    /// Report data, available once every question has been scored.
    #[must_use]
    pub fn report(&self) -> Option<AssessmentReport> {
        self.core.report()
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.core.snapshot(None)
    }

    pub fn set_credential(&mut self, raw: &str) -> bool {
        self.core.set_credential(raw)
    }

    /// Leave the welcome stage.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::MissingCredential` without an API key and
    /// `SessionError::AlreadyStarted` outside the welcome stage.
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.core.start()?;
        self.draft.clear();
        Ok(())
    }

    /// Update the answer draft.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotActive` outside the active stage.
    pub fn apply_input(&mut self, input: AnswerInput) -> Result<(), SessionError> {
        self.core.ensure_active()?;
        match input {
            AnswerInput::Typed(text) => self.draft = text,
            AnswerInput::Pasted(text) => {
                self.core.record_integrity(IntegritySignal::Paste);
                self.draft.push_str(&text);
            }
        }
        Ok(())
    }

    pub fn record_integrity(&mut self, signal: IntegritySignal) -> bool {
        self.core.record_integrity(signal)
    }

    /// Capture the draft for the current question and raise the loading guard.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::EmptyAnswer` for a blank draft,
    /// `SessionError::EvaluationPending` while a previous submit is in flight and
    /// `SessionError::NotActive` outside the active stage.
    pub fn begin_submit(&mut self) -> Result<PendingEvaluation, SessionError> {
        self.core.ensure_active()?;
        if self.core.is_loading() {
            return Err(SessionError::EvaluationPending);
        }
        if self.draft.trim().is_empty() {
            return Err(SessionError::EmptyAnswer);
        }
        self.core.begin(
            ItemKind::Question,
            CapturedAnswer::Text(self.draft.clone()),
            CompletionTrigger::Submitted,
            None,
        )
    }

    /// Record the evaluator's verdict and move on.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::StaleEvaluation` when `pending` no longer matches
    /// the current question (for example after a reset).
    pub fn finish_completion(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<ResponseRecord, SessionError> {
        let record = self.core.finish(pending, evaluation)?.clone();
        self.draft.clear();
        Ok(record)
    }

    /// Submit the current answer and wait for its score.
    ///
    /// # Errors
    ///
    /// Same as [`QuestionSession::begin_submit`].
    pub async fn submit(&mut self, evaluator: &dyn Evaluator) -> Result<ResponseRecord, SessionError> {
        let pending = self.begin_submit()?;
        let evaluation = evaluator.evaluate(pending.request()).await;
        self.finish_completion(pending, evaluation)
    }

    /// Discard everything and return to the welcome stage.
    pub fn reset(&mut self) {
        self.core.reset();
        self.draft.clear();
    }
}

impl fmt::Debug for QuestionSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QuestionSession")
            .field("core", &self.core)
            .field("draft_len", &self.draft.len())
            .finish()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
