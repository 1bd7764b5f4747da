use std::fmt;

use chrono::{DateTime, Duration, Utc};

use assess_core::Clock;
use assess_core::catalog::validate_items;
use assess_core::model::{
    ApiKey, AssessmentItem, CapturedAnswer, CompletionTrigger, IntegrityFlag, IntegrityLog,
    IntegritySignal, ResponseRecord, SessionId, Stage,
};

use super::driver::SessionSnapshot;
use super::progress::SessionProgress;
use crate::error::SessionError;
use crate::evaluator::{Evaluation, EvaluationRequest, ItemKind};
use crate::report::AssessmentReport;

//
// ─── PENDING EVALUATION ───────────────────────────────────────────────────────
//

/// Response captured for the current item, waiting on the evaluator.
///
/// Produced by the first half of "complete current item" and consumed by the
/// second half once the evaluator resolves.
#[derive(Debug, Clone)]
pub struct PendingEvaluation {
    generation: u64,
    item_index: usize,
    answer: CapturedAnswer,
    trigger: CompletionTrigger,
    elapsed_secs: Option<u64>,
    request: EvaluationRequest,
}

impl PendingEvaluation {
    #[must_use]
    pub fn item_index(&self) -> usize {
        self.item_index
    }

    #[must_use]
    pub fn trigger(&self) -> CompletionTrigger {
        self.trigger
    }

    #[must_use]
    pub fn answer(&self) -> &CapturedAnswer {
        &self.answer
    }

    #[must_use]
    pub fn request(&self) -> &EvaluationRequest {
        &self.request
    }
}

//
// ─── SESSION CORE ─────────────────────────────────────────────────────────────
//

/// State machine shared by both session variants.
///
/// Owns the stage, item cursor, result list and integrity flags. Variant
/// controllers add their interaction surface on top and decide what gets
/// captured when an item closes.
pub(crate) struct SessionCore<I: AssessmentItem> {
    id: SessionId,
    items: Vec<I>,
    clock: Clock,
    credential: Option<ApiKey>,
    stage: Stage,
    current: usize,
    results: Vec<ResponseRecord>,
    flags: IntegrityLog,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    pending: Option<usize>,
    generation: u64,
}

impl<I: AssessmentItem> SessionCore<I> {
    pub(crate) fn new(items: Vec<I>, clock: Clock) -> Result<Self, SessionError> {
        validate_items(&items)?;
        Ok(Self {
            id: SessionId::generate(),
            items,
            clock,
            credential: None,
            stage: Stage::Welcome,
            current: 0,
            results: Vec::new(),
            flags: IntegrityLog::new(),
            started_at: None,
            completed_at: None,
            pending: None,
            generation: 0,
        })
    }

    pub(crate) fn id(&self) -> SessionId {
        self.id
    }

    pub(crate) fn items(&self) -> &[I] {
        &self.items
    }

    pub(crate) fn stage(&self) -> Stage {
        self.stage
    }

    pub(crate) fn current_index(&self) -> usize {
        self.current
    }

    pub(crate) fn current_item(&self) -> Option<&I> {
        if self.stage == Stage::Active {
            self.items.get(self.current)
        } else {
            None
        }
    }

    pub(crate) fn results(&self) -> &[ResponseRecord] {
        &self.results
    }

    pub(crate) fn flags(&self) -> &[IntegrityFlag] {
        self.flags.flags()
    }

    pub(crate) fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub(crate) fn advance_clock(&mut self, delta: Duration) {
        self.clock.advance(delta);
    }

    pub(crate) fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub(crate) fn is_loading(&self) -> bool {
        self.pending.is_some()
    }

    pub(crate) fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// Store the user-entered key. Blank input clears it and returns false.
    pub(crate) fn set_credential(&mut self, raw: &str) -> bool {
        self.credential = ApiKey::parse(raw);
        self.credential.is_some()
    }

    pub(crate) fn ensure_active(&self) -> Result<(), SessionError> {
        if self.stage == Stage::Active {
            Ok(())
        } else {
            Err(SessionError::NotActive { stage: self.stage })
        }
    }

    pub(crate) fn start(&mut self) -> Result<(), SessionError> {
        if self.stage != Stage::Welcome {
            return Err(SessionError::AlreadyStarted { stage: self.stage });
        }
        if self.credential.is_none() {
            tracing::info!(session_id = %self.id, "start blocked: API key required");
            return Err(SessionError::MissingCredential);
        }

        let now = self.clock.now();
        self.stage = Stage::Active;
        self.current = 0;
        self.started_at = Some(now);
        tracing::info!(session_id = %self.id, items = self.items.len(), "session started");
        Ok(())
    }

    /// First half of "complete current item": capture and raise the loading guard.
    pub(crate) fn begin(
        &mut self,
        kind: ItemKind,
        answer: CapturedAnswer,
        trigger: CompletionTrigger,
        elapsed_secs: Option<u64>,
    ) -> Result<PendingEvaluation, SessionError> {
        self.ensure_active()?;
        if self.pending.is_some() {
            return Err(SessionError::EvaluationPending);
        }
        let item = self
            .items
            .get(self.current)
            .ok_or(SessionError::NotActive { stage: self.stage })?;

        let request = EvaluationRequest {
            credential: self.credential.clone(),
            kind,
            item_id: item.id(),
            prompt: item.prompt().to_string(),
            expected: item.expected().to_string(),
            response: answer.to_evaluation_text(),
        };

        self.pending = Some(self.current);
        tracing::debug!(
            session_id = %self.id,
            item_index = self.current,
            trigger = ?trigger,
            "item captured for evaluation"
        );

        Ok(PendingEvaluation {
            generation: self.generation,
            item_index: self.current,
            answer,
            trigger,
            elapsed_secs,
            request,
        })
    }

    /// Second half: append the record and advance, or finish the session.
    pub(crate) fn finish(
        &mut self,
        pending: PendingEvaluation,
        evaluation: Evaluation,
    ) -> Result<&ResponseRecord, SessionError> {
        if pending.generation != self.generation
            || self.stage != Stage::Active
            || self.pending != Some(pending.item_index)
            || self.current != pending.item_index
        {
            tracing::debug!(
                session_id = %self.id,
                item_index = pending.item_index,
                "discarding stale evaluation"
            );
            return Err(SessionError::StaleEvaluation);
        }

        let now = self.clock.now();
        if evaluation.is_degraded() {
            tracing::warn!(
                session_id = %self.id,
                item_index = pending.item_index,
                outcome = ?evaluation.outcome,
                score = evaluation.score.value(),
                "item scored with fallback evaluation"
            );
        }

        self.results.push(ResponseRecord {
            item_id: pending.request.item_id,
            item_index: pending.item_index,
            answer: pending.answer,
            score: evaluation.score,
            justification: evaluation.justification,
            elapsed_secs: pending.elapsed_secs,
            trigger: pending.trigger,
            completed_at: now,
        });
        self.pending = None;
        self.current += 1;

        if self.current >= self.items.len() {
            self.stage = Stage::Report;
            self.completed_at = Some(now);
            tracing::info!(session_id = %self.id, results = self.results.len(), "session completed");
        } else {
            tracing::debug!(session_id = %self.id, item_index = self.current, "advanced to next item");
        }

        self.results.last().ok_or(SessionError::StaleEvaluation)
    }

    /// Append a flag when the signal is suspicious and the session is active.
    pub(crate) fn record_integrity(&mut self, signal: IntegritySignal) -> bool {
        if self.stage != Stage::Active {
            return false;
        }
        let Some(kind) = signal.flag_kind() else {
            return false;
        };
        self.flags.push(kind, self.clock.now());
        tracing::debug!(session_id = %self.id, kind = ?kind, "integrity flag recorded");
        true
    }

    /// Discard all session state and return to `Welcome`. Items and credential stay.
    pub(crate) fn reset(&mut self) {
        let previous = self.id;
        self.id = SessionId::generate();
        self.generation += 1;
        self.stage = Stage::Welcome;
        self.current = 0;
        self.results.clear();
        self.flags = IntegrityLog::new();
        self.started_at = None;
        self.completed_at = None;
        self.pending = None;
        tracing::info!(previous = %previous, session_id = %self.id, "session reset");
    }

    pub(crate) fn progress(&self) -> SessionProgress {
        SessionProgress::new(self.items.len(), self.results.len(), self.stage)
    }

    pub(crate) fn snapshot(&self, remaining_secs: Option<u32>) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            stage: self.stage,
            item_index: self.current,
            progress: self.progress(),
            remaining_secs,
            loading: self.is_loading(),
            has_credential: self.has_credential(),
            results: self.results.clone(),
            flags: self.flags.counts(),
            last_error: None,
            report: self.report(),
        }
    }

    pub(crate) fn report(&self) -> Option<AssessmentReport> {
        if self.stage != Stage::Report {
            return None;
        }
        Some(AssessmentReport::build(
            self.id,
            &self.items,
            &self.results,
            &self.flags,
            self.started_at?,
            self.completed_at?,
        ))
    }
}

impl<I: AssessmentItem> fmt::Debug for SessionCore<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCore")
            .field("id", &self.id)
            .field("items_len", &self.items.len())
            .field("stage", &self.stage)
            .field("current", &self.current)
            .field("results_len", &self.results.len())
            .field("flags_len", &self.flags.len())
            .field("pending", &self.pending)
            .finish_non_exhaustive()
    }
}
