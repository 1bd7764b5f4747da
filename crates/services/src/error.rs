//! Shared error types for the services crate.

use thiserror::Error;

use assess_core::CatalogError;
use assess_core::model::{GridError, Stage};

/// Errors emitted while talking to the scoring API.
///
/// These never reach the session: `Evaluator::evaluate` folds them into a
/// fallback `Evaluation`. They are kept typed so the fold can tell a transport
/// failure from a response that arrived in the wrong shape.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EvaluatorError {
    #[error("an API key is required for evaluation")]
    MissingCredential,
    #[error("evaluation request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("evaluation response is not a valid generate-content body: {0}")]
    Decode(serde_json::Error),
    #[error("evaluation response contained no text")]
    EmptyResponse,
    #[error("evaluation text is not a score/justification object: {0}")]
    InvalidVerdict(serde_json::Error),
    #[error("evaluation score is not a number")]
    NonNumericScore,
}

impl EvaluatorError {
    /// True when nothing usable came back from the server at all.
    #[must_use]
    pub fn is_transport(&self) -> bool {
        matches!(self, EvaluatorError::HttpStatus(_) | EvaluatorError::Http(_))
    }
}

/// Errors emitted by session controllers and the session driver.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionError {
    #[error("an API key is required to start the assessment")]
    MissingCredential,
    #[error("session already started (stage: {stage})")]
    AlreadyStarted { stage: Stage },
    #[error("session is not active (stage: {stage})")]
    NotActive { stage: Stage },
    #[error("an evaluation is already in progress")]
    EvaluationPending,
    #[error("evaluation result does not belong to the current item")]
    StaleEvaluation,
    #[error("answer is empty")]
    EmptyAnswer,
    #[error("session driver has shut down")]
    DriverClosed,
    #[error(transparent)]
    Catalog(#[from] CatalogError),
    #[error(transparent)]
    Grid(#[from] GridError),
}
