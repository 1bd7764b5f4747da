#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod evaluator;
pub mod report;
pub mod sessions;

pub use assess_core::Clock;

pub use config::{EvaluatorConfig, GenerationConfig};
pub use error::{EvaluatorError, SessionError};
pub use evaluator::{
    Evaluation, EvaluationOutcome, EvaluationRequest, Evaluator, GeminiEvaluator, ItemKind,
};
pub use report::{AssessmentReport, ReportItem, format_elapsed};
pub use sessions::{
    AnswerInput, AssessmentSession, CellInput, PendingEvaluation, QuestionSession,
    SessionCommand, SessionDriver, SessionHandle, SessionProgress, SessionSnapshot,
    SpreadsheetTaskSession,
};
