//! Scoring collaborator: one best-effort call per item, never fatal to a session.

mod gemini;
mod prompt;

use async_trait::async_trait;
use serde::Serialize;

use assess_core::model::{ApiKey, ItemId, Score};

pub use gemini::{GeminiEvaluator, Verdict, decode_verdict, strip_code_fence};
pub use prompt::build_prompt;

pub const MISSING_CREDENTIAL_JUSTIFICATION: &str = "An API key is required for evaluation.";
pub const TRANSPORT_FAILURE_JUSTIFICATION: &str = "An error occurred during evaluation.";
pub const MALFORMED_RESPONSE_JUSTIFICATION: &str = "The response could not be properly evaluated.";

/// Score used when a response arrived but could not be decoded.
pub const MALFORMED_RESPONSE_SCORE: u8 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    Question,
    SpreadsheetTask,
}

/// Everything the evaluator needs to score one captured response.
#[derive(Debug, Clone)]
pub struct EvaluationRequest {
    pub credential: Option<ApiKey>,
    pub kind: ItemKind,
    pub item_id: ItemId,
    pub prompt: String,
    pub expected: String,
    pub response: String,
}

/// Which branch produced an [`Evaluation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum EvaluationOutcome {
    Scored,
    Malformed,
    TransportFailed,
    MissingCredential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub score: Score,
    pub justification: String,
    pub outcome: EvaluationOutcome,
}

impl Evaluation {
    #[must_use]
    pub fn scored(score: Score, justification: impl Into<String>) -> Self {
        Self {
            score,
            justification: justification.into(),
            outcome: EvaluationOutcome::Scored,
        }
    }

    #[must_use]
    pub fn missing_credential() -> Self {
        Self {
            score: Score::MIN,
            justification: MISSING_CREDENTIAL_JUSTIFICATION.to_string(),
            outcome: EvaluationOutcome::MissingCredential,
        }
    }

    #[must_use]
    pub fn transport_failed() -> Self {
        Self {
            score: Score::MIN,
            justification: TRANSPORT_FAILURE_JUSTIFICATION.to_string(),
            outcome: EvaluationOutcome::TransportFailed,
        }
    }

    #[must_use]
    pub fn malformed() -> Self {
        let (score, _) = Score::clamped(i64::from(MALFORMED_RESPONSE_SCORE));
        Self {
            score,
            justification: MALFORMED_RESPONSE_JUSTIFICATION.to_string(),
            outcome: EvaluationOutcome::Malformed,
        }
    }

    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.outcome != EvaluationOutcome::Scored
    }
}

/// Scores a captured response. Implementations fold every failure into a
/// fallback [`Evaluation`] instead of returning an error.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: &EvaluationRequest) -> Evaluation;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallbacks_use_documented_scores() {
        assert_eq!(Evaluation::transport_failed().score.value(), 0);
        assert_eq!(Evaluation::missing_credential().score.value(), 0);
        assert_eq!(Evaluation::malformed().score.value(), 5);
        assert!(Evaluation::malformed().is_degraded());
        assert!(!Evaluation::scored(Score::MAX, "great").is_degraded());
    }
}
