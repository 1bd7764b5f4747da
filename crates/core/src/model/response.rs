use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::model::cell::CellAction;
use crate::model::ids::ItemId;

//
// ─── ERRORS ───────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ScoreError {
    #[error("score {0} is outside 0..=10")]
    OutOfRange(i64),
}

//
// ─── SCORE ────────────────────────────────────────────────────────────────────
//

/// Integer score on the 0–10 scale used by the evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct Score(u8);

impl Score {
    pub const MIN: Score = Score(0);
    pub const MAX: Score = Score(10);

    /// # Errors
    ///
    /// Returns `ScoreError::OutOfRange` if the value is not in 0..=10.
    pub fn new(value: i64) -> Result<Self, ScoreError> {
        match u8::try_from(value) {
            Ok(v) if v <= Self::MAX.0 => Ok(Self(v)),
            _ => Err(ScoreError::OutOfRange(value)),
        }
    }

    /// Clamp any integer into range. The flag is true when clamping changed the value.
    #[must_use]
    pub fn clamped(value: i64) -> (Self, bool) {
        let bounded = value.clamp(0, i64::from(Self::MAX.0));
        let score = Self(u8::try_from(bounded).unwrap_or(0));
        (score, bounded != value)
    }

    #[must_use]
    pub fn value(self) -> u8 {
        self.0
    }

    /// Arithmetic mean rounded half away from zero (7.5 rounds to 8). Empty input yields 0.
    #[must_use]
    pub fn rounded_mean(scores: &[Score]) -> Score {
        if scores.is_empty() {
            return Self::MIN;
        }
        let sum: u32 = scores.iter().map(|s| u32::from(s.0)).sum();
        let count = u32::try_from(scores.len()).unwrap_or(u32::MAX);
        // Integer half-up: (2*sum + count) / (2*count).
        let rounded = (2 * sum + count) / (2 * count);
        Self(u8::try_from(rounded).unwrap_or(Self::MAX.0).min(Self::MAX.0))
    }
}

impl TryFrom<i64> for Score {
    type Error = ScoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Score> for u8 {
    fn from(value: Score) -> Self {
        value.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/10", self.0)
    }
}

//
// ─── RESPONSE RECORD ──────────────────────────────────────────────────────────
//

/// Raw answer captured when an item closes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum CapturedAnswer {
    Text(String),
    Actions(Vec<CellAction>),
}

impl CapturedAnswer {
    /// Text handed to the evaluator. Action lists are serialized as JSON.
    #[must_use]
    pub fn to_evaluation_text(&self) -> String {
        match self {
            CapturedAnswer::Text(text) => text.clone(),
            CapturedAnswer::Actions(actions) => {
                serde_json::to_string_pretty(actions).unwrap_or_else(|_| "[]".to_string())
            }
        }
    }

    /// Short human-readable rendering for the report.
    #[must_use]
    pub fn summary(&self) -> String {
        match self {
            CapturedAnswer::Text(text) => text.clone(),
            CapturedAnswer::Actions(actions) if actions.is_empty() => "No actions".to_string(),
            CapturedAnswer::Actions(actions) => actions
                .iter()
                .map(|a| format!("{}: {}", a.cell, a.new))
                .collect::<Vec<_>>()
                .join("; "),
        }
    }
}

/// What closed the item window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionTrigger {
    Submitted,
    Expired,
}

/// Immutable outcome of one item: answer, score and justification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub item_id: ItemId,
    pub item_index: usize,
    pub answer: CapturedAnswer,
    pub score: Score,
    pub justification: String,
    /// Seconds spent on a timed task; `None` for untimed questions.
    pub elapsed_secs: Option<u64>,
    pub trigger: CompletionTrigger,
    pub completed_at: DateTime<Utc>,
}

//
// ─── STAGE ────────────────────────────────────────────────────────────────────
//

/// Linear session stage: `Welcome -> Active -> Report`, back to `Welcome` only by reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Welcome,
    Active,
    Report,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Welcome => "welcome",
            Stage::Active => "active",
            Stage::Report => "report",
        };
        f.write_str(label)
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
