use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::cell::CellRef;
use crate::model::ids::ItemId;

//
// ─── ITEM TRAIT ────────────────────────────────────────────────────────────────
//

/// Read-only view shared by every predefined assessment item.
///
/// Sessions step through a fixed list of items in order; this trait is what the
/// shared lifecycle needs to know about an item regardless of its modality.
pub trait AssessmentItem: Clone + Send + Sync + 'static {
    fn id(&self) -> ItemId;

    fn prompt(&self) -> &str;

    /// Free-text model answer or canonical formula, handed to the evaluator.
    fn expected(&self) -> &str;

    /// Countdown length for timed items. `None` means the item is untimed.
    fn time_limit_secs(&self) -> Option<u32> {
        None
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// Open-ended question answered in free text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: ItemId,
    prompt: String,
    expected_answer: String,
}

impl Question {
    #[must_use]
    pub fn new(id: ItemId, prompt: impl Into<String>, expected_answer: impl Into<String>) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            expected_answer: expected_answer.into(),
        }
    }

    #[must_use]
    pub fn expected_answer(&self) -> &str {
        &self.expected_answer
    }
}

impl AssessmentItem for Question {
    fn id(&self) -> ItemId {
        self.id
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn expected(&self) -> &str {
        &self.expected_answer
    }
}

//
// ─── TASK ──────────────────────────────────────────────────────────────────────
//

/// Difficulty label shown next to a spreadsheet task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Intermediate => "Intermediate",
            Difficulty::Advanced => "Advanced",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Timed task performed against the in-memory spreadsheet grid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    id: ItemId,
    prompt: String,
    expected_formula: String,
    target_cell: CellRef,
    time_limit_secs: u32,
    difficulty: Difficulty,
}

impl Task {
    #[must_use]
    pub fn new(
        id: ItemId,
        prompt: impl Into<String>,
        expected_formula: impl Into<String>,
        target_cell: CellRef,
        time_limit_secs: u32,
        difficulty: Difficulty,
    ) -> Self {
        Self {
            id,
            prompt: prompt.into(),
            expected_formula: expected_formula.into(),
            target_cell,
            time_limit_secs,
            difficulty,
        }
    }

    #[must_use]
    pub fn expected_formula(&self) -> &str {
        &self.expected_formula
    }

    #[must_use]
    pub fn target_cell(&self) -> CellRef {
        self.target_cell
    }

    #[must_use]
    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    #[must_use]
    pub fn time_limit(&self) -> u32 {
        self.time_limit_secs
    }
}

impl AssessmentItem for Task {
    fn id(&self) -> ItemId {
        self.id
    }

    fn prompt(&self) -> &str {
        &self.prompt
    }

    fn expected(&self) -> &str {
        &self.expected_formula
    }

    fn time_limit_secs(&self) -> Option<u32> {
        Some(self.time_limit_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn questions_are_untimed() {
        let q = Question::new(ItemId::new(1), "What is a pivot table?", "A summary tool");
        assert_eq!(q.time_limit_secs(), None);
        assert_eq!(q.expected(), "A summary tool");
    }

    #[test]
    fn tasks_expose_limit_and_formula() {
        let task = Task::new(
            ItemId::new(2),
            "Total revenue",
            "=SUM(E2:E6)",
            CellRef::new(4, 6),
            90,
            Difficulty::Beginner,
        );
        assert_eq!(task.time_limit_secs(), Some(90));
        assert_eq!(task.expected(), "=SUM(E2:E6)");
        assert_eq!(task.target_cell().to_string(), "E7");
        assert_eq!(task.difficulty().to_string(), "Beginner");
    }
}
