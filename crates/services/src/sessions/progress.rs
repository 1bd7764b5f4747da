use serde::Serialize;

use assess_core::model::Stage;

/// Item counts for a session, published with every snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionProgress {
    pub total: usize,
    pub answered: usize,
    /// Items without a record yet, including one awaiting its score.
    pub remaining: usize,
    pub is_complete: bool,
}

impl SessionProgress {
    #[must_use]
    pub fn new(total: usize, answered: usize, stage: Stage) -> Self {
        Self {
            total,
            answered,
            remaining: total.saturating_sub(answered),
            is_complete: stage == Stage::Report,
        }
    }
}
