use chrono::{DateTime, Utc};
use serde::Serialize;

use assess_core::model::{
    AssessmentItem, CompletionTrigger, IntegrityCounts, IntegrityLog, ItemId, ResponseRecord,
    Score, SessionId,
};
use assess_core::time::elapsed_secs;

/// One row of the per-item breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportItem {
    pub index: usize,
    pub item_id: ItemId,
    pub prompt: String,
    pub response: String,
    pub score: Score,
    pub justification: String,
    pub elapsed_secs: Option<u64>,
    pub trigger: CompletionTrigger,
}

/// Final summary handed to whatever renders the report screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentReport {
    pub session_id: SessionId,
    pub overall_score: Score,
    pub total_elapsed_secs: u64,
    pub flags: IntegrityCounts,
    pub items: Vec<ReportItem>,
}

impl AssessmentReport {
    #[must_use]
    pub fn build<I: AssessmentItem>(
        session_id: SessionId,
        items: &[I],
        results: &[ResponseRecord],
        flags: &IntegrityLog,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let scores: Vec<Score> = results.iter().map(|r| r.score).collect();
        let rows = results
            .iter()
            .map(|record| ReportItem {
                index: record.item_index,
                item_id: record.item_id,
                prompt: items
                    .get(record.item_index)
                    .map(|item| item.prompt().to_string())
                    .unwrap_or_default(),
                response: record.answer.summary(),
                score: record.score,
                justification: record.justification.clone(),
                elapsed_secs: record.elapsed_secs,
                trigger: record.trigger,
            })
            .collect();

        Self {
            session_id,
            overall_score: Score::rounded_mean(&scores),
            total_elapsed_secs: elapsed_secs(started_at, completed_at),
            flags: flags.counts(),
            items: rows,
        }
    }

    #[must_use]
    pub fn total_elapsed_display(&self) -> String {
        format_elapsed(self.total_elapsed_secs)
    }
}

/// `m:ss`, or `h:mm:ss` past the hour.
#[must_use]
pub fn format_elapsed(secs: u64) -> String {
    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}
