mod cell;
mod grid;
mod ids;
mod integrity;
mod item;
mod response;
mod settings;

pub use cell::{CellAction, CellActionKind, CellRef, CellRefError, column_name};
pub use grid::{GRID_COLS, GRID_ROWS, Grid, GridError};
pub use ids::{ItemId, ParseIdError, SessionId};
pub use integrity::{
    IntegrityCounts, IntegrityFlag, IntegrityFlagKind, IntegrityLog, IntegritySignal, Visibility,
};
pub use item::{AssessmentItem, Difficulty, Question, Task};
pub use response::{CapturedAnswer, CompletionTrigger, ResponseRecord, Score, ScoreError, Stage};
pub use settings::{
    ApiKey, DEFAULT_BASE_URL, DEFAULT_MODEL, EvaluatorSettings, EvaluatorSettingsDraft,
    EvaluatorSettingsError,
};
