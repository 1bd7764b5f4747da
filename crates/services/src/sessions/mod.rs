mod countdown;
mod driver;
mod lifecycle;
mod progress;
mod question;
mod task;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use countdown::{Countdown, CountdownTick};
pub use driver::{
    AssessmentSession, SessionCommand, SessionDriver, SessionHandle, SessionSnapshot, channel,
};
pub use lifecycle::PendingEvaluation;
pub use progress::SessionProgress;
pub use question::{AnswerInput, QuestionSession};
pub use task::{CellInput, SpreadsheetTaskSession};
