mod progress;
mod results;
mod service;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use results::{CategoryResult, SessionResults};
pub use service::{AnswerFeedback, PresentedQuestion, StudySession, Submission};
pub use workflow::StudyLoopService;
