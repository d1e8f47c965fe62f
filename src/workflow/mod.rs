pub mod session;
pub mod timer;

pub use session::{
    run_timed_phase, ExamSession, FinishReason, LoginOutcome, SessionController, SessionState,
};
pub use timer::{format_remaining, ExamTimer};
