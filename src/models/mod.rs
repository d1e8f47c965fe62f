pub mod answer;
pub mod grade;
pub mod loaders;
pub mod question;
pub mod user;

pub use answer::{answer_for, Answer, AnswerSheet};
pub use grade::{AiAnalysis, ExamResult, GradeDetail, GradeOutcome, Verdict};
pub use loaders::{load_question_bank, parse_question_bank};
pub use question::{Question, QuestionBank, QuestionKind, TextContext};
pub use user::User;
