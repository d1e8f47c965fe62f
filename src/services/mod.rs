pub mod assembler;
pub mod capability;
pub mod grading;
pub mod llm_service;
pub mod report_sink;

pub use assembler::ExamAssembler;
pub use capability::{
    AvailabilityProbe, Capabilities, CapabilityProvider, Evaluation, EvaluationRequest,
    Evaluator, QuestionDescriptor, QuestionOverride, Reformulator, ReportSink,
};
pub use grading::{GradingEngine, GradingPolicy};
pub use llm_service::{LlmCapabilities, LlmService};
pub use report_sink::{deliver_in_background, ReportRecord, SaveStatus, WebhookReportSink};
