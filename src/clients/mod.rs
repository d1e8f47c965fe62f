pub mod llm_client;
pub mod report_client;

pub use llm_client::LlmClient;
pub use report_client::ReportClient;
