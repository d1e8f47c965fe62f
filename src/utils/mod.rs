pub mod json;
pub mod logging;
pub mod retry;

pub use json::extract_json;
pub use logging::truncate_text;
pub use retry::RetryPolicy;
