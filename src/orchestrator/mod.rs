//! 编排层（Orchestration Layer）
//!
//! ## 模块划分
//!
//! ### `app` - 应用主循环
//! - 加载配置和题库，构造 AI 能力与成绩上报
//! - 循环执行考试会话，处理重新开始
//!
//! ### `console` - 终端界面
//! - 登录表单、逐题作答、交卷确认
//! - 阅卷进度、成绩单、上报状态
//!
//! ## 层次关系
//!
//! ```text
//! orchestrator::App (会话循环)
//!     ↓
//! workflow::SessionController / ExamSession (单场考试的状态流转)
//!     ↓
//! services (能力层：组卷 / 阅卷 / LLM / 上报)
//!     ↓
//! clients (基础设施：LLM API / webhook)
//! ```

pub mod app;
pub mod console;

pub use app::App;
pub use console::Console;
