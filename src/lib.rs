//! # Academic Exam
//!
//! 终端版学术考试系统：随机组卷、限时作答、AI 辅助阅卷、成绩上报
//!
//! ## 架构设计
//!
//! 本系统采用四层架构：
//!
//! ### ① 基础设施层（Clients）
//! - `clients/` - 只负责和外部服务通信
//! - `LlmClient` - 兼容 OpenAI 协议的聊天接口，错误归类为 `LlmError`
//! - `ReportClient` - 成绩上报 webhook
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，不关心流程
//! - `capability` - `Evaluator` / `Reformulator` / `AvailabilityProbe` / `ReportSink` 接口
//! - `LlmService` - 基于 LLM 的评分、改写、凭证探测
//! - `ExamAssembler` - 组卷
//! - `GradingEngine` - 单题判分与分批阅卷
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一场考试"的状态流转
//! - `SessionController` - 登录 → 组卷 → 作答 → 阅卷 → 上报 → 重新开始
//! - `ExamSession` - 答题卡、幂等交卷、一次写入的成绩
//! - `ExamTimer` - 倒计时
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/app` - 应用主循环
//! - `orchestrator/console` - 终端界面
//!
//! ## 模块结构

pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{ExamResult, GradeDetail, Question, QuestionBank, TextContext, User};
pub use orchestrator::App;
pub use services::{ExamAssembler, GradingEngine, GradingPolicy, LlmService};
pub use workflow::{ExamSession, SessionController, SessionState};
