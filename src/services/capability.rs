//! 外部能力接口
//!
//! 组卷、阅卷和上报只依赖这些 trait，具体实现以 `Arc<dyn Trait>` 注入
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{LlmError, ReportError};
use crate::models::question::{Question, QuestionKind};
use crate::services::report_sink::ReportRecord;

/// 简答题评分请求
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub question_id: u32,
    pub prompt: String,
    /// 参考答案，可能为空
    pub rubric: String,
    pub max_points: f64,
    pub answer: String,
    /// 已截断的阅读材料
    pub passage_excerpt: Option<String>,
}

/// 评分结果（分数尚未限制范围）
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub score: f64,
    pub feedback: String,
}

/// 简答题评分能力
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<Evaluation, LlmError>;
}

/// 发给改写服务的题目摘要
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionDescriptor {
    pub id: u32,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub text: String,
    pub options: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
}

impl From<&Question> for QuestionDescriptor {
    fn from(q: &Question) -> Self {
        let (options, correct_index, expected) = match &q.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_option_index,
            } => (options.clone(), Some(*correct_option_index), None),
            QuestionKind::OpenText { expected_answer } => {
                (Vec::new(), None, Some(expected_answer.clone()))
            }
        };
        Self {
            id: q.id,
            kind: q.type_label(),
            text: q.question_text.clone(),
            options,
            correct_index,
            expected,
        }
    }
}

/// 改写服务返回的单题覆盖项
///
/// 字段名兼容模型常见的几种写法
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionOverride {
    pub id: u32,
    #[serde(default, alias = "text")]
    pub question_text: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default, alias = "correctIndex")]
    pub correct_option_index: Option<i64>,
    #[serde(default, alias = "expected")]
    pub expected_answer: Option<String>,
}

/// 题目改写能力
#[async_trait]
pub trait Reformulator: Send + Sync {
    /// 返回按 ID 对应的覆盖项；响应形状不对时返回错误
    async fn reformulate(
        &self,
        questions: &[QuestionDescriptor],
        display_name: &str,
    ) -> Result<Vec<QuestionOverride>, LlmError>;
}

/// 凭证可用性探测
#[async_trait]
pub trait AvailabilityProbe: Send + Sync {
    async fn check_availability(&self) -> bool;
}

/// 成绩上报
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn deliver(&self, record: &ReportRecord) -> Result<(), ReportError>;
}

/// 绑定某个凭证的一组 AI 能力
#[derive(Clone)]
pub struct Capabilities {
    pub evaluator: Arc<dyn Evaluator>,
    /// 没有可用凭证时为 None，组卷跳过改写
    pub reformulator: Option<Arc<dyn Reformulator>>,
    pub probe: Arc<dyn AvailabilityProbe>,
}

/// 按凭证构造能力
pub trait CapabilityProvider: Send + Sync {
    /// `credential` 为空时使用系统凭证
    fn for_credential(&self, credential: Option<&str>) -> Capabilities;
}
