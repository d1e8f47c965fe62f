//! 阅卷服务
//!
//! 选择题本地比对，简答题交给 `Evaluator`；整卷按批次并发阅卷。
//! 所有失败都在最小范围内折算成 0 分加评语，不向调用方抛错
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::config::Config;
use crate::error::LlmError;
use crate::models::answer::{answer_for, Answer};
use crate::models::grade::{AiAnalysis, ExamResult, GradeDetail, GradeOutcome};
use crate::models::question::{Question, QuestionKind, TextContext};
use crate::services::capability::{EvaluationRequest, Evaluator};
use crate::utils::logging::{log_batch_complete, log_batch_start};

// ========== 评语文案 ==========

pub const FEEDBACK_SHORT_ANSWER: &str = "No se proporcionó una respuesta adecuada para evaluar.";
pub const FEEDBACK_TIMEOUT: &str =
    "Tiempo de espera IA agotado. Revise su conexión o intente más tarde.";
pub const FEEDBACK_FORMAT_ERROR: &str = "Evaluación manual requerida (Error de formato IA).";
pub const FEEDBACK_RATE_LIMITED: &str = "Error: Sistema saturado (Rate Limit). Intente nuevamente.";
pub const FEEDBACK_INVALID_CREDENTIAL: &str = "Error: Problema de permisos o API Key inválida.";
pub const FEEDBACK_CONNECTION: &str = "Error de conexión con IA. Se asignó 0 por defecto.";
pub const FEEDBACK_INTERNAL: &str = "Error interno de evaluación.";
pub const FEEDBACK_CRITICAL: &str = "Error crítico durante la evaluación masiva.";

/// 少于该字符数（去除首尾空白后）的简答直接记 0 分
pub const MIN_OPEN_ANSWER_CHARS: usize = 3;

/// 阅卷节流策略
#[derive(Debug, Clone)]
pub struct GradingPolicy {
    /// 每批并发阅卷的题目数
    pub batch_size: usize,
    /// 批次之间的停顿
    pub batch_pause: Duration,
    /// 单题 AI 评分超时
    pub evaluation_timeout: Duration,
    /// 传给评分服务的阅读材料最大字符数
    pub passage_excerpt_chars: usize,
}

impl Default for GradingPolicy {
    fn default() -> Self {
        Self {
            batch_size: 2,
            batch_pause: Duration::from_millis(1500),
            evaluation_timeout: Duration::from_secs(45),
            passage_excerpt_chars: 1000,
        }
    }
}

impl GradingPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            batch_size: config.grading_batch_size.max(1),
            batch_pause: Duration::from_millis(config.grading_batch_pause_ms),
            evaluation_timeout: Duration::from_secs(config.evaluation_timeout_secs),
            passage_excerpt_chars: config.passage_excerpt_chars,
        }
    }
}

/// 阅卷引擎
///
/// 内部只持有 `Arc`，clone 后可移入 tokio 任务
#[derive(Clone)]
pub struct GradingEngine {
    evaluator: Arc<dyn Evaluator>,
    policy: GradingPolicy,
}

impl GradingEngine {
    pub fn new(evaluator: Arc<dyn Evaluator>, policy: GradingPolicy) -> Self {
        Self { evaluator, policy }
    }

    /// 批改单道题
    ///
    /// 得分总在 `[0, points]` 内，任何失败都记 0 分并给出对应评语
    pub async fn grade(
        &self,
        question: &Question,
        answer: &str,
        passage: Option<&TextContext>,
    ) -> GradeDetail {
        let outcome = match &question.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_option_index,
            } => GradeOutcome::Choice {
                is_correct: grade_multiple_choice(options, *correct_option_index, answer),
            },
            QuestionKind::OpenText { expected_answer } => {
                let evaluation =
                    AssertUnwindSafe(self.grade_open_text(question, expected_answer, answer, passage))
                        .catch_unwind()
                        .await;
                let analysis = evaluation.unwrap_or_else(|_| {
                    error!("❌ 题目 {} 评分过程异常", question.id);
                    AiAnalysis {
                        question_id: question.id,
                        score: 0.0,
                        feedback: FEEDBACK_INTERNAL.to_string(),
                    }
                });
                GradeOutcome::Evaluated(analysis)
            }
        };

        let points_earned = match &outcome {
            GradeOutcome::Choice { is_correct: true } => question.points,
            GradeOutcome::Choice { is_correct: false } => 0.0,
            GradeOutcome::Evaluated(analysis) => analysis.score,
        };

        GradeDetail {
            question_id: question.id,
            user_answer: answer.to_string(),
            points_earned,
            max_points: question.points,
            outcome,
        }
    }

    async fn grade_open_text(
        &self,
        question: &Question,
        rubric: &str,
        answer: &str,
        passage: Option<&TextContext>,
    ) -> AiAnalysis {
        let zero = |feedback: &str| AiAnalysis {
            question_id: question.id,
            score: 0.0,
            feedback: feedback.to_string(),
        };

        if answer.trim().chars().count() < MIN_OPEN_ANSWER_CHARS {
            return zero(FEEDBACK_SHORT_ANSWER);
        }

        let request = EvaluationRequest {
            question_id: question.id,
            prompt: question.question_text.clone(),
            rubric: rubric.to_string(),
            max_points: question.points,
            answer: answer.to_string(),
            passage_excerpt: passage.map(|p| {
                p.content
                    .chars()
                    .take(self.policy.passage_excerpt_chars)
                    .collect()
            }),
        };

        match timeout(self.policy.evaluation_timeout, self.evaluator.evaluate(request)).await {
            Ok(Ok(evaluation)) => AiAnalysis {
                question_id: question.id,
                score: clamp_score(evaluation.score, question.points),
                feedback: evaluation.feedback,
            },
            Ok(Err(e)) => {
                warn!("⚠️ 题目 {} AI 评分失败: {}", question.id, e);
                zero(feedback_for_error(&e))
            }
            Err(_) => {
                warn!(
                    "⚠️ 题目 {} AI 评分超时 ({}s)",
                    question.id,
                    self.policy.evaluation_timeout.as_secs()
                );
                zero(FEEDBACK_TIMEOUT)
            }
        }
    }

    /// 批改整份试卷
    ///
    /// `progress` 在每批完成后收到 `min(round(done/total*100), 99)`，全部完成后收到 100
    pub async fn grade_all<F>(
        &self,
        questions: &[Question],
        answers: &[Answer],
        passages: &[TextContext],
        mut progress: F,
    ) -> ExamResult
    where
        F: FnMut(u8) + Send,
    {
        let details = match self.run_batches(questions, answers, passages, &mut progress).await {
            Ok(details) if details.len() == questions.len() => details,
            Ok(details) => {
                error!(
                    "❌ 阅卷结果数量不一致: {} / {}",
                    details.len(),
                    questions.len()
                );
                critical_details(questions, answers)
            }
            Err(e) => {
                error!("❌ 阅卷任务失败: {}", e);
                critical_details(questions, answers)
            }
        };

        progress(100);
        ExamResult::from_details(questions, details)
    }

    async fn run_batches<F>(
        &self,
        questions: &[Question],
        answers: &[Answer],
        passages: &[TextContext],
        progress: &mut F,
    ) -> Result<Vec<GradeDetail>, tokio::task::JoinError>
    where
        F: FnMut(u8) + Send,
    {
        let total = questions.len();
        let batch_size = self.policy.batch_size.max(1);
        let total_batches = total.div_ceil(batch_size);
        let mut details = Vec::with_capacity(total);

        for (batch_idx, batch) in questions.chunks(batch_size).enumerate() {
            let batch_start = batch_idx * batch_size;
            log_batch_start(
                batch_idx + 1,
                total_batches,
                batch_start + 1,
                batch_start + batch.len(),
                total,
            );

            let mut handles = Vec::with_capacity(batch.len());
            for question in batch {
                let engine = self.clone();
                let question = question.clone();
                let answer = answer_for(answers, question.id).to_string();
                let passage = question
                    .passage_id()
                    .and_then(|id| passages.iter().find(|p| p.id == id))
                    .cloned();

                let handle = tokio::spawn(async move {
                    engine.grade(&question, &answer, passage.as_ref()).await
                });
                handles.push(handle);
            }

            // 按试卷顺序收集
            for handle in handles {
                details.push(handle.await?);
            }

            let percent = progress_percent(details.len(), total);
            progress(percent);
            log_batch_complete(batch_idx + 1, percent);

            if batch_start + batch.len() < total {
                debug!("批次间停顿 {}ms", self.policy.batch_pause.as_millis());
                sleep(self.policy.batch_pause).await;
            }
        }

        Ok(details)
    }
}

/// 选择题判分
///
/// 正确答案索引会被限制到选项范围内，比较时忽略大小写和首尾空白
pub fn grade_multiple_choice(options: &[String], correct_index: usize, answer: &str) -> bool {
    let Some(last) = options.len().checked_sub(1) else {
        return false;
    };
    let correct = &options[correct_index.min(last)];
    correct.trim().to_lowercase() == answer.trim().to_lowercase()
}

/// 把 AI 给出的分数限制在 `[0, max_points]`
pub fn clamp_score(score: f64, max_points: f64) -> f64 {
    if score.is_finite() {
        score.clamp(0.0, max_points.max(0.0))
    } else {
        0.0
    }
}

/// 按错误类别给出评语
pub fn feedback_for_error(err: &LlmError) -> &'static str {
    match err {
        LlmError::RateLimited { .. } => FEEDBACK_RATE_LIMITED,
        LlmError::InvalidCredential { .. } => FEEDBACK_INVALID_CREDENTIAL,
        LlmError::MalformedResponse { .. } => FEEDBACK_FORMAT_ERROR,
        LlmError::MissingCredential
        | LlmError::ApiCallFailed { .. }
        | LlmError::EmptyContent { .. } => FEEDBACK_CONNECTION,
    }
}

pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 99;
    }
    let percent = (done as f64 / total as f64 * 100.0).round() as u8;
    percent.min(99)
}

/// 阅卷整体失败时的兜底结果：每题 0 分
pub fn critical_details(questions: &[Question], answers: &[Answer]) -> Vec<GradeDetail> {
    questions
        .iter()
        .map(|q| GradeDetail {
            question_id: q.id,
            user_answer: answer_for(answers, q.id).to_string(),
            points_earned: 0.0,
            max_points: q.points,
            outcome: GradeOutcome::Evaluated(AiAnalysis {
                question_id: q.id,
                score: 0.0,
                feedback: FEEDBACK_CRITICAL.to_string(),
            }),
        })
        .collect()
}
