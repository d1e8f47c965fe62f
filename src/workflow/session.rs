//! 考试会话 - 流程层
//!
//! 状态流转：
//! `LoggingIn → Generating → InProgress → Submitting → Completed`
//!
//! 手动交卷和倒计时结束都汇入同一个幂等的提交入口，只会阅卷一次
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{oneshot, watch, OnceCell};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::ValidationError;
use crate::models::answer::AnswerSheet;
use crate::models::grade::ExamResult;
use crate::models::question::{Question, QuestionBank, TextContext};
use crate::models::user::User;
use crate::services::capability::{CapabilityProvider, ReportSink};
use crate::services::report_sink::{deliver_in_background, ReportRecord, SaveStatus};
use crate::services::{ExamAssembler, GradingEngine, GradingPolicy};
use crate::utils::logging::{log_grading_complete, log_session_start};
use crate::workflow::timer::ExamTimer;

/// 会话状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    LoggingIn,
    Generating,
    InProgress,
    Submitting,
    Completed,
}

/// 考试结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    /// 考生确认交卷
    Manual,
    /// 倒计时结束
    TimeUp,
}

/// 一场进行中的考试
///
/// 题目在创建后不可变；答案只通过 `record_answer` 修改，提交后冻结
pub struct ExamSession {
    user: User,
    questions: Arc<[Question]>,
    passages: Arc<[TextContext]>,
    answers: Mutex<AnswerSheet>,
    submitted: AtomicBool,
    result: OnceCell<ExamResult>,
    remaining_secs: AtomicU64,
    state_tx: watch::Sender<SessionState>,
    progress_tx: watch::Sender<u8>,
    engine: GradingEngine,
}

impl ExamSession {
    pub fn new(
        user: User,
        questions: Vec<Question>,
        passages: Vec<TextContext>,
        engine: GradingEngine,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::InProgress);
        let (progress_tx, _) = watch::channel(0u8);
        Self {
            user,
            questions: questions.into(),
            passages: passages.into(),
            answers: Mutex::new(AnswerSheet::new()),
            submitted: AtomicBool::new(false),
            result: OnceCell::new(),
            remaining_secs: AtomicU64::new(0),
            state_tx,
            progress_tx,
            engine,
        }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    /// 题目所属的阅读材料
    pub fn passage_for(&self, question: &Question) -> Option<&TextContext> {
        let id = question.passage_id()?;
        self.passages.iter().find(|p| p.id == id)
    }

    pub fn state(&self) -> SessionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    pub fn subscribe_progress(&self) -> watch::Receiver<u8> {
        self.progress_tx.subscribe()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted.load(Ordering::SeqCst)
    }

    /// 记录答案
    ///
    /// 已提交或题目不在试卷中时返回 false
    pub fn record_answer(&self, question_id: u32, value: impl Into<String>) -> bool {
        if self.is_submitted() || !self.questions.iter().any(|q| q.id == question_id) {
            return false;
        }
        self.sheet().record(question_id, value);
        true
    }

    pub fn answer(&self, question_id: u32) -> Option<String> {
        self.sheet().get(question_id).map(str::to_string)
    }

    pub fn answered_count(&self) -> usize {
        self.sheet().answered_count()
    }

    /// 试卷中尚未作答（或作答为空白）的题目数
    pub fn unanswered_count(&self) -> usize {
        let sheet = self.sheet();
        self.questions
            .iter()
            .filter(|q| sheet.get(q.id).map_or(true, |v| v.trim().is_empty()))
            .count()
    }

    pub fn set_remaining_secs(&self, secs: u64) {
        self.remaining_secs.store(secs, Ordering::Relaxed);
    }

    pub fn remaining_secs(&self) -> u64 {
        self.remaining_secs.load(Ordering::Relaxed)
    }

    fn sheet(&self) -> std::sync::MutexGuard<'_, AnswerSheet> {
        self.answers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 交卷
    ///
    /// 可被多次、并发调用，只有第一次会触发阅卷，所有调用方拿到同一份成绩
    pub async fn submit(&self) -> &ExamResult {
        if self
            .submitted
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("重复交卷请求，等待已有阅卷结果");
        }
        self.result.get_or_init(|| self.grade()).await
    }

    pub fn result(&self) -> Option<&ExamResult> {
        self.result.get()
    }

    async fn grade(&self) -> ExamResult {
        self.state_tx.send_replace(SessionState::Submitting);
        self.progress_tx.send_replace(0);

        let answers = self.sheet().freeze(&self.questions);
        info!(
            "📤 开始阅卷: {} 道题目, 已作答 {}",
            self.questions.len(),
            answers.iter().filter(|a| !a.value.is_empty()).count()
        );

        let progress_tx = &self.progress_tx;
        let result = self
            .engine
            .grade_all(&self.questions, &answers, &self.passages, |p| {
                progress_tx.send_replace(p);
            })
            .await;

        log_grading_complete(
            result.total_score,
            result.max_score,
            result.grade_over_20(),
            &result.verdict().to_string(),
        );
        self.state_tx.send_replace(SessionState::Completed);
        result
    }
}

/// 计时作答阶段
///
/// 倒计时和手动交卷信号谁先到就以谁结束，另一方被丢弃，然后交卷
pub async fn run_timed_phase<'a, F>(
    session: &'a ExamSession,
    timer: &ExamTimer,
    finish: oneshot::Receiver<()>,
    mut on_tick: F,
) -> (FinishReason, &'a ExamResult)
where
    F: FnMut(u64),
{
    let reason = tokio::select! {
        _ = timer.expire(|secs| {
            session.set_remaining_secs(secs);
            on_tick(secs);
        }) => FinishReason::TimeUp,
        _ = finish => FinishReason::Manual,
    };

    match reason {
        FinishReason::TimeUp => warn!("⏰ 考试时间到，自动交卷"),
        FinishReason::Manual => info!("✓ 考生确认交卷"),
    }

    (reason, session.submit().await)
}

/// 登录结果
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub user: User,
    /// 考生提供的凭证不可用，已回退到系统凭证
    pub personal_key_rejected: bool,
}

/// 会话控制器
///
/// 持有题库和外部能力，负责登录、组卷、上报和重新开始
pub struct SessionController {
    config: Config,
    bank: Arc<QuestionBank>,
    provider: Arc<dyn CapabilityProvider>,
    sink: Arc<dyn ReportSink>,
    phase: SessionState,
    current: Option<Arc<ExamSession>>,
    seed: Option<u64>,
}

impl SessionController {
    pub fn new(
        config: Config,
        bank: Arc<QuestionBank>,
        provider: Arc<dyn CapabilityProvider>,
        sink: Arc<dyn ReportSink>,
    ) -> Self {
        Self {
            config,
            bank,
            provider,
            sink,
            phase: SessionState::LoggingIn,
            current: None,
            seed: None,
        }
    }

    /// 固定组卷随机种子
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        match &self.current {
            Some(session) => session.state(),
            None => self.phase,
        }
    }

    /// 登录
    ///
    /// 表单不合法时直接返回错误，状态不变；考生自带凭证会先探测一次
    pub async fn login(
        &mut self,
        full_name: &str,
        cedula: &str,
        api_key: Option<&str>,
    ) -> Result<LoginOutcome, ValidationError> {
        let mut user = User::from_form(full_name, cedula, api_key)?;
        let mut personal_key_rejected = false;

        if let Some(key) = user.api_key.clone() {
            let probe = self.provider.for_credential(Some(key.as_str())).probe;
            if !probe.check_availability().await {
                warn!("⚠️ 考生凭证不可用，改用系统凭证");
                user.api_key = None;
                personal_key_rejected = true;
            }
        }

        log_session_start(&user.full_name, &user.cedula, user.api_key.is_some());
        Ok(LoginOutcome {
            user,
            personal_key_rejected,
        })
    }

    /// 为考生组卷并开始考试
    pub async fn generate(&mut self, user: User) -> Arc<ExamSession> {
        self.phase = SessionState::Generating;
        self.current = None;

        let caps = self.provider.for_credential(user.api_key.as_deref());
        let mut assembler = ExamAssembler::new(&self.config, caps.reformulator);
        if let Some(seed) = self.seed {
            assembler = assembler.with_seed(seed);
        }
        let questions = assembler.assemble(&self.bank, &user).await;

        let engine = GradingEngine::new(caps.evaluator, GradingPolicy::from_config(&self.config));
        let session = Arc::new(ExamSession::new(
            user,
            questions,
            self.bank.passages.clone(),
            engine,
        ));
        session.set_remaining_secs(self.config.exam_duration_secs);

        self.phase = SessionState::InProgress;
        self.current = Some(session.clone());
        session
    }

    pub fn timer(&self) -> ExamTimer {
        ExamTimer::new(self.config.exam_duration())
    }

    /// 后台上报当前会话的成绩；尚未出成绩时返回 None
    pub fn deliver_report(&self, session: &ExamSession) -> Option<watch::Receiver<SaveStatus>> {
        let result = session.result()?;
        let record = ReportRecord::from_result(session.user(), result);
        Some(deliver_in_background(self.sink.clone(), record))
    }

    /// 回到登录状态
    pub fn restart(&mut self) {
        self.current = None;
        self.phase = SessionState::LoggingIn;
    }
}
