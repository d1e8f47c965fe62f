//! 应用主循环 - 编排层
//!
//! ## 职责
//!
//! 1. **应用初始化**：加载题库、构造 AI 能力和成绩上报
//! 2. **会话循环**：登录 → 组卷 → 计时作答 → 阅卷 → 成绩展示 → 上报 → 重新开始
//! 3. **并发协调**：作答输入、倒计时、阅卷进度显示同时进行

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::load_question_bank;
use crate::orchestrator::console::{self, Console};
use crate::services::{LlmCapabilities, WebhookReportSink};
use crate::utils::logging::log_startup;
use crate::workflow::{run_timed_phase, LoginOutcome, SessionController};

/// 剩余该秒数时提醒考生
const TIME_WARNING_SECS: u64 = 300;

/// 应用主结构
pub struct App {
    controller: SessionController,
    console: Console,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        let bank = load_question_bank(Path::new(&config.question_bank_path))
            .await
            .with_context(|| format!("无法加载题库: {}", config.question_bank_path))?;

        log_startup(&config.llm_model_name, bank.len(), config.exam_length);

        if !config.has_system_credential() {
            warn!("⚠️ 未配置系统凭证 (LLM_API_KEY)，考生未提供凭证时简答题无法 AI 评分");
        }
        if config.report_webhook_url.is_none() {
            warn!("⚠️ 未配置成绩上报地址 (REPORT_WEBHOOK_URL)，上报将失败");
        }

        let provider = Arc::new(LlmCapabilities::new(config.clone()));
        let sink = Arc::new(WebhookReportSink::new(config.report_webhook_url.clone()));
        let controller = SessionController::new(config, Arc::new(bank), provider, sink);

        Ok(Self {
            controller,
            console: Console::new(),
        })
    }

    /// 运行应用主逻辑
    pub async fn run(mut self) -> Result<()> {
        loop {
            let Some(outcome) = self.login().await? else {
                break;
            };

            self.run_session(outcome).await?;

            if !self
                .console
                .confirm("\n¿Desea iniciar una nueva evaluación?")
                .await?
            {
                break;
            }
            self.controller.restart();
        }

        info!("👋 程序结束");
        Ok(())
    }

    /// 登录，表单不合法时重新输入；输入结束返回 None
    async fn login(&mut self) -> Result<Option<LoginOutcome>> {
        loop {
            let Some(form) = self.console.login_form().await? else {
                return Ok(None);
            };

            match self
                .controller
                .login(&form.full_name, &form.cedula, form.api_key.as_deref())
                .await
            {
                Ok(outcome) => {
                    if outcome.personal_key_rejected {
                        println!(
                            "Su API Key personal no respondió. Se usará la clave del sistema."
                        );
                    }
                    return Ok(Some(outcome));
                }
                Err(e) => println!("{}", e),
            }
        }
    }

    /// 一场完整的考试
    async fn run_session(&mut self, outcome: LoginOutcome) -> Result<()> {
        console::print_generating(&outcome.user.full_name, self.controller.config().exam_length);
        let session = self.controller.generate(outcome.user).await;
        let timer = self.controller.timer();

        let progress = tokio::spawn(console::print_progress(session.subscribe_progress()));

        let (finish_tx, finish_rx) = oneshot::channel();
        let timed = run_timed_phase(&session, &timer, finish_rx, |secs| {
            if secs == TIME_WARNING_SECS {
                println!("\n⚠ Quedan 5 minutos.");
            } else if secs == 0 {
                println!("\n⏰ Tiempo agotado. El examen se envía automáticamente.");
                console::print_grading_started();
            }
        });
        tokio::pin!(timed);

        let (reason, result) = tokio::select! {
            out = &mut timed => out,
            res = self.console.answer_loop(&session, finish_tx) => {
                if let Err(e) = res {
                    warn!("读取作答输入失败: {}", e);
                }
                console::print_grading_started();
                timed.await
            }
        };
        info!("考试结束方式: {:?}", reason);

        let _ = progress.await;
        console::print_result(&session, result);

        if let Some(status) = self.controller.deliver_report(&session) {
            console::print_save_status(status).await;
        }
        Ok(())
    }
}
