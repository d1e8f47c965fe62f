//! 成绩上报
//!
//! 每场考试在后台推送一条记录，状态通过 watch 通道反馈给界面，不阻塞成绩展示
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::clients::ReportClient;
use crate::error::ReportError;
use crate::models::grade::ExamResult;
use crate::models::user::User;
use crate::services::capability::ReportSink;

/// 明细块之间的分隔行
pub const REPORT_DELIMITER: &str = "-----------------------------------";

/// 上报的成绩记录
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRecord {
    pub full_name: String,
    pub cedula: String,
    /// 二十分制，两位小数
    pub score: String,
    pub max_score: String,
    pub percentage: String,
    pub detailed_report: String,
}

impl ReportRecord {
    pub fn from_result(user: &User, result: &ExamResult) -> Self {
        Self {
            full_name: user.full_name.clone(),
            cedula: user.cedula.clone(),
            score: format!("{:.2}", result.grade_over_20()),
            max_score: "20".to_string(),
            percentage: format!("{:.1}%", result.percentage()),
            detailed_report: detailed_report(result),
        }
    }
}

/// 生成逐题明细
///
/// 每题一块 `[Pn | 得分/满分 pts] R: 作答 /// F: 评语`，块之间用分隔行连接
pub fn detailed_report(result: &ExamResult) -> String {
    let delimiter = format!("\n{}\n", REPORT_DELIMITER);
    result
        .details
        .iter()
        .enumerate()
        .map(|(idx, d)| {
            let answer = flatten(&d.user_answer);
            let answer = if answer.is_empty() {
                "SIN RESPUESTA".to_string()
            } else {
                answer
            };
            format!(
                "[P{} | {:.2}/{} pts] R: {} /// F: {}",
                idx + 1,
                d.points_earned,
                d.max_points,
                answer,
                flatten(d.feedback())
            )
        })
        .collect::<Vec<_>>()
        .join(&delimiter)
}

/// 把连续换行压成一个空格
fn flatten(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_break = false;
    for c in text.chars() {
        if c == '\r' || c == '\n' {
            if !in_break {
                out.push(' ');
                in_break = true;
            }
        } else {
            out.push(c);
            in_break = false;
        }
    }
    out.trim().to_string()
}

/// 上报状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveStatus {
    Idle,
    Saving,
    Success,
    Error,
}

/// 通过 webhook 上报
pub struct WebhookReportSink {
    client: ReportClient,
}

impl WebhookReportSink {
    pub fn new(endpoint: Option<String>) -> Self {
        Self {
            client: ReportClient::new(endpoint),
        }
    }
}

#[async_trait]
impl ReportSink for WebhookReportSink {
    async fn deliver(&self, record: &ReportRecord) -> Result<(), ReportError> {
        self.client.post_json(record).await
    }
}

/// 在后台上报，立即返回状态接收端
pub fn deliver_in_background(
    sink: Arc<dyn ReportSink>,
    record: ReportRecord,
) -> watch::Receiver<SaveStatus> {
    let (tx, rx) = watch::channel(SaveStatus::Idle);

    tokio::spawn(async move {
        let _ = tx.send(SaveStatus::Saving);
        let status = match sink.deliver(&record).await {
            Ok(()) => {
                info!("✓ 成绩已上报: {} ({})", record.full_name, record.cedula);
                SaveStatus::Success
            }
            Err(e) => {
                warn!("⚠️ 成绩上报失败: {}", e);
                SaveStatus::Error
            }
        };
        let _ = tx.send(status);
    });

    rx
}
