//! 日志工具模块
//!
//! 提供日志格式化和输出的辅助函数
use tracing::{info, warn};

/// 记录程序启动信息
pub fn log_startup(model_name: &str, bank_size: usize, exam_length: usize) {
    info!("{}", "=".repeat(60));
    info!(
        "🚀 程序启动 - 学术考试系统 ({})",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("🤖 AI 模型: {}", model_name);
    info!("📚 题库题目数: {}, 每场考试 {} 题", bank_size, exam_length);
    info!("{}", "=".repeat(60));
}

/// 记录考生登录
pub fn log_session_start(full_name: &str, cedula: &str, personal_key: bool) {
    info!("\n{}", "=".repeat(60));
    info!("👤 考生登录: {} ({})", full_name, cedula);
    if personal_key {
        info!("🔑 使用考生自带的 API 凭证");
    }
    info!("{}", "=".repeat(60));
}

/// 记录阅卷批次开始
///
/// # 参数
/// - `batch_num`: 批次编号
/// - `total_batches`: 批次总数
/// - `start`: 起始题号
/// - `end`: 结束题号
/// - `total`: 题目总数
pub fn log_batch_start(
    batch_num: usize,
    total_batches: usize,
    start: usize,
    end: usize,
    total: usize,
) {
    info!("📦 开始阅卷第 {}/{} 批 (题目 {}-{} / 共 {})", batch_num, total_batches, start, end, total);
}

/// 记录阅卷批次完成
pub fn log_batch_complete(batch_num: usize, progress: u8) {
    info!("✓ 第 {} 批完成, 进度 {}%", batch_num, progress);
}

/// 打印阅卷统计
pub fn log_grading_complete(total_score: f64, max_score: f64, grade_over_20: f64, verdict: &str) {
    info!("\n{}", "=".repeat(60));
    info!("📊 阅卷完成");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 得分: {:.2} / {:.2}", total_score, max_score);
    info!("📈 二十分制: {:.2} ({})", grade_over_20, verdict);
    info!("{}", "=".repeat(60));
}

/// 记录降级路径
pub fn log_degraded(stage: &str, reason: &str) {
    warn!("⚠️ {} 降级处理: {}", stage, truncate_text(reason, 200));
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（按字符计）
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}
