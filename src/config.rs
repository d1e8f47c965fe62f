use std::time::Duration;

use crate::error::ConfigError;

/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    // --- LLM 配置 ---
    /// 系统默认凭证（考生未提供个人凭证时使用）
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    // --- 题库与上报 ---
    /// 题库 TOML 文件路径
    pub question_bank_path: String,
    /// 成绩上报 webhook，未配置时上报直接记为失败
    pub report_webhook_url: Option<String>,
    // --- 组卷 ---
    /// 每份试卷的题目数量
    pub exam_length: usize,
    /// 随机阅读材料没有题目时使用的默认材料 ID
    pub default_passage_id: u32,
    /// 考试时长（秒）
    pub exam_duration_secs: u64,
    /// 改写请求的超时时间（秒）
    pub reformulation_timeout_secs: u64,
    // --- 阅卷 ---
    /// 每批并发阅卷的题目数
    pub grading_batch_size: usize,
    /// 批次之间的停顿（毫秒）
    pub grading_batch_pause_ms: u64,
    /// 单题 AI 评分的超时时间（秒）
    pub evaluation_timeout_secs: u64,
    /// 传给评分服务的阅读材料最大字符数
    pub passage_excerpt_chars: usize,
    // --- 重试 ---
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
    /// 是否显示详细日志
    pub verbose_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_api_key: String::new(),
            llm_api_base_url: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            llm_model_name: "gemini-2.5-flash".to_string(),
            question_bank_path: "data/question_bank.toml".to_string(),
            report_webhook_url: None,
            exam_length: 30,
            default_passage_id: 1,
            exam_duration_secs: 7200,
            reformulation_timeout_secs: 8,
            grading_batch_size: 2,
            grading_batch_pause_ms: 1500,
            evaluation_timeout_secs: 45,
            passage_excerpt_chars: 1000,
            retry_max_attempts: 4,
            retry_base_delay_ms: 2000,
            verbose_logging: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL")
                .unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            question_bank_path: std::env::var("QUESTION_BANK_PATH")
                .unwrap_or(default.question_bank_path),
            report_webhook_url: std::env::var("REPORT_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .or(default.report_webhook_url),
            exam_length: env_parse("EXAM_LENGTH").unwrap_or(default.exam_length),
            default_passage_id: env_parse("DEFAULT_PASSAGE_ID")
                .unwrap_or(default.default_passage_id),
            exam_duration_secs: env_parse("EXAM_DURATION_SECS")
                .unwrap_or(default.exam_duration_secs),
            reformulation_timeout_secs: env_parse("REFORMULATION_TIMEOUT_SECS")
                .unwrap_or(default.reformulation_timeout_secs),
            grading_batch_size: env_parse("GRADING_BATCH_SIZE")
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.grading_batch_size),
            grading_batch_pause_ms: env_parse("GRADING_BATCH_PAUSE_MS")
                .unwrap_or(default.grading_batch_pause_ms),
            evaluation_timeout_secs: env_parse("EVALUATION_TIMEOUT_SECS")
                .unwrap_or(default.evaluation_timeout_secs),
            passage_excerpt_chars: env_parse("PASSAGE_EXCERPT_CHARS")
                .unwrap_or(default.passage_excerpt_chars),
            retry_max_attempts: env_parse("RETRY_MAX_ATTEMPTS")
                .filter(|v: &usize| *v > 0)
                .unwrap_or(default.retry_max_attempts),
            retry_base_delay_ms: env_parse("RETRY_BASE_DELAY_MS")
                .unwrap_or(default.retry_base_delay_ms),
            verbose_logging: env_parse("VERBOSE_LOGGING").unwrap_or(default.verbose_logging),
        }
    }

    pub fn exam_duration(&self) -> Duration {
        Duration::from_secs(self.exam_duration_secs)
    }

    pub fn reformulation_timeout(&self) -> Duration {
        Duration::from_secs(self.reformulation_timeout_secs)
    }

    /// 是否配置了系统默认凭证
    pub fn has_system_credential(&self) -> bool {
        !self.llm_api_key.trim().is_empty()
    }
}

/// 读取并解析环境变量，解析失败时记录警告并回退默认值
fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            let err = ConfigError::EnvVarParseFailed {
                var_name: name.to_string(),
                value: raw.clone(),
                expected_type: std::any::type_name::<T>().to_string(),
            };
            tracing::warn!("⚠️ {}，使用默认值", err);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_exam_rules() {
        let config = Config::default();
        assert_eq!(config.exam_length, 30);
        assert_eq!(config.grading_batch_size, 2);
        assert_eq!(config.grading_batch_pause_ms, 1500);
        assert_eq!(config.evaluation_timeout_secs, 45);
        assert_eq!(config.exam_duration(), Duration::from_secs(7200));
        assert!(!config.has_system_credential());
    }
}
