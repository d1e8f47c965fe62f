use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 题库错误
    #[error("题库错误: {0}")]
    Bank(#[from] BankError),
    /// 输入校验错误
    #[error("{0}")]
    Validation(#[from] ValidationError),
    /// 组卷错误
    #[error("组卷错误: {0}")]
    Assembly(String),
    /// 成绩上报错误
    #[error("上报错误: {0}")]
    Report(#[from] ReportError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    /// 未配置任何凭证
    #[error("未配置 API 凭证")]
    MissingCredential,
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 请求频率限制
    #[error("LLM API请求频率限制 (模型: {model}): {message}")]
    RateLimited { model: String, message: String },
    /// 凭证无效或无权限
    #[error("LLM API凭证无效 (模型: {model}): {message}")]
    InvalidCredential { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 返回内容不是预期的 JSON
    #[error("无法解析LLM返回的JSON (响应: {response})")]
    MalformedResponse { response: String },
}

impl LlmError {
    /// 根据错误信息归类 API 错误
    ///
    /// 服务端只给出文本信息，按状态码和关键字区分限流与凭证问题
    pub fn classify(model: impl Into<String>, message: impl Into<String>) -> Self {
        let model = model.into();
        let message = message.into();
        let lower = message.to_lowercase();

        if has_status_code(&lower, &["429"])
            || lower.contains("rate limit")
            || lower.contains("resource_exhausted")
            || lower.contains("quota")
        {
            LlmError::RateLimited { model, message }
        } else if has_status_code(&lower, &["400", "401", "403"])
            || lower.contains("api key")
            || lower.contains("api_key")
            || lower.contains("permission")
        {
            LlmError::InvalidCredential { model, message }
        } else {
            LlmError::ApiCallFailed { model, message }
        }
    }

    /// 是否值得重试
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            LlmError::InvalidCredential { .. } | LlmError::MissingCredential
        )
    }
}

/// 信息中是否出现独立的 HTTP 状态码（"4000ms" 不算 400）
fn has_status_code(message: &str, codes: &[&str]) -> bool {
    let pattern = format!(r"\b(?:{})\b", codes.join("|"));
    match regex::Regex::new(&pattern) {
        Ok(re) => re.is_match(message),
        Err(_) => false,
    }
}

/// 题库错误
#[derive(Debug, Error)]
pub enum BankError {
    /// 读取文件失败
    #[error("读取题库文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// TOML 解析失败
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
    /// 题库为空
    #[error("题库中没有可用的题目: {path}")]
    Empty { path: String },
}

/// 登录表单校验错误
///
/// 文案直接展示给考生
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Por favor complete todos los campos.")]
    MissingFields,
    #[error("Ingrese una cédula válida.")]
    InvalidCedula,
}

/// 成绩上报错误
#[derive(Debug, Error)]
pub enum ReportError {
    /// 未配置上报地址
    #[error("未配置成绩上报地址")]
    MissingEndpoint,
    /// 网络请求失败
    #[error("上报请求失败 ({endpoint}): {source}")]
    RequestFailed {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    /// 上报接口返回非成功状态
    #[error("上报接口返回错误状态 ({endpoint}): {status}")]
    BadStatus { endpoint: String, status: u16 },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建组卷错误
    pub fn assembly(message: impl Into<String>) -> Self {
        AppError::Assembly(message.into())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_rate_limit_before_credential() {
        let err = LlmError::classify("m", "status 429: quota exceeded for api key");
        assert!(matches!(err, LlmError::RateLimited { .. }));
        assert!(err.is_retryable());
    }

    #[test]
    fn classify_invalid_credential() {
        let err = LlmError::classify("m", "API key not valid. Please pass a valid API key.");
        assert!(matches!(err, LlmError::InvalidCredential { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn status_codes_must_stand_alone() {
        let err = LlmError::classify("m", "request timed out after 4000ms");
        assert!(matches!(err, LlmError::ApiCallFailed { .. }));
        assert!(err.is_retryable());

        let err = LlmError::classify("m", "upstream returned 14290 bytes");
        assert!(matches!(err, LlmError::ApiCallFailed { .. }));

        let err = LlmError::classify("m", "HTTP 401: unauthorized");
        assert!(matches!(err, LlmError::InvalidCredential { .. }));
    }

    #[test]
    fn classify_generic_failure() {
        let err = LlmError::classify("m", "connection reset by peer");
        assert!(matches!(err, LlmError::ApiCallFailed { .. }));
    }

    #[test]
    fn validation_messages_are_user_facing() {
        let err: AppError = ValidationError::MissingFields.into();
        assert_eq!(err.to_string(), "Por favor complete todos los campos.");
    }
}
