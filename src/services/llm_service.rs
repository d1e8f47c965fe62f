//! LLM 服务 - 业务能力层
//!
//! 只负责"AI 评分 / 题目改写 / 凭证探测"能力，不关心流程
//!
//! ## 技术栈
//! - 通过 `LlmClient` 调用兼容 OpenAI API 的服务（默认 Gemini）
//! - 调用统一套用 `RetryPolicy`，凭证错误不重试

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::clients::LlmClient;
use crate::config::Config;
use crate::error::LlmError;
use crate::services::capability::{
    AvailabilityProbe, Capabilities, CapabilityProvider, Evaluation, EvaluationRequest,
    Evaluator, QuestionDescriptor, QuestionOverride, Reformulator,
};
use crate::utils::{extract_json, truncate_text, RetryPolicy};

/// 模型没有给出评语时使用的文案
pub const NO_FEEDBACK: &str = "Sin comentarios generados.";

/// LLM 服务
///
/// 职责：
/// - 为单道简答题打分
/// - 按考生改写整份试卷的措辞
/// - 探测凭证是否可用
/// - 不处理超时、不做分数截断，这些由阅卷流程负责
#[derive(Clone)]
pub struct LlmService {
    client: LlmClient,
    retry: RetryPolicy,
}

impl LlmService {
    /// 创建绑定指定凭证的服务，`credential` 为空时使用系统凭证
    pub fn new(config: &Config, credential: Option<&str>) -> Self {
        Self {
            client: LlmClient::new(config, credential),
            retry: RetryPolicy::from_config(config),
        }
    }

    pub fn has_credential(&self) -> bool {
        self.client.has_credential()
    }

    /// 带重试的聊天调用
    async fn chat_with_retry(&self, user_message: &str) -> Result<String, LlmError> {
        self.retry
            .run_if(LlmError::is_retryable, || self.client.chat(user_message, None))
            .await
    }
}

#[async_trait]
impl Evaluator for LlmService {
    async fn evaluate(&self, request: EvaluationRequest) -> Result<Evaluation, LlmError> {
        debug!(
            "AI 评分 (题目 {}, 作答长度 {} 字符)",
            request.question_id,
            request.answer.chars().count()
        );
        let prompt = build_evaluation_prompt(&request);
        let response = self.chat_with_retry(&prompt).await?;
        parse_evaluation(&response)
    }
}

#[async_trait]
impl Reformulator for LlmService {
    async fn reformulate(
        &self,
        questions: &[QuestionDescriptor],
        display_name: &str,
    ) -> Result<Vec<QuestionOverride>, LlmError> {
        let payload = serde_json::to_string(questions).map_err(|e| LlmError::MalformedResponse {
            response: e.to_string(),
        })?;
        debug!("请求改写 {} 道题目", questions.len());

        let prompt = build_reformulation_prompt(display_name, &payload);
        let response = self.chat_with_retry(&prompt).await?;
        parse_overrides(&response)
    }
}

#[async_trait]
impl AvailabilityProbe for LlmService {
    async fn check_availability(&self) -> bool {
        if !self.client.has_credential() {
            return false;
        }
        // 探测只调用一次，失败即视为不可用
        match RetryPolicy::once()
            .run(|| self.client.chat("ping", None))
            .await
        {
            Ok(_) => true,
            Err(e) => {
                warn!("凭证探测失败: {}", e);
                false
            }
        }
    }
}

/// 基于 LLM 的能力提供者
pub struct LlmCapabilities {
    config: Config,
}

impl LlmCapabilities {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

impl CapabilityProvider for LlmCapabilities {
    fn for_credential(&self, credential: Option<&str>) -> Capabilities {
        let service = Arc::new(LlmService::new(&self.config, credential));
        let reformulator: Option<Arc<dyn Reformulator>> = if service.has_credential() {
            Some(service.clone())
        } else {
            None
        };
        Capabilities {
            evaluator: service.clone(),
            reformulator,
            probe: service,
        }
    }
}

// ========== 提示词 ==========

fn build_evaluation_prompt(request: &EvaluationRequest) -> String {
    let context = match &request.passage_excerpt {
        Some(excerpt) => format!("{}...", excerpt),
        None => "Sin contexto específico de lectura".to_string(),
    };

    format!(
        r#"Eres un evaluador académico estricto pero justo. Tu ÚNICA tarea es devolver un JSON.

Contexto: "{}"
Pregunta: "{}"
Respuesta Correcta Esperada: "{}"
Puntos Posibles: {}
Respuesta del Estudiante: "{}"

Instrucciones:
1. Analiza la respuesta del estudiante comparándola con la esperada.
2. Asigna un puntaje preciso (puede ser decimal, ej: 1.5).
3. Provee retroalimentación breve justificando la nota.

Retorna ESTRICTAMENTE este formato JSON:
{{
  "score": (número),
  "feedback": "(texto breve)"
}}"#,
        context, request.prompt, request.rubric, request.max_points, request.answer
    )
}

fn build_reformulation_prompt(display_name: &str, questions_json: &str) -> String {
    format!(
        r#"Eres un profesor experto. Reformula este examen para el estudiante: {}.
Entrada: Lista de preguntas.
Salida: JSON Array ([...]) con preguntas modificadas.

Instrucciones:
1. Mantén estrictamente los IDs originales.
2. Cambia la redacción de 'questionText' para que sea única pero evalúe lo mismo.
3. Para preguntas de OPCIÓN MÚLTIPLE:
   - Puedes cambiar el orden de las opciones.
   - SI CAMBIAS EL ORDEN, DEBES ACTUALIZAR 'correctOptionIndex'.
4. El idioma debe ser ESPAÑOL FORMAL.

Responde SOLO con el JSON Array válido.
{}"#,
        display_name, questions_json
    )
}

// ========== 响应解析 ==========

/// 解析评分响应
///
/// 不是 JSON 对象时返回 `MalformedResponse`；缺分数记 0，缺评语用默认文案
pub fn parse_evaluation(raw: &str) -> Result<Evaluation, LlmError> {
    let cleaned = extract_json(raw);
    let value: Value = serde_json::from_str(&cleaned).map_err(|_| {
        warn!("评分结果不是合法 JSON: {}", truncate_text(raw, 120));
        LlmError::MalformedResponse {
            response: truncate_text(raw, 200),
        }
    })?;

    let Value::Object(map) = value else {
        return Err(LlmError::MalformedResponse {
            response: truncate_text(raw, 200),
        });
    };

    let score = map
        .get("score")
        .and_then(Value::as_f64)
        .filter(|s| s.is_finite())
        .unwrap_or(0.0);
    let feedback = map
        .get("feedback")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .unwrap_or(NO_FEEDBACK)
        .to_string();

    Ok(Evaluation { score, feedback })
}

/// 解析改写响应
///
/// 顶层必须是数组，否则整体作废；单项解析失败只跳过该项
pub fn parse_overrides(raw: &str) -> Result<Vec<QuestionOverride>, LlmError> {
    let cleaned = extract_json(raw);
    let malformed = || LlmError::MalformedResponse {
        response: truncate_text(raw, 200),
    };

    let value: Value = serde_json::from_str(&cleaned).map_err(|_| malformed())?;
    let Value::Array(items) = value else {
        return Err(malformed());
    };

    let total = items.len();
    let overrides: Vec<QuestionOverride> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();

    if overrides.len() < total {
        debug!("跳过 {} 个无法解析的改写项", total - overrides.len());
    }
    Ok(overrides)
}
