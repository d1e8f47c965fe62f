use crate::error::{AppResult, BankError};
use crate::models::question::{Question, QuestionBank, TextContext};
use serde::Deserialize;
use std::path::Path;
use tokio::fs;

/// 从 TOML 文件加载题库
///
/// 不满足不变量的题目会被跳过并记录警告，过滤后为空则报错
pub async fn load_question_bank(path: &Path) -> AppResult<QuestionBank> {
    let origin = path.display().to_string();
    tracing::info!("正在加载题库: {}", origin);

    let content = fs::read_to_string(path)
        .await
        .map_err(|source| BankError::ReadFailed {
            path: origin.clone(),
            source,
        })?;

    let bank = parse_question_bank(&content, &origin)?;
    tracing::info!(
        "✓ 题库加载完成: {} 篇阅读材料, {} 道题目",
        bank.passages.len(),
        bank.len()
    );
    Ok(bank)
}

/// 题库文件的原始结构，题目逐条解析
#[derive(Debug, Deserialize)]
struct RawBank {
    #[serde(default)]
    passages: Vec<TextContext>,
    #[serde(default)]
    questions: Vec<toml::Value>,
}

/// 解析单条题目，结构错误或不满足不变量时返回 None
fn parse_question(entry: toml::Value) -> Option<Question> {
    let id = entry
        .get("id")
        .and_then(toml::Value::as_integer)
        .map(|id| id.to_string())
        .unwrap_or_else(|| "?".to_string());

    let question = match entry.try_into::<Question>() {
        Ok(q) => q,
        Err(e) => {
            tracing::warn!("⚠️ 跳过无法解析的题目 (ID: {}): {}", id, e);
            return None;
        }
    };

    if !question.is_well_formed() {
        tracing::warn!(
            "⚠️ 跳过不合法的题目 (ID: {}, 类型: {})",
            question.id,
            question.type_label()
        );
        return None;
    }
    Some(question)
}

/// 解析题库文本
///
/// `origin` 只用于错误信息和日志
pub fn parse_question_bank(content: &str, origin: &str) -> AppResult<QuestionBank> {
    let raw: RawBank = toml::from_str(content).map_err(|source| BankError::TomlParseFailed {
        path: origin.to_string(),
        source,
    })?;

    let total = raw.questions.len();
    let questions: Vec<Question> = raw.questions.into_iter().filter_map(parse_question).collect();

    if questions.len() < total {
        tracing::warn!("已跳过 {} 道不合法的题目", total - questions.len());
    }

    for q in &questions {
        if let Some(pid) = q.passage_id() {
            if !raw.passages.iter().any(|p| p.id == pid) {
                tracing::warn!("题目 {} 引用了不存在的阅读材料 {}", q.id, pid);
            }
        }
    }

    if questions.is_empty() {
        return Err(BankError::Empty {
            path: origin.to_string(),
        }
        .into());
    }

    Ok(QuestionBank::new(raw.passages, questions))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;

    #[test]
    fn skips_malformed_questions() {
        let raw = r#"
            [[questions]]
            id = 1
            type = "MULTIPLE_CHOICE"
            points = 1.0
            question_text = "Sin opciones"
            options = []
            correct_option_index = 0

            [[questions]]
            id = 2
            type = "OPEN_TEXT"
            points = 2.0
            question_text = "Explique"
        "#;
        let bank = parse_question_bank(raw, "inline").unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.questions[0].id, 2);
    }

    #[test]
    fn skips_entries_with_broken_shape() {
        let raw = r#"
            [[questions]]
            id = 1
            type = "MULTIPLE_CHOICE"
            points = 1.0
            question_text = "Falta la lista de opciones"
            correct_option_index = 0

            [[questions]]
            id = 2
            type = "ENSAYO"
            points = 1.0
            question_text = "Tipo desconocido"

            [[questions]]
            id = 3
            type = "OPEN_TEXT"
            points = "dos"
            question_text = "Puntos como texto"

            [[questions]]
            id = 4
            type = "OPEN_TEXT"
            points = 2.0
            question_text = "Explique"
        "#;
        let bank = parse_question_bank(raw, "inline").unwrap();
        assert_eq!(bank.len(), 1);
        assert_eq!(bank.questions[0].id, 4);
    }

    #[test]
    fn empty_bank_is_an_error() {
        let err = parse_question_bank("", "inline").unwrap_err();
        assert!(matches!(err, AppError::Bank(BankError::Empty { .. })));
    }

    #[test]
    fn invalid_toml_is_reported() {
        let err = parse_question_bank("[[questions]\nid=", "inline").unwrap_err();
        assert!(matches!(
            err,
            AppError::Bank(BankError::TomlParseFailed { .. })
        ));
    }

    #[tokio::test]
    async fn missing_file_is_reported() {
        let err = load_question_bank(Path::new("data/no_such_bank.toml"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Bank(BankError::ReadFailed { .. })));
    }

    #[tokio::test]
    async fn bundled_bank_loads() {
        let bank = load_question_bank(Path::new("data/question_bank.toml"))
            .await
            .unwrap();
        assert!(!bank.is_empty());
        assert!(bank.passage(1).is_some());
    }
}
