use serde::{Deserialize, Serialize};

/// 阅读材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContext {
    pub id: u32,
    pub title: String,
    pub content: String,
}

/// 题目类型及其专属字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QuestionKind {
    /// 选择题
    MultipleChoice {
        options: Vec<String>,
        correct_option_index: usize,
    },
    /// 简答题，`expected_answer` 是给 AI 的评分参考
    OpenText {
        #[serde(default)]
        expected_answer: String,
    },
}

/// 题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    /// 所属阅读材料，0 或缺省表示独立题目
    #[serde(default)]
    pub text_id: Option<u32>,
    pub question_text: String,
    pub points: f64,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    /// 所属阅读材料 ID（独立题目返回 None）
    pub fn passage_id(&self) -> Option<u32> {
        self.text_id.filter(|id| *id != 0)
    }

    pub fn is_independent(&self) -> bool {
        self.passage_id().is_none()
    }

    pub fn type_label(&self) -> &'static str {
        match self.kind {
            QuestionKind::MultipleChoice { .. } => "MULTIPLE_CHOICE",
            QuestionKind::OpenText { .. } => "OPEN_TEXT",
        }
    }

    /// 校验题目是否满足不变量
    ///
    /// 选择题必须有选项且正确答案索引有效，分值必须为正
    pub fn is_well_formed(&self) -> bool {
        if !(self.points.is_finite() && self.points > 0.0) {
            return false;
        }
        match &self.kind {
            QuestionKind::MultipleChoice {
                options,
                correct_option_index,
            } => !options.is_empty() && *correct_option_index < options.len(),
            QuestionKind::OpenText { .. } => true,
        }
    }
}

/// 题库
///
/// 进程启动时加载一次，之后只读
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QuestionBank {
    #[serde(default)]
    pub passages: Vec<TextContext>,
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl QuestionBank {
    pub fn new(passages: Vec<TextContext>, questions: Vec<Question>) -> Self {
        Self {
            passages,
            questions,
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn passage(&self, id: u32) -> Option<&TextContext> {
        self.passages.iter().find(|p| p.id == id)
    }

    /// 某篇阅读材料下的全部题目（保持题库顺序）
    pub fn questions_for_passage(&self, passage_id: u32) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|q| q.passage_id() == Some(passage_id))
            .cloned()
            .collect()
    }

    /// 独立题目池
    pub fn independent_questions(&self) -> Vec<Question> {
        self.questions
            .iter()
            .filter(|q| q.is_independent())
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_text_id_means_independent() {
        let q = Question {
            id: 7,
            text_id: Some(0),
            question_text: "¿?".to_string(),
            points: 1.0,
            kind: QuestionKind::OpenText {
                expected_answer: String::new(),
            },
        };
        assert!(q.is_independent());
        assert_eq!(q.passage_id(), None);
        assert!(q.is_well_formed());
    }

    #[test]
    fn multiple_choice_needs_valid_index() {
        let q = Question {
            id: 1,
            text_id: Some(2),
            question_text: "Capital".to_string(),
            points: 1.0,
            kind: QuestionKind::MultipleChoice {
                options: vec!["A".to_string(), "B".to_string()],
                correct_option_index: 2,
            },
        };
        assert!(!q.is_well_formed());
        assert_eq!(q.passage_id(), Some(2));
    }

    #[test]
    fn parses_tagged_toml_entries() {
        let raw = r#"
            [[passages]]
            id = 1
            title = "Texto 1"
            content = "Cuerpo"

            [[questions]]
            id = 2
            text_id = 1
            type = "MULTIPLE_CHOICE"
            points = 1.0
            question_text = "¿Cuál?"
            options = ["a", "b"]
            correct_option_index = 1

            [[questions]]
            id = 100
            type = "OPEN_TEXT"
            points = 2.0
            question_text = "Explique"
            expected_answer = "Pleonasmo"
        "#;
        let bank: QuestionBank = toml::from_str(raw).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.questions_for_passage(1).len(), 1);
        assert_eq!(bank.independent_questions()[0].id, 100);
        assert!(bank.questions.iter().all(Question::is_well_formed));
        assert_eq!(bank.passage(1).map(|p| p.title.as_str()), Some("Texto 1"));
    }
}
