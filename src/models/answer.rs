use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::models::question::Question;

/// 考生对单题的作答
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub question_id: u32,
    /// 作答文本，或所选选项的文本
    pub value: String,
}

/// 考试进行中的答题卡
///
/// 只由答题处理函数修改，提交时冻结成 `Vec<Answer>`
#[derive(Debug, Clone, Default)]
pub struct AnswerSheet {
    values: HashMap<u32, String>,
}

impl AnswerSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, question_id: u32, value: impl Into<String>) {
        self.values.insert(question_id, value.into());
    }

    pub fn get(&self, question_id: u32) -> Option<&str> {
        self.values.get(&question_id).map(String::as_str)
    }

    /// 已作答题目数（按题目 ID 计）
    pub fn answered_count(&self) -> usize {
        self.values.len()
    }

    /// 按试卷顺序冻结答案，未作答的题目补空字符串
    pub fn freeze(&self, questions: &[Question]) -> Vec<Answer> {
        questions
            .iter()
            .map(|q| Answer {
                question_id: q.id,
                value: self.get(q.id).unwrap_or_default().to_string(),
            })
            .collect()
    }
}

/// 在冻结的答案列表中查找某题的答案，找不到时返回空字符串
pub fn answer_for(answers: &[Answer], question_id: u32) -> &str {
    answers
        .iter()
        .find(|a| a.question_id == question_id)
        .map(|a| a.value.as_str())
        .unwrap_or_default()
}
