use serde::{Deserialize, Serialize};

use crate::models::question::Question;

/// AI 对简答题的评价
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiAnalysis {
    pub question_id: u32,
    pub score: f64,
    pub feedback: String,
}

/// 单题阅卷结论
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradeOutcome {
    /// 选择题：是否答对
    Choice { is_correct: bool },
    /// 简答题或兜底结果：AI 评价
    Evaluated(AiAnalysis),
}

/// 单题阅卷明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradeDetail {
    pub question_id: u32,
    pub user_answer: String,
    /// 已限制在 `[0, max_points]` 内
    pub points_earned: f64,
    pub max_points: f64,
    pub outcome: GradeOutcome,
}

impl GradeDetail {
    pub fn is_correct(&self) -> Option<bool> {
        match &self.outcome {
            GradeOutcome::Choice { is_correct } => Some(*is_correct),
            GradeOutcome::Evaluated(_) => None,
        }
    }

    /// 展示给考生和上报用的评语
    pub fn feedback(&self) -> &str {
        match &self.outcome {
            GradeOutcome::Evaluated(analysis) => &analysis.feedback,
            GradeOutcome::Choice { is_correct: true } => "CORRECTO",
            GradeOutcome::Choice { is_correct: false } => "INCORRECTO",
        }
    }
}

/// 成绩等级
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Excelente,
    Aprobado,
    Reprobado,
}

impl std::fmt::Display for Verdict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Verdict::Excelente => "EXCELENTE",
            Verdict::Aprobado => "APROBADO",
            Verdict::Reprobado => "REPROBADO",
        };
        write!(f, "{}", label)
    }
}

/// 整场考试的成绩
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamResult {
    pub total_score: f64,
    pub max_score: f64,
    /// 与试卷题目顺序一致
    pub details: Vec<GradeDetail>,
}

impl ExamResult {
    /// 由明细汇总，满分按试卷题目计算，与阅卷结果无关
    pub fn from_details(questions: &[Question], details: Vec<GradeDetail>) -> Self {
        Self {
            total_score: details.iter().map(|d| d.points_earned).sum(),
            max_score: max_score(questions),
            details,
        }
    }

    /// 得分率（0.0 - 1.0）
    pub fn ratio(&self) -> f64 {
        if self.max_score > 0.0 {
            self.total_score / self.max_score
        } else {
            0.0
        }
    }

    /// 百分制得分
    pub fn percentage(&self) -> f64 {
        self.ratio() * 100.0
    }

    /// 二十分制得分
    pub fn grade_over_20(&self) -> f64 {
        self.ratio() * 20.0
    }

    pub fn verdict(&self) -> Verdict {
        let grade = self.grade_over_20();
        if grade >= 14.0 {
            Verdict::Excelente
        } else if grade >= 12.0 {
            Verdict::Aprobado
        } else {
            Verdict::Reprobado
        }
    }
}

pub fn max_score(questions: &[Question]) -> f64 {
    questions.iter().map(|q| q.points).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detail(points_earned: f64, max_points: f64) -> GradeDetail {
        GradeDetail {
            question_id: 1,
            user_answer: String::new(),
            points_earned,
            max_points,
            outcome: GradeOutcome::Choice {
                is_correct: points_earned > 0.0,
            },
        }
    }

    #[test]
    fn grade_scale_and_verdict() {
        let result = ExamResult {
            total_score: 28.0,
            max_score: 40.0,
            details: vec![detail(1.0, 1.0)],
        };
        assert!((result.grade_over_20() - 14.0).abs() < 1e-9);
        assert!((result.percentage() - 70.0).abs() < 1e-9);
        assert_eq!(result.verdict(), Verdict::Excelente);

        let result = ExamResult {
            total_score: 5.0,
            max_score: 10.0,
            details: vec![],
        };
        assert_eq!(result.verdict(), Verdict::Reprobado);
    }

    #[test]
    fn zero_max_score_is_zero_ratio() {
        let result = ExamResult {
            total_score: 0.0,
            max_score: 0.0,
            details: vec![],
        };
        assert_eq!(result.ratio(), 0.0);
    }

    #[test]
    fn choice_feedback_labels() {
        assert_eq!(detail(1.0, 1.0).feedback(), "CORRECTO");
        assert_eq!(detail(0.0, 1.0).feedback(), "INCORRECTO");
        assert_eq!(detail(0.0, 1.0).is_correct(), Some(false));
    }
}
