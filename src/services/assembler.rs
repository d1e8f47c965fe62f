//! 组卷服务
//!
//! 一篇随机阅读材料的全部题目在前，独立题目补足剩余题量，
//! 之后可选地交给改写服务按考生个性化措辞
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::question::{Question, QuestionBank, QuestionKind};
use crate::models::user::User;
use crate::services::capability::{QuestionDescriptor, QuestionOverride, Reformulator};
use crate::utils::logging::log_degraded;

/// 组卷器
#[derive(Clone)]
pub struct ExamAssembler {
    reformulator: Option<Arc<dyn Reformulator>>,
    exam_length: usize,
    default_passage_id: u32,
    reformulation_timeout: Duration,
    seed: Option<u64>,
}

impl ExamAssembler {
    pub fn new(config: &Config, reformulator: Option<Arc<dyn Reformulator>>) -> Self {
        Self {
            reformulator,
            exam_length: config.exam_length,
            default_passage_id: config.default_passage_id,
            reformulation_timeout: config.reformulation_timeout(),
            seed: None,
        }
    }

    /// 固定随机种子，便于复现
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// 为考生组一份试卷
    ///
    /// 总是返回 `min(exam_length, 题库大小)` 道题，不会失败
    pub async fn assemble(&self, bank: &QuestionBank, user: &User) -> Vec<Question> {
        let raw = {
            let mut rng = self.rng();
            match select_sections(bank, self.exam_length, self.default_passage_id, &mut rng) {
                Ok(questions) => questions,
                Err(e) => {
                    log_degraded("组卷", &e.to_string());
                    fallback_exam(bank, self.exam_length, &mut rng)
                }
            }
        };
        info!("📝 试卷生成: {} 道题目", raw.len());

        match &self.reformulator {
            Some(reformulator) => {
                self.personalize(reformulator.as_ref(), raw, &user.full_name)
                    .await
            }
            None => raw,
        }
    }

    /// 请求改写并应用覆盖项，失败或超时返回原题
    async fn personalize(
        &self,
        reformulator: &dyn Reformulator,
        raw: Vec<Question>,
        display_name: &str,
    ) -> Vec<Question> {
        let descriptors: Vec<QuestionDescriptor> = raw.iter().map(QuestionDescriptor::from).collect();

        match timeout(
            self.reformulation_timeout,
            reformulator.reformulate(&descriptors, display_name),
        )
        .await
        {
            Ok(Ok(overrides)) => {
                info!("✓ 题目改写完成, 收到 {} 个覆盖项", overrides.len());
                apply_overrides(raw, &overrides)
            }
            Ok(Err(e)) => {
                log_degraded("题目改写", &e.to_string());
                raw
            }
            Err(_) => {
                log_degraded(
                    "题目改写",
                    &format!("超时 ({}s)", self.reformulation_timeout.as_secs()),
                );
                raw
            }
        }
    }
}

/// 按阅读材料 + 独立题目组卷
///
/// 独立题目池为空但仍有空位时返回错误
pub fn select_sections(
    bank: &QuestionBank,
    exam_length: usize,
    default_passage_id: u32,
    rng: &mut StdRng,
) -> AppResult<Vec<Question>> {
    let target = exam_length.min(bank.len());

    let chosen = bank.passages.choose(rng).map(|p| p.id);
    let mut reading = chosen
        .map(|id| bank.questions_for_passage(id))
        .unwrap_or_default();
    if reading.is_empty() {
        debug!(
            "阅读材料 {:?} 没有题目，改用默认材料 {}",
            chosen, default_passage_id
        );
        reading = bank.questions_for_passage(default_passage_id);
    }
    reading.truncate(target);

    let slots = target - reading.len();
    let pool = bank.independent_questions();
    if slots > 0 && pool.is_empty() {
        return Err(AppError::assembly(format!(
            "独立题目池为空，仍需 {} 道题",
            slots
        )));
    }

    let mut filler: Vec<Question> = Vec::with_capacity(slots);
    while filler.len() < slots {
        let mut round = pool.clone();
        round.shuffle(rng);
        filler.extend(round);
    }
    filler.truncate(slots);

    debug!("阅读题 {} 道, 独立题 {} 道", reading.len(), filler.len());
    reading.extend(filler);
    Ok(reading)
}

/// 兜底组卷：打乱整个题库后截断
pub fn fallback_exam(bank: &QuestionBank, exam_length: usize, rng: &mut StdRng) -> Vec<Question> {
    let mut all = bank.questions.clone();
    all.shuffle(rng);
    all.truncate(exam_length);
    all
}

/// 应用改写覆盖项
///
/// 找不到覆盖项或覆盖项不合法的题目保持原样
pub fn apply_overrides(questions: Vec<Question>, overrides: &[QuestionOverride]) -> Vec<Question> {
    let mut applied = 0usize;
    let result = questions
        .into_iter()
        .map(|original| match overrides.iter().find(|o| o.id == original.id) {
            Some(o) => match apply_override(&original, o) {
                Some(q) => {
                    applied += 1;
                    q
                }
                None => {
                    warn!("题目 {} 的改写结果不合法，保留原题", original.id);
                    original
                }
            },
            None => original,
        })
        .collect();
    debug!("已应用 {} 个改写覆盖项", applied);
    result
}

fn apply_override(original: &Question, o: &QuestionOverride) -> Option<Question> {
    let question_text = o
        .question_text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| original.question_text.clone());

    let kind = match &original.kind {
        QuestionKind::MultipleChoice {
            options,
            correct_option_index,
        } => match &o.options {
            Some(new_options) => {
                if new_options.len() != options.len()
                    || new_options.iter().any(|opt| opt.trim().is_empty())
                {
                    return None;
                }
                let index = match o.correct_option_index {
                    Some(i) if i >= 0 && (i as usize) < new_options.len() => i as usize,
                    Some(_) => return None,
                    None => {
                        let correct = options.get(*correct_option_index)?.trim();
                        new_options.iter().position(|opt| opt.trim() == correct)?
                    }
                };
                QuestionKind::MultipleChoice {
                    options: new_options.clone(),
                    correct_option_index: index,
                }
            }
            None => original.kind.clone(),
        },
        QuestionKind::OpenText { expected_answer } => QuestionKind::OpenText {
            expected_answer: o
                .expected_answer
                .as_deref()
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| expected_answer.clone()),
        },
    };

    let question = Question {
        question_text,
        kind,
        ..original.clone()
    };
    question.is_well_formed().then_some(question)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LlmError;
    use crate::models::question::TextContext;
    use async_trait::async_trait;

    fn mc(id: u32, text_id: Option<u32>) -> Question {
        Question {
            id,
            text_id,
            question_text: format!("Pregunta {}", id),
            points: 1.0,
            kind: QuestionKind::MultipleChoice {
                options: vec!["uno".to_string(), "dos".to_string(), "tres".to_string()],
                correct_option_index: 1,
            },
        }
    }

    fn open(id: u32, text_id: Option<u32>) -> Question {
        Question {
            id,
            text_id,
            question_text: format!("Explique {}", id),
            points: 2.0,
            kind: QuestionKind::OpenText {
                expected_answer: "ref".to_string(),
            },
        }
    }

    fn passage(id: u32) -> TextContext {
        TextContext {
            id,
            title: format!("Texto {}", id),
            content: "contenido".to_string(),
        }
    }

    fn user() -> User {
        User::from_form("Ana Pérez", "V-12345", None).unwrap()
    }

    #[test]
    fn reading_section_comes_first() {
        let mut questions: Vec<Question> = (1..=3).map(|i| mc(i, Some(1))).collect();
        questions.extend((100..140).map(|i| mc(i, None)));
        let bank = QuestionBank::new(vec![passage(1)], questions);

        let mut rng = StdRng::seed_from_u64(7);
        let exam = select_sections(&bank, 30, 1, &mut rng).unwrap();
        assert_eq!(exam.len(), 30);
        assert_eq!(
            exam.iter().take(3).map(|q| q.id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(exam[3..].iter().all(Question::is_independent));
    }

    #[test]
    fn empty_passage_falls_back_to_default() {
        let mut questions: Vec<Question> = (1..=2).map(|i| mc(i, Some(1))).collect();
        questions.extend((100..110).map(|i| mc(i, None)));
        // 材料 2 没有题目
        let bank = QuestionBank::new(vec![passage(2)], questions);

        let mut rng = StdRng::seed_from_u64(1);
        let exam = select_sections(&bank, 5, 1, &mut rng).unwrap();
        assert_eq!(exam[0].id, 1);
        assert_eq!(exam[1].id, 2);
        assert_eq!(exam.len(), 5);
    }

    #[test]
    fn short_pool_is_repeated_to_fill_slots() {
        let mut questions: Vec<Question> = (1..=2).map(|i| mc(i, Some(1))).collect();
        questions.extend((100..103).map(|i| mc(i, None)));
        let bank = QuestionBank::new(vec![passage(1)], questions);

        let mut rng = StdRng::seed_from_u64(3);
        // 题库只有 5 道，截断到 5
        let exam = select_sections(&bank, 30, 1, &mut rng).unwrap();
        assert_eq!(exam.len(), 5);

        let mut rng = StdRng::seed_from_u64(3);
        let exam = select_sections(&bank, 4, 1, &mut rng).unwrap();
        assert_eq!(exam.len(), 4);
    }

    #[test]
    fn empty_independent_pool_is_an_error() {
        // 题目 2、3 引用了不存在的材料，既不是阅读题也不是独立题
        let bank = QuestionBank::new(
            vec![passage(1)],
            vec![mc(1, Some(1)), mc(2, Some(5)), mc(3, Some(5))],
        );
        let mut rng = StdRng::seed_from_u64(11);
        assert!(select_sections(&bank, 30, 1, &mut rng).is_err());
    }

    #[tokio::test]
    async fn assembly_never_fails() {
        let bank = QuestionBank::new(
            vec![passage(1)],
            vec![mc(1, Some(1)), mc(2, Some(5)), mc(3, Some(5))],
        );
        let assembler = ExamAssembler::new(&Config::default(), None).with_seed(5);
        let exam = assembler.assemble(&bank, &user()).await;
        assert_eq!(exam.len(), 3);
    }

    #[test]
    fn override_relocates_correct_option() {
        let o = QuestionOverride {
            id: 1,
            question_text: Some("Reformulada".to_string()),
            options: Some(vec!["tres".to_string(), "dos".to_string(), "uno".to_string()]),
            correct_option_index: None,
            expected_answer: None,
        };
        let out = apply_overrides(vec![mc(1, None)], &[o]);
        assert_eq!(out[0].question_text, "Reformulada");
        match &out[0].kind {
            QuestionKind::MultipleChoice {
                correct_option_index,
                ..
            } => assert_eq!(*correct_option_index, 1),
            _ => panic!("tipo cambiado"),
        }
    }

    #[test]
    fn invalid_override_keeps_original() {
        let wrong_len = QuestionOverride {
            id: 1,
            question_text: Some("Otra".to_string()),
            options: Some(vec!["a".to_string()]),
            correct_option_index: Some(0),
            expected_answer: None,
        };
        let out_of_range = QuestionOverride {
            id: 2,
            options: Some(vec!["a".to_string(), "b".to_string(), "c".to_string()]),
            correct_option_index: Some(7),
            ..QuestionOverride::default()
        };
        let original = vec![mc(1, None), mc(2, None), open(3, None)];
        let out = apply_overrides(original.clone(), &[wrong_len, out_of_range]);
        assert_eq!(out, original);
    }

    #[test]
    fn open_text_override_rewrites_rubric() {
        let o = QuestionOverride {
            id: 3,
            question_text: Some("  ".to_string()),
            expected_answer: Some("Nueva referencia".to_string()),
            ..QuestionOverride::default()
        };
        let out = apply_overrides(vec![open(3, None)], &[o]);
        assert_eq!(out[0].question_text, "Explique 3");
        assert_eq!(
            out[0].kind,
            QuestionKind::OpenText {
                expected_answer: "Nueva referencia".to_string()
            }
        );
    }

    struct StalledReformulator;

    #[async_trait]
    impl Reformulator for StalledReformulator {
        async fn reformulate(
            &self,
            _questions: &[QuestionDescriptor],
            _display_name: &str,
        ) -> Result<Vec<QuestionOverride>, LlmError> {
            std::future::pending().await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn reformulation_timeout_returns_raw_exam() {
        let questions: Vec<Question> = (100..110).map(|i| mc(i, None)).collect();
        let bank = QuestionBank::new(vec![], questions);
        let assembler =
            ExamAssembler::new(&Config::default(), Some(Arc::new(StalledReformulator))).with_seed(9);

        let exam = assembler.assemble(&bank, &user()).await;
        assert_eq!(exam.len(), 10);
        assert!(exam.iter().all(|q| q.question_text.starts_with("Pregunta")));
    }
}
