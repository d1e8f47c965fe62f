//! 终端界面
//!
//! 所有面向考生的文字都是西班牙语；日志走 stderr，不会打断这里的输出
use std::io::{self, Write};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::{oneshot, watch};

use crate::models::grade::ExamResult;
use crate::models::question::{Question, QuestionKind};
use crate::services::report_sink::SaveStatus;
use crate::workflow::{format_remaining, ExamSession};

/// 登录表单输入
#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub full_name: String,
    pub cedula: String,
    pub api_key: Option<String>,
}

/// 作答阶段的命令
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Finish,
    Previous,
    Next,
    Jump(usize),
    Answer(String),
}

fn parse_command(input: &str) -> Command {
    let trimmed = input.trim();
    match trimmed {
        ":fin" => Command::Finish,
        ":ant" => Command::Previous,
        "" | ":sig" => Command::Next,
        _ => match trimmed.strip_prefix(":ir") {
            Some(n) => n
                .trim()
                .parse::<usize>()
                .map(Command::Jump)
                .unwrap_or(Command::Next),
            None => Command::Answer(trimmed.to_string()),
        },
    }
}

/// 把输入解析为选项文本：可以输入序号（从 1 开始）或选项原文
pub fn resolve_choice(options: &[String], input: &str) -> Option<String> {
    let input = input.trim();
    if let Ok(n) = input.parse::<usize>() {
        return n.checked_sub(1).and_then(|i| options.get(i)).cloned();
    }
    options
        .iter()
        .find(|opt| opt.trim().to_lowercase() == input.to_lowercase())
        .cloned()
}

/// 交卷确认提示
pub fn finish_summary(answered: usize, total: usize) -> String {
    let mut text = format!("Has respondido {} de {} preguntas.", answered, total);
    if answered < total {
        text.push_str(&format!(
            "\nLas preguntas sin responder ({}) se calificarán con 0.",
            total - answered
        ));
    }
    text
}

pub struct Console {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for Console {
    fn default() -> Self {
        Self::new()
    }
}

impl Console {
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// 读取一行，输入结束时返回 None
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        print!("{}", prompt);
        io::stdout().flush()?;
        self.lines.next_line().await
    }

    pub async fn confirm(&mut self, prompt: &str) -> io::Result<bool> {
        let answer = self.read_line(&format!("{} (s/n): ", prompt)).await?;
        Ok(matches!(
            answer.as_deref().map(|a| a.trim().to_lowercase()).as_deref(),
            Some("s") | Some("si") | Some("sí")
        ))
    }

    /// 读取登录表单
    pub async fn login_form(&mut self) -> io::Result<Option<LoginForm>> {
        println!();
        println!("{}", "=".repeat(60));
        println!("  Evaluación Académica - Comunicación Oral y Escrita");
        println!("{}", "=".repeat(60));

        let Some(full_name) = self.read_line("Nombre Completo (Ej: Juan Pérez): ").await? else {
            return Ok(None);
        };
        let Some(cedula) = self.read_line("Cédula de Identidad (Ej: 1720304050): ").await? else {
            return Ok(None);
        };
        let api_key = self
            .read_line("API Key personal (opcional, Enter para omitir): ")
            .await?
            .filter(|k| !k.trim().is_empty());

        Ok(Some(LoginForm {
            full_name,
            cedula,
            api_key,
        }))
    }

    /// 逐题作答，直到考生确认交卷
    ///
    /// 确认后通过 `finish` 通知计时阶段；输入结束时直接返回，`finish` 被丢弃
    pub async fn answer_loop(
        &mut self,
        session: &ExamSession,
        finish: oneshot::Sender<()>,
    ) -> io::Result<()> {
        let questions = session.questions();
        let total = questions.len();
        let mut index = 0usize;
        let mut shown_passage: Option<u32> = None;

        println!();
        println!("Comandos: número u opción para responder, Enter o :sig = siguiente,");
        println!("          :ant = anterior, :ir N = ir a la pregunta N, :fin = terminar");

        loop {
            if index >= total {
                println!();
                println!("Ha llegado al final del examen. Use :ir N para revisar o :fin para terminar.");
            } else {
                let question = &questions[index];
                if let Some(passage) = session.passage_for(question) {
                    if shown_passage != Some(passage.id) {
                        println!();
                        println!("--- Lectura de Comprensión: {} ---", passage.title);
                        println!("{}", passage.content);
                        shown_passage = Some(passage.id);
                    }
                }
                print_question(session, question, index, total);
            }

            let Some(line) = self.read_line("> ").await? else {
                return Ok(());
            };

            match parse_command(&line) {
                Command::Finish => {
                    println!();
                    println!("¿Terminar Evaluación?");
                    println!(
                        "{}",
                        finish_summary(total - session.unanswered_count(), total)
                    );
                    if self.confirm("Confirmar").await? {
                        let _ = finish.send(());
                        return Ok(());
                    }
                }
                Command::Previous => index = index.saturating_sub(1),
                Command::Next => index = (index + 1).min(total),
                Command::Jump(n) if (1..=total).contains(&n) => index = n - 1,
                Command::Jump(_) => println!("Número de pregunta fuera de rango."),
                Command::Answer(text) if index < total => {
                    let question = &questions[index];
                    let value = match &question.kind {
                        QuestionKind::MultipleChoice { options, .. } => {
                            match resolve_choice(options, &text) {
                                Some(v) => v,
                                None => {
                                    println!("Opción no válida.");
                                    continue;
                                }
                            }
                        }
                        QuestionKind::OpenText { .. } => text,
                    };
                    if session.record_answer(question.id, value) {
                        index = (index + 1).min(total);
                    } else {
                        println!("El examen ya fue enviado.");
                        return Ok(());
                    }
                }
                Command::Answer(_) => println!("Use :ir N o :fin."),
            }
        }
    }
}

fn print_question(session: &ExamSession, question: &Question, index: usize, total: usize) {
    println!();
    println!(
        "[{}] Pregunta {} de {} ({} pts) | Respondidas: {}",
        format_remaining(session.remaining_secs()),
        index + 1,
        total,
        question.points,
        total - session.unanswered_count()
    );
    println!("{}", question.question_text);
    if let QuestionKind::MultipleChoice { options, .. } = &question.kind {
        for (i, opt) in options.iter().enumerate() {
            println!("  {}) {}", i + 1, opt);
        }
    }
    if let Some(current) = session.answer(question.id) {
        println!("  Respuesta actual: {}", current);
    }
}

pub fn print_generating(full_name: &str, exam_length: usize) {
    println!();
    println!("Generando Examen Único");
    println!(
        "Preparando {} preguntas personalizadas para {}...",
        exam_length, full_name
    );
}

pub fn print_grading_started() {
    println!();
    println!("Evaluando Respuestas");
    println!("Analizando cada respuesta con IA. Por favor, no cierre el programa.");
}

/// 打印阅卷进度，直到发送端关闭
pub async fn print_progress(mut rx: watch::Receiver<u8>) {
    while rx.changed().await.is_ok() {
        let p = *rx.borrow_and_update();
        println!("  Progreso: {}%", p);
        if p >= 100 {
            break;
        }
    }
}

pub fn print_result(session: &ExamSession, result: &ExamResult) {
    let user = session.user();
    println!();
    println!("{}", "=".repeat(60));
    println!("  Informe de Resultados");
    println!("  Estudiante: {} ({})", user.full_name, user.cedula);
    println!("{}", "=".repeat(60));
    println!("  Nota: {:.2} sobre 20.00", result.grade_over_20());
    println!("  {}", result.verdict());
    println!(
        "  Puntaje Bruto: {:.1} / {} pts",
        result.total_score, result.max_score
    );
    println!("{}", "-".repeat(60));

    for (idx, (detail, question)) in result
        .details
        .iter()
        .zip(session.questions().iter())
        .enumerate()
    {
        println!(
            "P{} [{:.2}/{}] {}",
            idx + 1,
            detail.points_earned,
            detail.max_points,
            question.question_text
        );
        let answer = if detail.user_answer.trim().is_empty() {
            "SIN RESPUESTA"
        } else {
            detail.user_answer.as_str()
        };
        println!("    Respuesta: {}", answer);
        println!("    Retroalimentación: {}", detail.feedback());
    }
    println!("{}", "=".repeat(60));
}

/// 等待上报结束并打印状态
pub async fn print_save_status(mut rx: watch::Receiver<SaveStatus>) {
    println!("Guardando calificación y retroalimentación...");
    let status = rx
        .wait_for(|s| matches!(s, SaveStatus::Success | SaveStatus::Error))
        .await
        .map(|s| *s)
        .unwrap_or(SaveStatus::Error);

    match status {
        SaveStatus::Success => println!("Resultados registrados correctamente."),
        _ => {
            println!("Error de Conexión");
            println!(
                "No se pudo guardar la nota automáticamente. Revise su conexión o la configuración del servicio."
            );
        }
    }
}
