use regex::Regex;

/// 从模型回复中截取 JSON 片段
///
/// 去掉 Markdown 代码块标记，取第一个 `{` 或 `[` 到对应最后一个闭合符号之间的内容；
/// 找不到时原样返回去除标记后的文本
pub fn extract_json(raw: &str) -> String {
    let clean = match Regex::new(r"```(?:json|JSON)?") {
        Ok(re) => re.replace_all(raw, "").into_owned(),
        Err(_) => raw.replace("```json", "").replace("```", ""),
    };
    let clean = clean.trim();

    let brace = clean.find('{');
    let bracket = clean.find('[');

    let (start, end) = match (brace, bracket) {
        (Some(b), Some(k)) if b < k => (Some(b), clean.rfind('}')),
        (Some(b), None) => (Some(b), clean.rfind('}')),
        (_, Some(k)) => (Some(k), clean.rfind(']')),
        (None, None) => (None, None),
    };

    match (start, end) {
        (Some(s), Some(e)) if e > s => clean[s..=e].to_string(),
        _ => clean.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_code_fences() {
        let raw = "```json\n{\"score\": 1.5, \"feedback\": \"ok\"}\n```";
        assert_eq!(extract_json(raw), "{\"score\": 1.5, \"feedback\": \"ok\"}");
    }

    #[test]
    fn picks_array_when_it_comes_first() {
        let raw = "Aquí está: [{\"id\": 1}] fin";
        assert_eq!(extract_json(raw), "[{\"id\": 1}]");
    }

    #[test]
    fn plain_text_is_returned_trimmed() {
        assert_eq!(extract_json("  sin json  "), "sin json");
    }
}
