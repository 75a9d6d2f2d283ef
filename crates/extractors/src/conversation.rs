use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Render messages as numbered `[i] ROLE: content` lines.
pub fn format_conversation(messages: &[ChatMessage]) -> String {
    messages
        .iter()
        .enumerate()
        .map(|(i, m)| format!("[{}] {}: {}", i + 1, m.role.to_uppercase(), m.content.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Number of conversation turns in `text`.
///
/// Counts `[i] ROLE:` lines when present; otherwise every non-empty line is
/// a turn.  Non-empty text always counts at least one.
pub fn count_messages(text: &str) -> usize {
    let formatted = text.lines().filter(|line| is_turn_line(line)).count();
    if formatted > 0 {
        return formatted;
    }
    let lines = text.lines().filter(|line| !line.trim().is_empty()).count();
    if lines == 0 && !text.trim().is_empty() {
        1
    } else {
        lines
    }
}

fn is_turn_line(line: &str) -> bool {
    let Some(rest) = line.trim_start().strip_prefix('[') else {
        return false;
    };
    let Some((index, tail)) = rest.split_once(']') else {
        return false;
    };
    !index.is_empty() && index.chars().all(|c| c.is_ascii_digit()) && tail.contains(':')
}

/// Parse the input accepted by the CLI: a JSON array of messages, or plain
/// text used as-is.
pub fn conversation_from_input(raw: &str) -> String {
    match serde_json::from_str::<Vec<ChatMessage>>(raw) {
        Ok(messages) => format_conversation(&messages),
        Err(_) => raw.trim().to_string(),
    }
}
