//! チャット入力の分類

/// 1 行の入力が表す操作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatInput {
    /// Tony に直接質問する
    Ask(String),
    /// GitHub に `/ai <prompt>` を投稿する
    Send(String),
    /// ボットの返信を確認する
    Check,
    Status,
    Help,
    Exit,
    Unknown(String),
    Empty,
}

/// 入力行を分類する。`/` で始まる行はコマンド、それ以外は質問。
pub fn parse_input(line: &str) -> ChatInput {
    let line = line.trim();
    if line.is_empty() {
        return ChatInput::Empty;
    }
    if !line.starts_with('/') {
        return ChatInput::Ask(line.to_string());
    }

    let (command, rest) = match line.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (line, ""),
    };
    match command {
        "/send" => ChatInput::Send(rest.to_string()),
        "/check" => ChatInput::Check,
        "/status" => ChatInput::Status,
        "/help" => ChatInput::Help,
        "/exit" | "/quit" => ChatInput::Exit,
        other => ChatInput::Unknown(other.to_string()),
    }
}

pub const HELP_TEXT: &str = "\
**Commands**

- `<question>`: ask Tony directly
- `/send <prompt>`: post `/ai <prompt>` to the configured GitHub issue
- `/check`: look for the bot's reply to your last `/send`
- `/status`: show OpenAI and relay settings
- `/exit`: leave the chat
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_is_a_question() {
        assert_eq!(parse_input("  what is rust? "), ChatInput::Ask("what is rust?".to_string()));
    }

    #[test]
    fn send_keeps_the_prompt() {
        assert_eq!(
            parse_input("/send summarize the thread"),
            ChatInput::Send("summarize the thread".to_string())
        );
        assert_eq!(parse_input("/send"), ChatInput::Send(String::new()));
    }

    #[test]
    fn known_commands() {
        assert_eq!(parse_input("/check"), ChatInput::Check);
        assert_eq!(parse_input("/status"), ChatInput::Status);
        assert_eq!(parse_input("/help"), ChatInput::Help);
        assert_eq!(parse_input("/quit"), ChatInput::Exit);
        assert_eq!(parse_input(""), ChatInput::Empty);
    }

    #[test]
    fn unknown_command_is_reported() {
        assert_eq!(parse_input("/aim high"), ChatInput::Unknown("/aim".to_string()));
    }
}
