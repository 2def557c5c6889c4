use std::borrow::Cow;

use chrono::Local;
use reedline::{Color, Prompt, PromptEditMode, PromptHistorySearch, PromptHistorySearchStatus};

use super::color::Tone;

/// チャット用のプロンプト。
///
/// ```text
/// tony via gpt-4o-mini [relay: octocat/hello-world#1]
/// ❯
/// ```
pub struct TonyPrompt {
    model: String,
    /// リレー先の表示（未設定なら `None`）
    relay: Option<String>,
}

impl TonyPrompt {
    pub fn new(model: String, relay: Option<String>) -> Self {
        Self { model, relay }
    }

    fn header(&self) -> String {
        let relay = match self.relay {
            Some(ref target) => format!(" {}", Tone::Notice.paint(&format!("[relay: {target}]"))),
            None => String::new(),
        };
        format!("{} via {}{relay}", Tone::Frame.paint("tony"), Tone::Model.paint(&self.model))
    }
}

impl Prompt for TonyPrompt {
    fn render_prompt_left(&self) -> Cow<'_, str> {
        Cow::Owned(format!("{}\n", self.header()))
    }

    fn get_prompt_color(&self) -> Color {
        Color::White
    }

    fn render_prompt_right(&self) -> Cow<'_, str> {
        let now = Local::now().format("%H:%M:%S").to_string();
        Cow::Owned(Tone::Speech.paint(&now))
    }

    fn render_prompt_indicator(&self, _edit_mode: PromptEditMode) -> Cow<'_, str> {
        Cow::Owned(Tone::Model.paint("\u{276f} "))
    }

    fn render_prompt_multiline_indicator(&self) -> Cow<'_, str> {
        Cow::Borrowed(" :: ")
    }

    fn render_prompt_history_search_indicator(
        &self,
        history_search: PromptHistorySearch,
    ) -> Cow<'_, str> {
        let prefix = match history_search.status {
            PromptHistorySearchStatus::Passing => "",
            PromptHistorySearchStatus::Failing => "(failed) ",
        };
        Cow::Owned(format!("{prefix}(search: '{}') ", history_search.term))
    }
}
