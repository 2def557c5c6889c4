//! Tony の配色
//!
//! 色は用途（トーン）で選ぶ。呼び出し側は具体的な色を知らない。

use nu_ansi_term::{Color, Style};

/// 表示上の役割ごとの配色
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Tony の発話と時刻
    Speech,
    /// モデル名とプロンプト記号
    Model,
    /// クールダウンやリレー先などの注意書き
    Notice,
    Failure,
    /// 区切り線と名前
    Frame,
    /// バナーのタイトル
    Title,
    /// 入力行のスラッシュコマンド
    Command,
}

impl Tone {
    pub fn style(self) -> Style {
        match self {
            Tone::Speech => Style::new().fg(Color::LightGray),
            Tone::Model => Style::new().fg(Color::LightGreen),
            Tone::Notice => Style::new().fg(Color::Yellow),
            Tone::Failure => Style::new().fg(Color::LightRed),
            Tone::Frame => Style::new().fg(Color::Cyan),
            Tone::Title => Color::Cyan.bold(),
            Tone::Command => Color::Magenta.bold(),
        }
    }

    pub fn paint(self, text: &str) -> String {
        self.style().paint(text).to_string()
    }
}
