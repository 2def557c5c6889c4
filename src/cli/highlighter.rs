use nu_ansi_term::{Color, Style};
use reedline::{Highlighter, StyledText};

use super::color::Tone;

/// チャット入力用のハイライター
///
/// - スラッシュコマンド（`/send` など）: Magenta + Bold
/// - それ以外（Tony への質問）: 明るい白
pub struct TonyHighlighter;

impl Highlighter for TonyHighlighter {
    fn highlight(&self, line: &str, _cursor: usize) -> StyledText {
        let mut styled = StyledText::new();
        let plain = Style::new().fg(Color::Rgb(255, 255, 255));

        if !line.trim_start().starts_with('/') {
            styled.push((plain, line.to_string()));
            return styled;
        }

        // 先頭のコマンド語だけ色を付ける
        let leading = line.len() - line.trim_start().len();
        let end = line[leading..]
            .find(char::is_whitespace)
            .map(|i| leading + i)
            .unwrap_or(line.len());
        styled.push((Style::default(), line[..leading].to_string()));
        styled.push((Tone::Command.style(), line[leading..end].to_string()));
        styled.push((plain, line[end..].to_string()));
        styled
    }
}
