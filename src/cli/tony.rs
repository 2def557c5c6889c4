use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use termimad::MadSkin;

use super::color::Tone;

/// Tony が発話するときに使う共通関数。
/// 先頭に 🤖 絵文字を付与し、白色テキストで表示する。
pub fn tony_talk(message: &str) {
    println!("🤖 {}", Tone::Speech.paint(message));
}

/// 注意メッセージ（クールダウン中など）
pub fn tony_warn(message: &str) {
    println!("⏳ {}", Tone::Notice.paint(message));
}

/// エラーメッセージ。詳細を含むため複数行になりうる。
pub fn tony_error(message: &str) {
    println!("❌ {}", Tone::Failure.paint(message));
}

/// Markdown を端末向けに整形して表示する。
pub fn tony_markdown(markdown: &str) {
    let skin = MadSkin::default();
    skin.print_text(markdown);
}

/// リモート呼び出し中に表示するスピナーを生成・開始する。
/// 呼び出し元で `finish_and_clear()` を呼んでスピナーを停止すること。
pub fn tony_spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("🤖 {spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}
