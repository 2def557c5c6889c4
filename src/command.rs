//! `/ai` コマンドの抽出
//!
//! コメント本文からトリガーマーカーを探し、後続のプロンプト文字列を取り出す。

/// トリガーマーカー。末尾の空白は `/aim` のような誤検出を防ぐため必須。
pub const TRIGGER_MARKER: &str = "/ai ";

/// コメント本文から最初の `/ai ` 以降のテキストを取り出す。
///
/// - マーカーがなければ `None`
/// - マーカー以降が空白のみでも `None`
/// - 2 つ目以降の `/ai` はプロンプトの一部としてそのまま残す
pub fn extract_command(body: &str) -> Option<&str> {
    let idx = body.find(TRIGGER_MARKER)?;
    let prompt = body[idx + TRIGGER_MARKER.len()..].trim();
    if prompt.is_empty() {
        None
    } else {
        Some(prompt)
    }
}

/// リレー送信用のコメント本文 (`/ai <prompt>`) を組み立てる。
pub fn relay_command(prompt: &str) -> String {
    format!("{TRIGGER_MARKER}{}", prompt.trim())
}
