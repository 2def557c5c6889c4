//! モデルフォールバック
//!
//! 候補モデルを順番に試し、クォータ／レート制限系のエラーのときだけ次のモデルへ進む。
//! それ以外のエラーはその場でループを打ち切る。各モデルは高々 1 回しか呼ばない。

use std::fmt;

use tracing::{debug, info, warn};

use super::client::{ChatBackend, CompletionParams, OpenAiApiError};

/// 失敗の分類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// クォータ不足・レート制限。次のモデルで再試行する。
    Quota,
    /// それ以外。再試行しない。
    Fatal,
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureClass::Quota => write!(f, "quota"),
            FailureClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// クォータ／レート制限を示すエラー文字列の断片
const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "You exceeded your current quota",
    "rate_limit_exceeded",
    "Rate limit",
    "429",
];

/// プロバイダのエラー文字列を分類する。
pub fn classify_failure(error_text: &str) -> FailureClass {
    if QUOTA_MARKERS.iter().any(|m| error_text.contains(m)) {
        FailureClass::Quota
    } else {
        FailureClass::Fatal
    }
}

/// バックエンドのエラーを分類する。HTTP 429 は本文に関係なくクォータ扱い。
pub fn classify_error(error: &anyhow::Error) -> FailureClass {
    match error.downcast_ref::<OpenAiApiError>() {
        Some(api) if api.status == 429 => FailureClass::Quota,
        _ => classify_failure(&format!("{error:#}")),
    }
}

/// フォールバック付き補完の結果
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionOutcome {
    Answer {
        /// 応答したモデル
        model: String,
        text: String,
        /// プライマリ以外のモデルが応答したか
        fallback: bool,
        attempts: usize,
    },
    Failed {
        class: FailureClass,
        /// 最後に試したモデル
        model: String,
        last_error: String,
        attempts: usize,
    },
}

impl CompletionOutcome {
    pub fn attempts(&self) -> usize {
        match self {
            CompletionOutcome::Answer { attempts, .. } | CompletionOutcome::Failed { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_answer(&self) -> bool {
        matches!(self, CompletionOutcome::Answer { .. })
    }

    /// ユーザーに表示するテキスト。
    ///
    /// フォールバックモデルが応答した場合は `(Fallback: <model>)` を前置する。
    /// 失敗時は最後のエラーを含む診断メッセージを返す。
    pub fn render(&self) -> String {
        match self {
            CompletionOutcome::Answer {
                model,
                text,
                fallback: true,
                ..
            } => format!("(Fallback: {model}) {text}"),
            CompletionOutcome::Answer { text, .. } => text.clone(),
            CompletionOutcome::Failed {
                class: FailureClass::Quota,
                last_error,
                ..
            } => format!(
                "OpenAI quota/rate error across all configured models. \
                 Try again later or switch to a key/plan with balance.\n\nDetails: {last_error}"
            ),
            CompletionOutcome::Failed {
                class: FailureClass::Fatal,
                model,
                last_error,
                ..
            } => format!("OpenAI request failed on {model}.\n\nDetails: {last_error}"),
        }
    }
}

/// 候補モデルを順に試して最初に成功した応答を返す。
///
/// `models` の先頭をプライマリとみなす。試行回数は `models.len()` を超えない。
pub async fn complete_with_fallback<B: ChatBackend>(
    backend: &B,
    models: &[String],
    system: &str,
    prompt: &str,
    params: &CompletionParams,
) -> CompletionOutcome {
    let Some(primary) = models.first() else {
        return CompletionOutcome::Failed {
            class: FailureClass::Fatal,
            model: String::new(),
            last_error: "no models configured".to_string(),
            attempts: 0,
        };
    };

    let mut attempts = 0;
    let mut last: Option<(FailureClass, String, String)> = None;

    for model in models {
        attempts += 1;
        debug!(model = %model, attempt = attempts, "Requesting chat completion");

        match backend.chat_once(model, system, prompt, params).await {
            Ok(text) => {
                let fallback = model != primary;
                info!(model = %model, attempt = attempts, fallback, "Chat completion succeeded");
                return CompletionOutcome::Answer {
                    model: model.clone(),
                    text: text.trim().to_string(),
                    fallback,
                    attempts,
                };
            }
            Err(e) => {
                let error_text = format!("{e:#}");
                let class = classify_error(&e);
                warn!(
                    model = %model,
                    attempt = attempts,
                    class = %class,
                    error = %error_text,
                    "Chat completion failed"
                );
                last = Some((class, model.clone(), error_text));
                if class == FailureClass::Fatal {
                    break;
                }
            }
        }
    }

    let (class, model, last_error) =
        last.unwrap_or((FailureClass::Fatal, primary.clone(), "no attempt made".to_string()));
    CompletionOutcome::Failed {
        class,
        model,
        last_error,
        attempts,
    }
}
