//! チャットの各操作
//!
//! 直接質問・リレー送信・リレー確認の 3 つのハンドラ。
//! いずれも `SessionState` を受け取って更新し、表示内容を `ChatReply` で返す。
//! 端末への出力は行わない。

use std::time::Instant;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::ai::{ChatBackend, TonyAI};
use crate::command::relay_command;
use crate::config::{GithubSettings, TonyConfig};
use crate::cooldown::{CacheHit, SessionState};
use crate::github::{find_latest_bot_reply, GithubClient};

/// ハンドラが返す表示内容
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatReply {
    Answer(String),
    /// キャッシュからの回答（注記付き）。`failed` は診断メッセージのキャッシュ。
    Cached {
        hit: CacheHit,
        text: String,
        failed: bool,
    },
    Warning(String),
    Info(String),
    Error(String),
    Posted { comment_id: u64, url: Option<String> },
    BotReply { body: String, url: Option<String> },
}

pub const MISSING_KEY_MESSAGE: &str =
    "No OpenAI API key found. Set OPENAI_API_KEY or add it to ~/.config/tony/config.toml:\n[openai]\napi_key = \"sk-...\"";

pub const MISSING_GITHUB_MESSAGE: &str =
    "Missing GitHub settings. Set GITHUB_PAT, GITHUB_OWNER, GITHUB_REPO and GITHUB_ISSUE_NUMBER to use the relay.";

/// GitHub リレー先（1 つの Issue スレッド）
pub struct GithubRelay {
    client: GithubClient,
    issue_number: u64,
    per_page: u32,
    bot_logins: Vec<String>,
}

impl GithubRelay {
    /// 設定が揃っていればリレーを作成する。揃っていなければ `Ok(None)`。
    pub fn from_settings(settings: &GithubSettings) -> Result<Option<Self>> {
        let (Some(token), Some(repo), Some(issue_number)) = (
            settings.effective_token(),
            settings.repo_ref(),
            settings.issue_number,
        ) else {
            return Ok(None);
        };
        let client = GithubClient::new(&settings.api_base, token, repo)?;
        Ok(Some(Self {
            client,
            issue_number,
            per_page: settings.per_page,
            bot_logins: settings.bot_logins.clone(),
        }))
    }

    /// プロンプト表示用の `owner/repo#N`
    pub fn target(&self) -> String {
        format!("{}#{}", self.client.repo(), self.issue_number)
    }
}

/// Tony に直接質問する。
///
/// `ai` が `None` なら API キー未設定のエラーを返す。
/// 同じプロンプトの回答がキャッシュにあれば、リモート呼び出しをせずにそれを返す。
pub async fn ask_direct<B: ChatBackend>(
    state: &mut SessionState,
    ai: Option<&TonyAI<B>>,
    prompt: &str,
    now: Instant,
) -> ChatReply {
    let Some(ai) = ai else {
        return ChatReply::Error(MISSING_KEY_MESSAGE.to_string());
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return ChatReply::Warning("Please enter a prompt.".to_string());
    }

    if let Some(cached) = state.cached_answer(prompt, now) {
        debug!(hit = ?cached.hit, failed = cached.failed, "Serving cached answer");
        return ChatReply::Cached {
            hit: cached.hit,
            text: cached.hit.annotate(cached.text),
            failed: cached.failed,
        };
    }

    match ai.ask(prompt).await {
        Ok(outcome) => {
            debug!(attempts = outcome.attempts(), answered = outcome.is_answer(), "Direct ask finished");
            let text = outcome.render();
            // 失敗メッセージもキャッシュし、連打でクォータを消費しないようにする
            state.remember_answer(prompt, &text, !outcome.is_answer(), now);
            if outcome.is_answer() {
                ChatReply::Answer(text)
            } else {
                ChatReply::Error(text)
            }
        }
        Err(e) => ChatReply::Error(format!("OpenAI error: {e:#}")),
    }
}

/// `/ai <prompt>` を GitHub Issue に投稿する。
pub async fn relay_send(
    state: &mut SessionState,
    relay: Option<&GithubRelay>,
    prompt: &str,
    now: Instant,
) -> ChatReply {
    let Some(relay) = relay else {
        return ChatReply::Error(MISSING_GITHUB_MESSAGE.to_string());
    };
    let prompt = prompt.trim();
    if prompt.is_empty() {
        return ChatReply::Warning("Please enter a prompt.".to_string());
    }
    if let Some(remaining) = state.relay_send.remaining(now) {
        debug!(remaining_ms = remaining.as_millis() as u64, "Relay send throttled");
        return ChatReply::Warning(
            "Please wait a few seconds before sending another GitHub comment.".to_string(),
        );
    }

    match relay
        .client
        .post_comment(relay.issue_number, &relay_command(prompt))
        .await
    {
        Ok(posted) => {
            info!(comment_id = posted.id, target = %relay.target(), "Relayed prompt to GitHub");
            state.last_comment_id = Some(posted.id);
            state.last_discussion_url = posted.html_url.clone();
            state.relay_send.mark(now);
            ChatReply::Posted {
                comment_id: posted.id,
                url: posted.html_url,
            }
        }
        Err(e) => {
            warn!(error = %e, "Relay send failed");
            ChatReply::Error(format!("Failed to post to GitHub: {e:#}"))
        }
    }
}

/// 最後に投稿したコメント以降のボット返信を探す。
pub async fn relay_check(
    state: &mut SessionState,
    relay: Option<&GithubRelay>,
    now: Instant,
) -> ChatReply {
    let Some(relay) = relay else {
        return ChatReply::Error(MISSING_GITHUB_MESSAGE.to_string());
    };
    if state.relay_check.is_active(now) {
        return ChatReply::Info("Please wait a moment before checking again.".to_string());
    }

    match relay
        .client
        .list_comments(relay.issue_number, relay.per_page)
        .await
    {
        Ok(comments) => {
            state.relay_check.mark(now);
            match find_latest_bot_reply(&comments, state.last_comment_id, &relay.bot_logins) {
                Some(reply) => ChatReply::BotReply {
                    body: reply
                        .body
                        .clone()
                        .filter(|b| !b.trim().is_empty())
                        .unwrap_or_else(|| "_(empty)_".to_string()),
                    url: reply.html_url.clone(),
                },
                None => ChatReply::Info(
                    "No new bot reply yet. Try again in a few seconds.".to_string(),
                ),
            }
        }
        Err(e) => {
            warn!(error = %e, "Relay check failed");
            ChatReply::Error(format!("Failed to fetch comments: {e:#}"))
        }
    }
}

/// 設定状況の 1 行サマリー
pub fn status_line(config: &TonyConfig) -> String {
    let on_off = |on: bool| if on { "ON" } else { "OFF" };
    let models = config.openai.candidate_models();
    let (primary, fallbacks) = match models.split_first() {
        Some((primary, rest)) => (primary.as_str(), rest.join(", ")),
        None => ("-", String::new()),
    };
    format!(
        "OpenAI key: **{}** · Org hdr: **{}** · Model: **{primary}** (fallbacks: {}) · Relay: **{}**",
        on_off(config.openai.effective_api_key().is_some()),
        on_off(config.openai.effective_organization().is_some()),
        if fallbacks.is_empty() { "none".to_string() } else { fallbacks },
        on_off(config.github.relay_ready()),
    )
}
