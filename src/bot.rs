//! GitHub Actions から起動されるボット
//!
//! `issue_comment` Webhook ペイロードを読み、`/ai <prompt>` に Tony の回答を返信する。
//! 設定不足や対象外のイベントはソフト終了（終了コード 0）とし、
//! 回答生成の失敗は診断メッセージとしてスレッドに投稿する。

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::ai::{ChatBackend, CompletionOutcome, TonyAI};
use crate::command::extract_command;
use crate::config::TonyConfig;
use crate::github::types::CommentTrigger;
use crate::github::{GithubClient, IssueCommentEvent};

/// ペイロードファイルのパスを指す環境変数
pub const EVENT_PATH_ENV: &str = "GITHUB_EVENT_PATH";

/// 返信せずに終了した理由
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    MissingRepo,
    MissingToken,
    MissingEventPath,
    EventUnreadable(String),
    MalformedPayload(String),
    BotAuthor(String),
    NoCommand,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::MissingRepo => write!(f, "missing REPO (owner/repo)"),
            SkipReason::MissingToken => write!(f, "missing GITHUB_TOKEN"),
            SkipReason::MissingEventPath => write!(f, "{EVENT_PATH_ENV} not set or file missing"),
            SkipReason::EventUnreadable(e) => write!(f, "event payload unreadable: {e}"),
            SkipReason::MalformedPayload(field) => {
                write!(f, "unexpected event payload, missing {field}")
            }
            SkipReason::BotAuthor(login) => write!(f, "ignoring bot comment from {login}"),
            SkipReason::NoCommand => write!(f, "no '/ai ' command found"),
        }
    }
}

/// ボット実行の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotOutcome {
    Posted { comment_id: u64 },
    Skipped(SkipReason),
}

/// 環境変数と設定からボットを実行する。
pub async fn run_bot(config: &TonyConfig) -> Result<BotOutcome> {
    let event_path = std::env::var_os(EVENT_PATH_ENV).map(PathBuf::from);
    // ボット返信にはトークン上限を付けない
    let ai = TonyAI::from_settings(&config.openai, None);
    run_bot_with(config, event_path.as_deref(), ai).await
}

/// AI クライアントを差し込んでボットを実行する。
///
/// `ai` が `Err` の場合（API キー未設定など）は、その内容を診断としてスレッドに投稿する。
pub async fn run_bot_with<B: ChatBackend>(
    config: &TonyConfig,
    event_path: Option<&Path>,
    ai: Result<TonyAI<B>>,
) -> Result<BotOutcome> {
    let Some(repo) = config.github.repo_ref() else {
        return Ok(skip(SkipReason::MissingRepo));
    };
    let Some(token) = config.github.effective_token() else {
        return Ok(skip(SkipReason::MissingToken));
    };

    let trigger = match load_trigger(event_path) {
        Ok(trigger) => trigger,
        Err(reason) => return Ok(skip(reason)),
    };
    debug!(
        issue_number = trigger.issue_number,
        author = %trigger.author,
        "Event payload loaded"
    );

    if is_bot_author(&trigger.author, &config.github.bot_logins) {
        return Ok(skip(SkipReason::BotAuthor(trigger.author)));
    }

    let Some(prompt) = extract_command(&trigger.body) else {
        return Ok(skip(SkipReason::NoCommand));
    };
    info!(issue_number = trigger.issue_number, prompt_length = prompt.len(), "Answering /ai command");

    let answer = answer_prompt(&ai, prompt).await;
    let reply = format_reply(&answer, &trigger.author);

    let client = GithubClient::new(&config.github.api_base, token, repo)?;
    let posted = client
        .post_comment(trigger.issue_number, &reply)
        .await
        .context("Failed to post comment")?;

    println!("Reply posted.");
    Ok(BotOutcome::Posted {
        comment_id: posted.id,
    })
}

fn skip(reason: SkipReason) -> BotOutcome {
    warn!(reason = %reason, "Bot exiting without reply");
    println!("{reason}; exiting.");
    BotOutcome::Skipped(reason)
}

/// ペイロードファイルを読み、トリガー情報を取り出す。
fn load_trigger(event_path: Option<&Path>) -> Result<CommentTrigger, SkipReason> {
    let path = event_path
        .filter(|p| p.exists())
        .ok_or(SkipReason::MissingEventPath)?;
    let content =
        std::fs::read_to_string(path).map_err(|e| SkipReason::EventUnreadable(e.to_string()))?;
    let event: IssueCommentEvent = serde_json::from_str(&content)
        .map_err(|e| SkipReason::EventUnreadable(e.to_string()))?;
    event
        .trigger()
        .map_err(|field| SkipReason::MalformedPayload(field.to_string()))
}

/// 投稿者がボット（`[bot]` 接尾辞または設定されたログイン）かどうか。
pub fn is_bot_author(login: &str, bot_logins: &[String]) -> bool {
    login.ends_with("[bot]") || bot_logins.iter().any(|b| b == login)
}

async fn answer_prompt<B: ChatBackend>(ai: &Result<TonyAI<B>>, prompt: &str) -> String {
    let ai = match ai {
        Ok(ai) => ai,
        Err(e) => {
            warn!(error = %e, "AI client unavailable, posting diagnostic");
            return failure_message("configuration", &format!("{e:#}"));
        }
    };

    match ai.ask(prompt).await {
        Ok(outcome) => match &outcome {
            CompletionOutcome::Answer { .. } => outcome.render(),
            CompletionOutcome::Failed { class, .. } => {
                failure_message(&class.to_string(), &outcome.render())
            }
        },
        Err(e) => failure_message("request", &format!("{e:#}")),
    }
}

fn failure_message(class: &str, details: &str) -> String {
    format!(
        "Sorry, I couldn't generate a reply right now. Error: `{class}`. Please try again.\n\n{details}"
    )
}

/// 返信コメントの Markdown を組み立てる。
pub fn format_reply(answer: &str, author: &str) -> String {
    format!("**Tony (AI):**\n\n{answer}\n\n<sub>Asked by @{author} with `/ai`</sub>")
}
