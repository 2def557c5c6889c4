//! Chat モジュール: REPL ループとセッション状態管理
//!
//! `Chat` 構造体にエディタ・AI クライアント・リレー・セッション状態を集約し、
//! 入力の分類とハンドラの呼び出し、結果の表示を行う。

pub mod handlers;
pub mod input;

use std::time::Instant;

use reedline::{Reedline, Signal};
use tracing::{debug, info, warn};

use crate::ai::TonyAI;
use crate::cli::highlighter::TonyHighlighter;
use crate::cli::prompt::TonyPrompt;
use crate::cli::tony::{tony_error, tony_markdown, tony_spinner, tony_talk, tony_warn};
use crate::config::TonyConfig;
use crate::cooldown::{CacheHit, SessionState};

use handlers::{ask_direct, relay_check, relay_send, status_line, ChatReply, GithubRelay};
use input::{parse_input, ChatInput, HELP_TEXT};

/// 対話セッション
pub struct Chat {
    editor: Reedline,
    prompt: TonyPrompt,
    ai: Option<TonyAI>,
    relay: Option<GithubRelay>,
    state: SessionState,
    config: TonyConfig,
}

impl Chat {
    /// 設定から AI クライアントとリレーを初期化する。
    /// どちらも設定不足なら無効化し、該当操作の時点でエラーを表示する。
    pub fn new(config: TonyConfig) -> Self {
        let ai = match TonyAI::from_settings(&config.openai, config.openai.max_tokens) {
            Ok(ai) => Some(ai),
            Err(e) => {
                warn!("AI disabled: {e}");
                eprintln!("tony: warning: direct chat disabled: {e}");
                None
            }
        };

        let relay = match GithubRelay::from_settings(&config.github) {
            Ok(relay) => relay,
            Err(e) => {
                warn!("GitHub relay disabled: {e:#}");
                eprintln!("tony: warning: GitHub relay disabled: {e:#}");
                None
            }
        };

        let model = ai
            .as_ref()
            .and_then(|ai| ai.models().first().cloned())
            .unwrap_or_else(|| "no OpenAI key".to_string());
        let prompt = TonyPrompt::new(model, relay.as_ref().map(GithubRelay::target));

        let editor = Reedline::create().with_highlighter(Box::new(TonyHighlighter));

        Self {
            editor,
            prompt,
            ai,
            relay,
            state: SessionState::new(&config.cooldown),
            config,
        }
    }

    /// REPL ループを実行する。`/exit` または Ctrl-D で終了する。
    ///
    /// 戻り値: 終了コード（REPL 内部エラー時のみ 1）
    pub async fn run(&mut self) -> i32 {
        crate::cli::banner::print_welcome();

        let mut exit_code = 0;
        loop {
            match self.editor.read_line(&self.prompt) {
                Ok(Signal::Success(line)) => {
                    if !self.handle_input(&line).await {
                        break;
                    }
                }
                Ok(Signal::CtrlC) => {
                    println!();
                }
                Ok(Signal::CtrlD) => {
                    info!("Ctrl-D received, exiting chat");
                    break;
                }
                Err(e) => {
                    warn!(error = %e, "REPL error, exiting");
                    eprintln!("tony: error: {e}");
                    exit_code = 1;
                    break;
                }
            }
        }

        crate::cli::banner::print_goodbye();
        exit_code
    }

    /// 1 行の入力を処理する。
    ///
    /// 戻り値: `true` = ループ続行、`false` = 終了
    async fn handle_input(&mut self, line: &str) -> bool {
        let input = parse_input(line);
        debug!(input = ?input, "Chat input received");

        let reply = match input {
            ChatInput::Empty => return true,
            ChatInput::Exit => return false,
            ChatInput::Help => {
                tony_markdown(HELP_TEXT);
                return true;
            }
            ChatInput::Status => {
                tony_markdown(&status_line(&self.config));
                return true;
            }
            ChatInput::Unknown(command) => {
                ChatReply::Warning(format!("Unknown command `{command}`. Type /help."))
            }
            ChatInput::Ask(prompt) => {
                let spinner = tony_spinner("Tony is thinking…");
                let reply =
                    ask_direct(&mut self.state, self.ai.as_ref(), &prompt, Instant::now()).await;
                spinner.finish_and_clear();
                reply
            }
            ChatInput::Send(prompt) => {
                let spinner = tony_spinner("Posting to GitHub…");
                let reply =
                    relay_send(&mut self.state, self.relay.as_ref(), &prompt, Instant::now()).await;
                spinner.finish_and_clear();
                reply
            }
            ChatInput::Check => {
                let spinner = tony_spinner("Checking for a reply…");
                let reply = relay_check(&mut self.state, self.relay.as_ref(), Instant::now()).await;
                spinner.finish_and_clear();
                reply
            }
        };

        render_reply(&reply);
        println!();
        true
    }
}

fn render_reply(reply: &ChatReply) {
    match reply {
        ChatReply::Answer(text) => {
            tony_talk("Tony:");
            tony_markdown(text);
        }
        ChatReply::Cached { hit, text, failed } => {
            if *hit == CacheHit::Cooldown {
                tony_warn("Please wait a few seconds before asking again. Showing cached answer.");
            }
            if *failed {
                tony_error(text);
            } else {
                tony_talk("Tony:");
                tony_markdown(text);
            }
        }
        ChatReply::Warning(message) => tony_warn(message),
        ChatReply::Info(message) => tony_talk(message),
        ChatReply::Error(message) => tony_error(message),
        ChatReply::Posted { comment_id, url } => {
            tony_talk(&format!(
                "Posted to GitHub as comment {comment_id}. The Action bot will reply in the same thread."
            ));
            if let Some(url) = url {
                tony_markdown(&format!("[Open thread on GitHub]({url})"));
            }
        }
        ChatReply::BotReply { body, url } => {
            tony_talk("Bot replied:");
            tony_markdown(body);
            if let Some(url) = url {
                tony_markdown(&format!("[View on GitHub]({url})"));
            }
        }
    }
}
