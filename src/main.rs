mod ai;
mod bot;
mod chat;
mod cli;
mod command;
mod config;
mod cooldown;
mod github;
mod logging;

use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::{error, info};

use chat::Chat;
use config::TonyConfig;
use logging::LogTarget;

/// Tony: a friendly robot assistant in your terminal and on GitHub issues.
#[derive(Parser)]
#[command(name = "tony", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Interactive chat: ask Tony directly or relay `/ai` comments to GitHub (default)
    Chat,
    /// Answer the `/ai` comment in the webhook payload at $GITHUB_EVENT_PATH
    Bot,
}

#[tokio::main]
async fn main() -> ExitCode {
    // .env ファイルから環境変数を読み込む
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Chat);

    let target = match command {
        Command::Chat => LogTarget::File,
        Command::Bot => LogTarget::Stderr,
    };
    // _guard は main 終了まで保持する必要がある
    let _guard = logging::init_logging(target);
    info!("tony started");

    let config = TonyConfig::load();

    match command {
        Command::Chat => {
            let mut chat = Chat::new(config);
            let code = chat.run().await;
            info!(exit_code = code, "tony chat shutting down");
            ExitCode::from(code.clamp(0, 255) as u8)
        }
        Command::Bot => match bot::run_bot(&config).await {
            Ok(outcome) => {
                info!(outcome = ?outcome, "tony bot finished");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(error = %format!("{e:#}"), "tony bot failed");
                eprintln!("tony: {e:#}");
                ExitCode::FAILURE
            }
        },
    }
}
