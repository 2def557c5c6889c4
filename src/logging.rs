//! ログ初期化モジュール
//!
//! `tracing` + `tracing-subscriber` を使用する。
//! - チャット: 端末出力を汚さないよう `var/logs/` に日次ローテーション（ローカル時刻基準）で保存
//! - ボット: CI のログに残るよう stderr に出力

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{fmt, EnvFilter};

/// ログレベルを制御する環境変数
const LOG_ENV: &str = "TONY_LOG";

/// ログの出力先
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogTarget {
    /// `var/logs/tony.log.YYYY-MM-DD`
    File,
    Stderr,
}

/// ログ行のタイムスタンプをローカル時刻で出力するタイマー
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// ローカル日付が変わるたびに新しいファイルへ切り替えるアペンダー。
struct DailyAppender {
    dir: PathBuf,
    prefix: String,
    current_date: NaiveDate,
    file: File,
}

impl DailyAppender {
    fn new(dir: PathBuf, prefix: &str) -> std::io::Result<Self> {
        let today = Local::now().date_naive();
        let file = Self::open_log_file(&dir, prefix, today)?;
        Ok(Self {
            dir,
            prefix: prefix.to_string(),
            current_date: today,
            file,
        })
    }

    fn open_log_file(dir: &Path, prefix: &str, date: NaiveDate) -> std::io::Result<File> {
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(dir.join(log_file_name(prefix, date)))
    }
}

fn log_file_name(prefix: &str, date: NaiveDate) -> String {
    format!("{}.{}", prefix, date.format("%Y-%m-%d"))
}

impl Write for DailyAppender {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let today = Local::now().date_naive();
        if today != self.current_date {
            self.file = Self::open_log_file(&self.dir, &self.prefix, today)?;
            self.current_date = today;
        }
        self.file.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.file.flush()
    }
}

/// ログの出力先ディレクトリ（カレントディレクトリ直下の `var/logs/`）
fn log_dir() -> PathBuf {
    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join("var")
        .join("logs")
}

/// ログシステムを初期化する。
///
/// - ログレベルは `TONY_LOG` 環境変数で制御（デフォルト: ファイルは `debug`、stderr は `info`）
/// - ファイルを開けない場合は stderr にフォールバックする
///
/// 返されたガードは `main()` で保持し続けること（ドロップするとログ出力が停止する）。
pub fn init_logging(target: LogTarget) -> WorkerGuard {
    let default_level = match target {
        LogTarget::File => "debug",
        LogTarget::Stderr => "info",
    };
    let env_filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_appender = match target {
        LogTarget::File => open_file_appender(),
        LogTarget::Stderr => None,
    };

    let (writer, guard) = match file_appender {
        Some(appender) => tracing_appender::non_blocking(appender),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let to_file = target == LogTarget::File;
    let result = fmt()
        .with_env_filter(env_filter)
        .with_writer(writer)
        .with_timer(LocalTimer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(to_file)
        .with_file(to_file)
        .try_init();
    if let Err(e) = result {
        eprintln!("tony: warning: failed to initialize logging: {e}");
    }

    guard
}

fn open_file_appender() -> Option<DailyAppender> {
    let dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&dir) {
        eprintln!(
            "tony: warning: failed to create log directory {}: {e}",
            dir.display()
        );
        return None;
    }
    match DailyAppender::new(dir.clone(), "tony.log") {
        Ok(appender) => Some(appender),
        Err(e) => {
            eprintln!("tony: warning: failed to create log file in {}: {e}", dir.display());
            None
        }
    }
}
