//! クールダウンとセッションキャッシュ
//!
//! 同一セッション内での連続呼び出しを抑制する。プロセスをまたいだ同期は行わない。
//! 時刻は呼び出し側から `Instant` で受け取るため、スリープなしでテストできる。

use std::time::{Duration, Instant};

use crate::config::CooldownSettings;

/// 最後の呼び出し時刻と抑制ウィンドウ
#[derive(Debug, Clone)]
pub struct Cooldown {
    window: Duration,
    last_call: Option<Instant>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_call: None,
        }
    }

    /// `now` がまだウィンドウ内か。一度も呼ばれていなければ `false`。
    pub fn is_active(&self, now: Instant) -> bool {
        self.remaining(now).is_some()
    }

    /// ウィンドウ明けまでの残り時間
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        let last = self.last_call?;
        let elapsed = now.saturating_duration_since(last);
        if elapsed < self.window {
            Some(self.window - elapsed)
        } else {
            None
        }
    }

    pub fn mark(&mut self, now: Instant) {
        self.last_call = Some(now);
    }
}

/// キャッシュから返した理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHit {
    /// クールダウン中の同一プロンプト
    Cooldown,
    /// ウィンドウ外だが直前と同じプロンプト
    Repeat,
}

impl CacheHit {
    /// 回答の末尾に付ける注記
    pub fn annotate(self, answer: &str) -> String {
        match self {
            CacheHit::Cooldown => format!("{answer}  \n_(cached during cooldown)_"),
            CacheHit::Repeat => format!("{answer}  \n_(cached)_"),
        }
    }
}

/// キャッシュから取り出した直前の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachedAnswer<'a> {
    pub hit: CacheHit,
    pub text: &'a str,
    /// 失敗時の診断メッセージをキャッシュしたものか
    pub failed: bool,
}

/// 1 回の対話セッションの状態。各ハンドラに `&mut` で渡す。
#[derive(Debug, Clone)]
pub struct SessionState {
    pub direct: Cooldown,
    pub relay_send: Cooldown,
    pub relay_check: Cooldown,
    pub last_prompt: Option<String>,
    pub last_answer: Option<String>,
    pub last_answer_failed: bool,
    /// リレーで最後に投稿したコメントの id（返信検出の起点）
    pub last_comment_id: Option<u64>,
    pub last_discussion_url: Option<String>,
}

impl SessionState {
    pub fn new(settings: &CooldownSettings) -> Self {
        Self {
            direct: Cooldown::new(settings.direct()),
            relay_send: Cooldown::new(settings.relay_send()),
            relay_check: Cooldown::new(settings.relay_check()),
            last_prompt: None,
            last_answer: None,
            last_answer_failed: false,
            last_comment_id: None,
            last_discussion_url: None,
        }
    }

    /// 同じプロンプトへの回答がキャッシュにあれば、その理由を返す。
    pub fn cached_answer(&self, prompt: &str, now: Instant) -> Option<CachedAnswer<'_>> {
        if self.last_prompt.as_deref() != Some(prompt) {
            return None;
        }
        let answer = self.last_answer.as_deref()?;
        let hit = if self.direct.is_active(now) {
            CacheHit::Cooldown
        } else {
            CacheHit::Repeat
        };
        Some(CachedAnswer {
            hit,
            text: answer,
            failed: self.last_answer_failed,
        })
    }

    /// 直接呼び出しの結果を記録する（失敗メッセージも含む）。
    pub fn remember_answer(&mut self, prompt: &str, answer: &str, failed: bool, now: Instant) {
        self.last_prompt = Some(prompt.to_string());
        self.last_answer = Some(answer.to_string());
        self.last_answer_failed = failed;
        self.direct.mark(now);
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(&CooldownSettings::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_cooldown_is_inactive() {
        let cooldown = Cooldown::new(Duration::from_secs(8));
        assert!(!cooldown.is_active(Instant::now()));
    }

    #[test]
    fn cooldown_expires_after_window() {
        let start = Instant::now();
        let mut cooldown = Cooldown::new(Duration::from_secs(8));
        cooldown.mark(start);

        assert!(cooldown.is_active(start + Duration::from_secs(7)));
        assert_eq!(
            cooldown.remaining(start + Duration::from_secs(3)),
            Some(Duration::from_secs(5))
        );
        assert!(!cooldown.is_active(start + Duration::from_secs(8)));
    }

    #[test]
    fn same_prompt_inside_window_is_cooldown_hit() {
        let start = Instant::now();
        let mut state = SessionState::default();
        state.remember_answer("hi", "hello!", false, start);

        let cached = state.cached_answer("hi", start + Duration::from_secs(3)).unwrap();
        assert_eq!(cached.hit, CacheHit::Cooldown);
        assert!(!cached.failed);
        assert_eq!(cached.hit.annotate(cached.text), "hello!  \n_(cached during cooldown)_");
    }

    #[test]
    fn same_prompt_after_window_is_repeat_hit() {
        let start = Instant::now();
        let mut state = SessionState::default();
        state.remember_answer("hi", "hello!", false, start);

        let cached = state.cached_answer("hi", start + Duration::from_secs(60)).unwrap();
        assert_eq!(cached.hit, CacheHit::Repeat);
        assert_eq!(cached.hit.annotate(cached.text), "hello!  \n_(cached)_");
    }

    #[test]
    fn different_prompt_misses_cache() {
        let start = Instant::now();
        let mut state = SessionState::default();
        state.remember_answer("hi", "hello!", false, start);
        assert!(state.cached_answer("bye", start).is_none());
    }

    #[test]
    fn cached_failure_keeps_its_flag() {
        let start = Instant::now();
        let mut state = SessionState::default();
        state.remember_answer("hi", "OpenAI request failed", true, start);

        let cached = state.cached_answer("hi", start + Duration::from_secs(1)).unwrap();
        assert!(cached.failed);

        state.remember_answer("hi", "hello!", false, start + Duration::from_secs(30));
        assert!(!state.cached_answer("hi", start + Duration::from_secs(31)).unwrap().failed);
    }
}
