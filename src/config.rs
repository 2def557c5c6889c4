//! 設定ファイル管理
//!
//! `~/.config/tony/config.toml` から TOML 形式の設定を読み込み、
//! 環境変数で上書きする。ファイルが存在しない場合はテンプレートを生成し、デフォルト値を使用する。
//!
//! # 設定ファイル例
//!
//! ```toml
//! [openai]
//! primary_model = "gpt-4o-mini"
//! fallback_models = ["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo"]
//!
//! [github]
//! owner = "octocat"
//! repo = "hello-world"
//! issue_number = 1
//! bot_logins = ["github-actions[bot]"]
//!
//! [cooldown]
//! direct_secs = 15
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::github::RepoRef;

/// Tony の設定全体
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct TonyConfig {
    /// OpenAI 関連設定
    pub openai: OpenAiSettings,
    /// GitHub リレー関連設定
    pub github: GithubSettings,
    /// クールダウン設定
    pub cooldown: CooldownSettings,
}

/// OpenAI 関連の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub organization: Option<String>,
    /// 最初に試すモデル
    pub primary_model: String,
    /// クォータ／レート制限時に順番に試すモデル
    pub fallback_models: Vec<String>,
    pub temperature: f32,
    /// チャット UI でのみ使用する最大トークン数
    pub max_tokens: Option<u32>,
    /// API ベース URL の上書き（プロキシ・テスト用）
    pub api_base: Option<String>,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            organization: None,
            primary_model: "gpt-4o-mini".to_string(),
            fallback_models: vec![
                "gpt-4o-mini-2024-07-18".to_string(),
                "gpt-3.5-turbo".to_string(),
            ],
            temperature: 0.7,
            max_tokens: Some(300),
            api_base: None,
        }
    }
}

impl OpenAiSettings {
    /// 有効な API キーを返す。空文字列やテンプレートのままの値は未設定扱い。
    pub fn effective_api_key(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty() && *k != "your_openai_api_key")
    }

    /// Organization ヘッダーを付与するかどうか。
    ///
    /// プロジェクトキー (`sk-proj-`) に組織を付けるとクォータ不一致になるため付与しない。
    pub fn effective_organization(&self) -> Option<&str> {
        let org = self
            .organization
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())?;
        match self.effective_api_key() {
            Some(key) if !key.starts_with("sk-proj-") => Some(org),
            _ => None,
        }
    }

    /// 試行するモデルの順序付きリスト（プライマリ → フォールバック）。
    /// 空のモデル名と重複は取り除く。
    pub fn candidate_models(&self) -> Vec<String> {
        let mut models: Vec<String> = Vec::new();
        let all = std::iter::once(&self.primary_model).chain(self.fallback_models.iter());
        for model in all {
            let model = model.trim();
            if !model.is_empty() && !models.iter().any(|m| m == model) {
                models.push(model.to_string());
            }
        }
        models
    }
}

/// GitHub リレー関連の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubSettings {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub issue_number: Option<u64>,
    pub api_base: String,
    /// コメント一覧取得時のページサイズ
    pub per_page: u32,
    /// 「自動化アカウントの返信」とみなすログイン名
    pub bot_logins: Vec<String>,
}

impl Default for GithubSettings {
    fn default() -> Self {
        Self {
            token: None,
            owner: None,
            repo: None,
            issue_number: None,
            api_base: "https://api.github.com".to_string(),
            per_page: 30,
            bot_logins: vec!["github-actions[bot]".to_string()],
        }
    }
}

impl GithubSettings {
    /// トークンが空でなければ返す。
    pub fn effective_token(&self) -> Option<&str> {
        self.token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
    }

    /// owner / repo が揃っていれば `RepoRef` を返す。
    pub fn repo_ref(&self) -> Option<RepoRef> {
        let owner = self.owner.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let name = self.repo.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        Some(RepoRef {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }

    /// リレー（チャット UI の GitHub タブ）に必要な設定がすべて揃っているか。
    pub fn relay_ready(&self) -> bool {
        self.effective_token().is_some() && self.repo_ref().is_some() && self.issue_number.is_some()
    }
}

/// クールダウン秒数の設定
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CooldownSettings {
    /// OpenAI 直接呼び出し
    pub direct_secs: u64,
    /// GitHub へのコメント投稿
    pub relay_send_secs: u64,
    /// GitHub のポーリング
    pub relay_check_secs: u64,
}

impl Default for CooldownSettings {
    fn default() -> Self {
        Self {
            direct_secs: 15,
            relay_send_secs: 8,
            relay_check_secs: 6,
        }
    }
}

impl CooldownSettings {
    pub fn direct(&self) -> Duration {
        Duration::from_secs(self.direct_secs)
    }

    pub fn relay_send(&self) -> Duration {
        Duration::from_secs(self.relay_send_secs)
    }

    pub fn relay_check(&self) -> Duration {
        Duration::from_secs(self.relay_check_secs)
    }
}

impl TonyConfig {
    /// 設定ファイルを読み込み、環境変数で上書きする。
    ///
    /// `~/.config/tony/config.toml` が存在すればパースし、
    /// 存在しなければテンプレートを生成してデフォルト値を使う。
    /// パースエラーの場合は警告を表示してデフォルト値を使う。
    pub fn load() -> Self {
        let mut config = Self::load_file(&Self::config_path());
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    fn load_file(path: &Path) -> Self {
        debug!(path = %path.display(), "Loading config file");

        if !path.exists() {
            Self::create_default_config(path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str::<TonyConfig>(&content) {
                Ok(config) => {
                    info!(
                        path = %path.display(),
                        primary_model = %config.openai.primary_model,
                        fallback_count = config.openai.fallback_models.len(),
                        bot_login_count = config.github.bot_logins.len(),
                        "Config loaded successfully"
                    );
                    config
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to parse config file");
                    eprintln!("tony: warning: failed to parse config file: {e}");
                    Self::default()
                }
            },
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read config file");
                eprintln!("tony: warning: failed to read config file: {e}");
                Self::default()
            }
        }
    }

    /// 環境変数による上書きを適用する。
    ///
    /// `lookup` は変数名から値を返す関数。空文字列の値は未設定として扱う。
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(key) = get("OPENAI_API_KEY") {
            self.openai.api_key = Some(key);
        }
        if let Some(org) = get("OPENAI_ORG").or_else(|| get("OPENAI_ORGANIZATION")) {
            self.openai.organization = Some(org);
        }
        if let Some(model) = get("OPENAI_MODEL_PRIMARY") {
            self.openai.primary_model = model;
        }
        let fallback_env = [get("OPENAI_MODEL_FALLBACK1"), get("OPENAI_MODEL_FALLBACK2")];
        if fallback_env.iter().any(Option::is_some) {
            // 個別指定された番号だけ差し替える
            for (i, value) in fallback_env.into_iter().enumerate() {
                if let Some(model) = value {
                    if i < self.openai.fallback_models.len() {
                        self.openai.fallback_models[i] = model;
                    } else {
                        self.openai.fallback_models.push(model);
                    }
                }
            }
        }

        if let Some(token) = get("GITHUB_PAT").or_else(|| get("GITHUB_TOKEN")) {
            self.github.token = Some(token);
        }
        if let Some(repo_ref) = get("REPO").and_then(|r| RepoRef::parse(&r)) {
            self.github.owner = Some(repo_ref.owner);
            self.github.repo = Some(repo_ref.name);
        }
        if let Some(owner) = get("GITHUB_OWNER") {
            self.github.owner = Some(owner);
        }
        if let Some(repo) = get("GITHUB_REPO") {
            self.github.repo = Some(repo);
        }
        if let Some(number) = get("GITHUB_ISSUE_NUMBER") {
            match number.parse::<u64>() {
                Ok(n) => self.github.issue_number = Some(n),
                Err(e) => {
                    warn!(value = %number, error = %e, "Ignoring invalid GITHUB_ISSUE_NUMBER");
                }
            }
        }
        if let Some(logins) = get("TONY_BOT_LOGINS") {
            let logins: Vec<String> = logins
                .split(',')
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(str::to_string)
                .collect();
            if !logins.is_empty() {
                self.github.bot_logins = logins;
            }
        }
    }

    /// 設定ファイルのパスを返す。
    ///
    /// `$HOME` が取得できない場合は `./.config/tony/config.toml` にフォールバックする。
    pub fn config_path() -> PathBuf {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(".config/tony/config.toml")
    }

    /// 設定ファイルが存在しない場合にテンプレートから生成する。
    ///
    /// 生成に失敗した場合は警告を表示するが、起動は継続する。
    fn create_default_config(path: &Path) {
        const TEMPLATE: &str = r#"# Tony configuration
#
# Secrets can also come from the environment (OPENAI_API_KEY, GITHUB_PAT, ...).

[openai]
# api_key = "sk-..."
# primary_model = "gpt-4o-mini"
# fallback_models = ["gpt-4o-mini-2024-07-18", "gpt-3.5-turbo"]
# temperature = 0.7
# max_tokens = 300

[github]
# owner = "octocat"
# repo = "hello-world"
# issue_number = 1
# bot_logins = ["github-actions[bot]"]

[cooldown]
# direct_secs = 15
# relay_send_secs = 8
# relay_check_secs = 6
"#;

        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %parent.display(), error = %e, "Failed to create config directory");
                eprintln!("tony: warning: failed to create config directory: {e}");
                return;
            }
        }

        match std::fs::write(path, TEMPLATE) {
            Ok(()) => {
                info!(path = %path.display(), "Created default config file");
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to create default config file");
                eprintln!("tony: warning: failed to create config file: {e}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load_from_str(content: &str) -> TonyConfig {
        toml::from_str(content).unwrap()
    }

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = TonyConfig::default();
        assert_eq!(config.openai.primary_model, "gpt-4o-mini");
        assert_eq!(
            config.openai.candidate_models(),
            vec!["gpt-4o-mini", "gpt-4o-mini-2024-07-18", "gpt-3.5-turbo"]
        );
        assert_eq!(config.github.bot_logins, vec!["github-actions[bot]"]);
        assert_eq!(config.cooldown.direct(), Duration::from_secs(15));
        assert_eq!(config.cooldown.relay_send(), Duration::from_secs(8));
        assert_eq!(config.cooldown.relay_check(), Duration::from_secs(6));
    }

    #[test]
    fn parse_partial_config_uses_defaults() {
        let config = load_from_str(
            r#"
[github]
owner = "octocat"
bot_logins = ["tony-bot[bot]", "github-actions[bot]"]
"#,
        );
        assert_eq!(config.github.owner.as_deref(), Some("octocat"));
        assert_eq!(config.github.bot_logins.len(), 2);
        assert_eq!(config.github.per_page, 30);
        assert_eq!(config.openai.primary_model, "gpt-4o-mini");
        assert_eq!(config.cooldown.direct_secs, 15);
    }

    #[test]
    fn parse_empty_config() {
        let config = load_from_str("");
        assert_eq!(config.openai.max_tokens, Some(300));
        assert!(!config.github.relay_ready());
    }

    #[test]
    fn candidate_models_drop_blanks_and_duplicates() {
        let settings = OpenAiSettings {
            primary_model: "gpt-4o-mini".to_string(),
            fallback_models: vec![
                " ".to_string(),
                "gpt-4o-mini".to_string(),
                "gpt-3.5-turbo".to_string(),
            ],
            ..Default::default()
        };
        assert_eq!(settings.candidate_models(), vec!["gpt-4o-mini", "gpt-3.5-turbo"]);
    }

    #[test]
    fn placeholder_api_key_counts_as_missing() {
        let mut settings = OpenAiSettings::default();
        assert!(settings.effective_api_key().is_none());
        settings.api_key = Some("your_openai_api_key".to_string());
        assert!(settings.effective_api_key().is_none());
        settings.api_key = Some("  sk-live  ".to_string());
        assert_eq!(settings.effective_api_key(), Some("sk-live"));
    }

    #[test]
    fn organization_is_skipped_for_project_keys() {
        let mut settings = OpenAiSettings {
            api_key: Some("sk-proj-abc".to_string()),
            organization: Some("org-123".to_string()),
            ..Default::default()
        };
        assert!(settings.effective_organization().is_none());

        settings.api_key = Some("sk-abc".to_string());
        assert_eq!(settings.effective_organization(), Some("org-123"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = load_from_str(
            r#"
[openai]
api_key = "sk-from-file"

[github]
owner = "file-owner"
"#,
        );
        config.apply_env(env_of(&[
            ("OPENAI_API_KEY", "sk-from-env"),
            ("OPENAI_ORGANIZATION", "org-9"),
            ("OPENAI_MODEL_PRIMARY", "gpt-4o"),
            ("OPENAI_MODEL_FALLBACK2", "gpt-4.1-mini"),
            ("GITHUB_TOKEN", "ghp_env"),
            ("GITHUB_OWNER", "env-owner"),
            ("GITHUB_REPO", "env-repo"),
            ("GITHUB_ISSUE_NUMBER", "42"),
            ("TONY_BOT_LOGINS", "tony[bot], github-actions[bot] ,"),
        ]));

        assert_eq!(config.openai.effective_api_key(), Some("sk-from-env"));
        assert_eq!(config.openai.organization.as_deref(), Some("org-9"));
        assert_eq!(
            config.openai.candidate_models(),
            vec!["gpt-4o", "gpt-4o-mini-2024-07-18", "gpt-4.1-mini"]
        );
        assert_eq!(config.github.effective_token(), Some("ghp_env"));
        assert_eq!(
            config.github.repo_ref(),
            Some(RepoRef {
                owner: "env-owner".to_string(),
                name: "env-repo".to_string()
            })
        );
        assert_eq!(config.github.issue_number, Some(42));
        assert_eq!(config.github.bot_logins, vec!["tony[bot]", "github-actions[bot]"]);
        assert!(config.github.relay_ready());
    }

    #[test]
    fn github_pat_wins_over_github_token() {
        let mut config = TonyConfig::default();
        config.apply_env(env_of(&[("GITHUB_PAT", "pat"), ("GITHUB_TOKEN", "token")]));
        assert_eq!(config.github.effective_token(), Some("pat"));
    }

    #[test]
    fn repo_env_splits_owner_and_name() {
        let mut config = TonyConfig::default();
        config.apply_env(env_of(&[("REPO", "octocat/hello-world")]));
        let repo = config.github.repo_ref().unwrap();
        assert_eq!(repo.owner, "octocat");
        assert_eq!(repo.name, "hello-world");
    }

    #[test]
    fn invalid_issue_number_is_ignored() {
        let mut config = TonyConfig::default();
        config.apply_env(env_of(&[("GITHUB_ISSUE_NUMBER", "abc")]));
        assert!(config.github.issue_number.is_none());
    }

    #[test]
    fn config_path_contains_expected_components() {
        let path = TonyConfig::config_path();
        assert!(path.to_string_lossy().contains(".config/tony/config.toml"));
    }

    #[test]
    fn create_default_config_creates_parseable_template() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("sub/dir/config.toml");

        assert!(!path.exists());
        TonyConfig::create_default_config(&path);
        assert!(path.exists());

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("[openai]"));
        assert!(content.contains("[github]"));
        assert!(content.contains("[cooldown]"));

        let config: TonyConfig = toml::from_str(&content).unwrap();
        assert_eq!(config.openai.primary_model, "gpt-4o-mini");
    }

    #[test]
    fn load_file_falls_back_to_default_on_parse_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        std::fs::write(&path, "[openai\nbroken").unwrap();

        let config = TonyConfig::load_file(&path);
        assert_eq!(config.openai.primary_model, "gpt-4o-mini");
    }
}
