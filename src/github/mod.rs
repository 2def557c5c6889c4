//! GitHub Issue コメントのリレー
//!
//! REST API でコメントを投稿・一覧取得し、ボットの返信を検出する。

pub mod client;
pub mod reply;
pub mod types;

pub use client::GithubClient;
pub use reply::find_latest_bot_reply;
pub use types::IssueCommentEvent;

/// `owner/repo` 形式のリポジトリ座標
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    /// `owner/repo` をパースする。どちらかが空なら `None`。
    pub fn parse(full_name: &str) -> Option<Self> {
        let (owner, name) = full_name.trim().split_once('/')?;
        let (owner, name) = (owner.trim(), name.trim());
        if owner.is_empty() || name.is_empty() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
