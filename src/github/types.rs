//! GitHub REST API / Webhook のデータ型

use serde::Deserialize;

/// コメント投稿者
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct CommentUser {
    #[serde(default)]
    pub login: String,
}

/// Issue コメント。投稿 API の戻り値と一覧 API の要素を兼ねる。
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct IssueComment {
    pub id: u64,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
    #[serde(default)]
    pub user: Option<CommentUser>,
}

impl IssueComment {
    /// 投稿者のログイン名（不明なら空文字列）
    pub fn author(&self) -> &str {
        self.user.as_ref().map(|u| u.login.as_str()).unwrap_or("")
    }
}

/// `issue_comment` Webhook ペイロードのうち、ボットが必要とする部分。
///
/// 不正なペイロードを検出できるよう、すべてのフィールドを省略可能にしている。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueCommentEvent {
    #[serde(default)]
    pub issue: Option<EventIssue>,
    #[serde(default)]
    pub comment: Option<EventComment>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventIssue {
    #[serde(default)]
    pub number: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventComment {
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub user: Option<CommentUser>,
}

/// ペイロードから取り出したトリガー情報
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentTrigger {
    pub issue_number: u64,
    pub body: String,
    pub author: String,
}

impl IssueCommentEvent {
    /// 必須フィールドを取り出す。欠けていれば不足しているフィールド名を返す。
    pub fn trigger(&self) -> Result<CommentTrigger, &'static str> {
        let issue_number = self
            .issue
            .as_ref()
            .and_then(|i| i.number)
            .ok_or("issue.number")?;
        let comment = self.comment.as_ref().ok_or("comment")?;
        let author = comment
            .user
            .as_ref()
            .map(|u| u.login.clone())
            .filter(|l| !l.is_empty())
            .ok_or("comment.user.login")?;
        // body は null になりうるため空文字列として扱う
        let body = comment.body.clone().unwrap_or_default();
        Ok(CommentTrigger {
            issue_number,
            body,
            author,
        })
    }
}
