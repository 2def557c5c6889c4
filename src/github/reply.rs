//! ボット返信の検出

use super::types::IssueComment;

/// `since` より後（id が厳密に大きい）のコメントのうち、
/// `bot_logins` に含まれるアカウントが書いた最後のものを返す。
pub fn find_latest_bot_reply<'a, S: AsRef<str>>(
    comments: &'a [IssueComment],
    since: Option<u64>,
    bot_logins: &[S],
) -> Option<&'a IssueComment> {
    comments.iter().rev().find(|c| {
        since.map_or(true, |since| c.id > since)
            && bot_logins.iter().any(|login| login.as_ref() == c.author())
    })
}
