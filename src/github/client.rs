//! GitHub REST API クライアント
//!
//! Issue コメントの投稿と一覧取得を行う。リトライは行わず、
//! 2xx 以外のステータスはステータスコードとレスポンス本文をそのまま持つエラーとして返す。

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, LINK, USER_AGENT};
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::{debug, info, warn};

use super::types::IssueComment;
use super::RepoRef;

/// REST 呼び出しのタイムアウト
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// コメント一覧で辿るページ数の上限
const MAX_COMMENT_PAGES: u32 = 50;

/// GitHub API が 2xx 以外を返したときのエラー
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("GitHub API error {status}: {body}")]
pub struct GithubApiError {
    pub status: u16,
    pub body: String,
}

#[derive(Clone)]
pub struct GithubClient {
    http: reqwest::Client,
    api_base: String,
    repo: RepoRef,
}

impl GithubClient {
    pub fn new(api_base: &str, token: &str, repo: RepoRef) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("tony-ai-relay"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "x-github-api-version",
            HeaderValue::from_static("2022-11-28"),
        );
        let auth_header = format!("Bearer {}", token.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth_header).context("invalid github authorization header")?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to create github api client")?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            repo,
        })
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    fn comments_url(&self, issue_number: u64) -> String {
        format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.api_base, self.repo.owner, self.repo.name, issue_number
        )
    }

    /// Issue にコメントを投稿し、作成されたコメントを返す。
    pub async fn post_comment(&self, issue_number: u64, body: &str) -> Result<IssueComment> {
        let payload = json!({ "body": body });
        let request = self.http.post(self.comments_url(issue_number)).json(&payload);
        let comment: IssueComment = self.send_json("create issue comment", request).await?;
        info!(
            repo = %self.repo,
            issue_number,
            comment_id = comment.id,
            "Issue comment posted"
        );
        Ok(comment)
    }

    /// Issue のコメントを古い順にすべて取得する。
    ///
    /// `per_page` 件ずつページを辿り、`Link: rel="next"` がなく件数が `per_page` 未満のページで止まる。
    pub async fn list_comments(&self, issue_number: u64, per_page: u32) -> Result<Vec<IssueComment>> {
        let per_page = per_page.clamp(1, 100);
        let per_page_value = per_page.to_string();
        let mut rows = Vec::new();
        let mut page = 1_u32;
        loop {
            let page_value = page.to_string();
            let request = self.http.get(self.comments_url(issue_number)).query(&[
                ("per_page", per_page_value.as_str()),
                ("page", page_value.as_str()),
            ]);
            let (headers, chunk): (HeaderMap, Vec<IssueComment>) =
                self.send_json_with_headers("list issue comments", request).await?;
            let chunk_len = chunk.len();
            rows.extend(chunk);

            let more = has_next_page(&headers) || chunk_len == per_page as usize;
            if !more || chunk_len == 0 {
                break;
            }
            if page >= MAX_COMMENT_PAGES {
                warn!(issue_number, pages = page, "Stopped listing comments at page limit");
                break;
            }
            page = page.saturating_add(1);
        }
        debug!(
            repo = %self.repo,
            issue_number,
            pages = page,
            count = rows.len(),
            "Issue comments listed"
        );
        Ok(rows)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T> {
        let (_, value) = self.send_json_with_headers(operation, request).await?;
        Ok(value)
    }

    async fn send_json_with_headers<T: DeserializeOwned>(
        &self,
        operation: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<(HeaderMap, T)> {
        let started = Instant::now();
        let response = request
            .send()
            .await
            .with_context(|| format!("github api {operation} request failed"))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .text()
            .await
            .with_context(|| format!("failed to read github api {operation} response"))?;

        debug!(
            operation,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "GitHub API response received"
        );

        if !status.is_success() {
            warn!(operation, status = status.as_u16(), body = %body, "GitHub API returned an error");
            return Err(GithubApiError {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let value = serde_json::from_str(&body)
            .with_context(|| format!("failed to decode github api {operation} response"))?;
        Ok((headers, value))
    }
}

/// `Link` ヘッダーに `rel="next"` が含まれるか
fn has_next_page(headers: &HeaderMap) -> bool {
    headers
        .get_all(LINK)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .any(|link| {
            link.split(';')
                .skip(1)
                .any(|param| param.trim().replace(' ', "") == "rel=\"next\"")
        })
}

#[cfg(test)]
mod tests {
    use httpmock::prelude::*;
    use serde_json::json;

    use super::*;

    fn client_for(server: &MockServer) -> GithubClient {
        GithubClient::new(
            &server.base_url(),
            "ghp_test",
            RepoRef {
                owner: "octocat".to_string(),
                name: "hello-world".to_string(),
            },
        )
        .unwrap()
    }

    #[tokio::test]
    async fn post_comment_sends_expected_request() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/repos/octocat/hello-world/issues/7/comments")
                .header("authorization", "Bearer ghp_test")
                .header("accept", "application/vnd.github+json")
                .json_body(json!({ "body": "/ai hello" }));
            then.status(201).json_body(json!({
                "id": 101,
                "body": "/ai hello",
                "html_url": "https://github.com/octocat/hello-world/issues/7#issuecomment-101",
                "user": { "login": "octocat" }
            }));
        });

        let posted = client_for(&server).post_comment(7, "/ai hello").await.unwrap();

        mock.assert();
        assert_eq!(posted.id, 101);
        assert_eq!(
            posted.html_url.as_deref(),
            Some("https://github.com/octocat/hello-world/issues/7#issuecomment-101")
        );
    }

    fn numbered_comments(ids: std::ops::RangeInclusive<u64>, login: &str) -> serde_json::Value {
        serde_json::Value::Array(
            ids.map(|id| json!({ "id": id, "body": format!("comment {id}"), "user": { "login": login } }))
                .collect(),
        )
    }

    #[tokio::test]
    async fn list_comments_follows_next_page() {
        let server = MockServer::start();
        let next = format!(
            "<{}>; rel=\"next\", <{}>; rel=\"last\"",
            server.url("/repos/octocat/hello-world/issues/7/comments?per_page=30&page=2"),
            server.url("/repos/octocat/hello-world/issues/7/comments?per_page=30&page=2"),
        );
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octocat/hello-world/issues/7/comments")
                .query_param("per_page", "30")
                .query_param("page", "1");
            then.status(200)
                .header("link", next.as_str())
                .json_body(numbered_comments(1..=30, "octocat"));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octocat/hello-world/issues/7/comments")
                .query_param("per_page", "30")
                .query_param("page", "2");
            then.status(200)
                .json_body(numbered_comments(31..=32, "github-actions[bot]"));
        });

        let comments = client_for(&server).list_comments(7, 30).await.unwrap();

        first.assert_calls(1);
        second.assert_calls(1);
        assert_eq!(comments.len(), 32);
        assert_eq!(comments.last().map(|c| c.id), Some(32));
    }

    #[tokio::test]
    async fn list_comments_stops_on_short_page_without_link() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/repos/octocat/hello-world/issues/7/comments");
            then.status(200).json_body(numbered_comments(1..=3, "octocat"));
        });

        let comments = client_for(&server).list_comments(7, 30).await.unwrap();

        mock.assert_calls(1);
        assert_eq!(comments.len(), 3);
    }

    #[test]
    fn next_page_is_read_from_link_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            LINK,
            HeaderValue::from_static(
                "<https://api.github.com/x?page=1>; rel=\"prev\", <https://api.github.com/x?page=3>; rel=\"next\"",
            ),
        );
        assert!(has_next_page(&headers));

        headers.insert(
            LINK,
            HeaderValue::from_static("<https://api.github.com/x?page=1>; rel=\"first\""),
        );
        assert!(!has_next_page(&headers));
        assert!(!has_next_page(&HeaderMap::new()));
    }

    #[tokio::test]
    async fn list_comments_passes_page_size() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/repos/octocat/hello-world/issues/7/comments")
                .query_param("per_page", "30")
                .query_param("page", "1");
            then.status(200).json_body(json!([
                { "id": 1, "body": "/ai hi", "user": { "login": "octocat" } },
                { "id": 2, "body": "hello", "user": { "login": "github-actions[bot]" } }
            ]));
        });

        let comments = client_for(&server).list_comments(7, 30).await.unwrap();

        mock.assert();
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[1].author(), "github-actions[bot]");
    }

    #[tokio::test]
    async fn not_found_carries_status_and_body_verbatim() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/repos/octocat/hello-world/issues/9/comments");
            then.status(404)
                .body(r#"{"message":"Not Found","documentation_url":"https://docs.github.com"}"#);
        });

        let err = client_for(&server).list_comments(9, 30).await.unwrap_err();
        let api_err = err.downcast_ref::<GithubApiError>().unwrap();
        assert_eq!(api_err.status, 404);
        assert_eq!(
            api_err.body,
            r#"{"message":"Not Found","documentation_url":"https://docs.github.com"}"#
        );
        assert!(err.to_string().starts_with("GitHub API error 404: {\"message\":\"Not Found\""));
    }

    #[tokio::test]
    async fn post_failure_is_not_retried() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST).path("/repos/octocat/hello-world/issues/7/comments");
            then.status(403).body("Resource not accessible by integration");
        });

        let err = client_for(&server).post_comment(7, "hi").await.unwrap_err();

        mock.assert_calls(1);
        assert_eq!(
            err.to_string(),
            "GitHub API error 403: Resource not accessible by integration"
        );
    }

    #[test]
    fn api_base_trailing_slash_is_trimmed() {
        let client = GithubClient::new(
            "https://api.github.com/",
            "t",
            RepoRef {
                owner: "o".to_string(),
                name: "r".to_string(),
            },
        )
        .unwrap();
        assert_eq!(
            client.comments_url(3),
            "https://api.github.com/repos/o/r/issues/3/comments"
        );
    }
}
