use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use herald_types::{Comment, HeraldError, IssueRef, Label, Result};

use crate::ScmClient;

const PAGE_SIZE: usize = 100;
const API_VERSION: &str = "2022-11-28";

// ---------------------------------------------------------------------------
// GitHubClient
// ---------------------------------------------------------------------------

/// `ScmClient` over the GitHub REST v3 API.
///
/// Pull requests are issues as far as labels and conversation comments are
/// concerned, so `is_pull_request` does not change the endpoints used.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    client: reqwest::Client,
    token: String,
    base_url: String,
}

impl GitHubClient {
    pub fn new(token: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            token,
            base_url: "https://api.github.com".to_string(),
        }
    }

    /// Point the client at a GitHub Enterprise or test server.
    pub fn with_base_url(mut self, url: String) -> Self {
        self.base_url = url;
        self
    }

    pub fn from_env() -> Result<Self> {
        let token = std::env::var("GITHUB_TOKEN").map_err(|_| HeraldError::AuthError {
            operation: "read GITHUB_TOKEN".into(),
        })?;
        Ok(Self::new(token))
    }

    fn url(&self, operation: &str, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| HeraldError::ProviderError {
            operation: operation.into(),
            status: 0,
            message: format!("invalid base URL '{}': {e}", self.base_url),
            retryable: false,
        })?;
        url.path_segments_mut()
            .map_err(|_| HeraldError::ProviderError {
                operation: operation.into(),
                status: 0,
                message: format!("base URL '{}' cannot carry a path", self.base_url),
                retryable: false,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn issue_url(&self, operation: &str, issue: &IssueRef, tail: &[&str]) -> Result<Url> {
        let number = issue.number.to_string();
        let mut segments = vec![
            "repos",
            issue.org.as_str(),
            issue.repo.as_str(),
            "issues",
            number.as_str(),
        ];
        segments.extend_from_slice(tail);
        self.url(operation, &segments)
    }

    async fn send(
        &self,
        operation: &str,
        method: Method,
        url: Url,
        body: Option<serde_json::Value>,
    ) -> Result<String> {
        tracing::debug!(operation, %method, %url, "GitHub request");
        let mut request = self
            .client
            .request(method, url)
            .bearer_auth(&self.token)
            .header("accept", "application/vnd.github+json")
            .header("user-agent", "herald")
            .header("x-github-api-version", API_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let resp = request.send().await.map_err(|e| HeraldError::ProviderError {
            operation: operation.into(),
            status: 0,
            message: e.to_string(),
            retryable: true,
        })?;

        let status = resp.status();
        let retry_after_secs = resp
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok());
        let quota_exhausted = resp
            .headers()
            .get("x-ratelimit-remaining")
            .map(|v| v.as_bytes() == b"0")
            .unwrap_or(false);

        let response_body = resp.text().await.map_err(|e| HeraldError::ProviderError {
            operation: operation.into(),
            status: status.as_u16(),
            message: e.to_string(),
            retryable: true,
        })?;

        if !status.is_success() {
            return Err(map_error(
                operation,
                status,
                &response_body,
                retry_after_secs,
                quota_exhausted,
            ));
        }
        Ok(response_body)
    }

    async fn get_paginated<T: DeserializeOwned>(
        &self,
        operation: &str,
        base: Url,
    ) -> Result<Vec<T>> {
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let mut url = base.clone();
            url.query_pairs_mut()
                .append_pair("per_page", &PAGE_SIZE.to_string())
                .append_pair("page", &page.to_string());
            let body = self.send(operation, Method::GET, url, None).await?;
            let batch: Vec<T> = parse_json(operation, &body)?;
            let done = batch.len() < PAGE_SIZE;
            items.extend(batch);
            if done {
                return Ok(items);
            }
            page += 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct GhLabel {
    name: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

impl From<GhLabel> for Label {
    fn from(l: GhLabel) -> Self {
        Label {
            name: l.name,
            color: l.color,
            description: l.description,
        }
    }
}

#[derive(Debug, Deserialize)]
struct GhUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GhComment {
    id: u64,
    // Deleted ("ghost") accounts come back as null.
    user: Option<GhUser>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl From<GhComment> for Comment {
    fn from(c: GhComment) -> Self {
        Comment {
            id: c.id,
            author: c.user.map(|u| u.login).unwrap_or_default(),
            body: c.body.unwrap_or_default(),
            created_at: c.created_at,
        }
    }
}

fn parse_json<T: DeserializeOwned>(operation: &str, body: &str) -> Result<T> {
    serde_json::from_str(body).map_err(|e| HeraldError::ProviderError {
        operation: operation.into(),
        status: 200,
        message: format!("Failed to parse response JSON: {e}"),
        retryable: false,
    })
}

fn map_error(
    operation: &str,
    status: StatusCode,
    body: &str,
    retry_after_secs: Option<u64>,
    quota_exhausted: bool,
) -> HeraldError {
    let status_u16 = status.as_u16();
    match status_u16 {
        429 => HeraldError::RateLimited {
            operation: operation.into(),
            retry_after_ms: retry_after_secs.unwrap_or(60).saturating_mul(1000),
        },
        403 if quota_exhausted || retry_after_secs.is_some() => HeraldError::RateLimited {
            operation: operation.into(),
            retry_after_ms: retry_after_secs.unwrap_or(60).saturating_mul(1000),
        },
        401 => HeraldError::AuthError {
            operation: operation.into(),
        },
        500..=599 => HeraldError::ProviderError {
            operation: operation.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: true,
        },
        _ => HeraldError::ProviderError {
            operation: operation.into(),
            status: status_u16,
            message: extract_error_message(body),
            retryable: false,
        },
    }
}

fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.to_string())
}

#[async_trait]
impl ScmClient for GitHubClient {
    async fn get_labels(&self, issue: &IssueRef) -> Result<Vec<Label>> {
        let url = self.issue_url("get_labels", issue, &["labels"])?;
        let labels: Vec<GhLabel> = self.get_paginated("get_labels", url).await?;
        Ok(labels.into_iter().map(Label::from).collect())
    }

    async fn add_label(&self, issue: &IssueRef, label: &str) -> Result<()> {
        let url = self.issue_url("add_label", issue, &["labels"])?;
        self.send(
            "add_label",
            Method::POST,
            url,
            Some(json!({ "labels": [label] })),
        )
        .await?;
        Ok(())
    }

    async fn remove_label(&self, issue: &IssueRef, label: &str) -> Result<()> {
        let url = self.issue_url("remove_label", issue, &["labels", label])?;
        self.send("remove_label", Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn create_comment(&self, issue: &IssueRef, body: &str) -> Result<()> {
        let url = self.issue_url("create_comment", issue, &["comments"])?;
        self.send(
            "create_comment",
            Method::POST,
            url,
            Some(json!({ "body": body })),
        )
        .await?;
        Ok(())
    }

    async fn list_comments(&self, issue: &IssueRef) -> Result<Vec<Comment>> {
        let url = self.issue_url("list_comments", issue, &["comments"])?;
        let comments: Vec<GhComment> = self.get_paginated("list_comments", url).await?;
        Ok(comments.into_iter().map(Comment::from).collect())
    }

    async fn delete_comment(&self, issue: &IssueRef, comment_id: u64) -> Result<()> {
        let id = comment_id.to_string();
        let url = self.url(
            "delete_comment",
            &[
                "repos",
                issue.org.as_str(),
                issue.repo.as_str(),
                "issues",
                "comments",
                id.as_str(),
            ],
        )?;
        self.send("delete_comment", Method::DELETE, url, None).await?;
        Ok(())
    }

    async fn bot_name(&self) -> Result<String> {
        let url = self.url("bot_name", &["user"])?;
        let body = self.send("bot_name", Method::GET, url, None).await?;
        let user: GhUser = parse_json("bot_name", &body)?;
        Ok(user.login)
    }

    fn name(&self) -> &str {
        "github"
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GitHubClient {
        GitHubClient::new("token".into())
    }

    #[test]
    fn issue_url_builds_labels_endpoint() {
        let issue = IssueRef::new("acme", "widget", 42, true);
        let url = client().issue_url("get_labels", &issue, &["labels"]).unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/widget/issues/42/labels"
        );
    }

    #[test]
    fn label_names_are_percent_encoded() {
        let issue = IssueRef::new("acme", "widget", 7, false);
        let url = client()
            .issue_url("remove_label", &issue, &["labels", "do-not-merge/hold"])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.github.com/repos/acme/widget/issues/7/labels/do-not-merge%2Fhold"
        );
    }

    #[test]
    fn enterprise_base_url_keeps_prefix() {
        let c = client().with_base_url("https://ghe.example.com/api/v3/".into());
        let url = c.url("bot_name", &["user"]).unwrap();
        assert_eq!(url.as_str(), "https://ghe.example.com/api/v3/user");
    }

    #[test]
    fn invalid_base_url_is_reported() {
        let c = client().with_base_url("not a url".into());
        let err = c.url("bot_name", &["user"]).unwrap_err();
        assert!(matches!(err, HeraldError::ProviderError { status: 0, retryable: false, .. }));
    }

    #[test]
    fn map_error_rate_limit_variants() {
        let err = map_error("add_label", StatusCode::TOO_MANY_REQUESTS, "", Some(5), false);
        assert!(matches!(err, HeraldError::RateLimited { retry_after_ms: 5000, .. }));

        let err = map_error("add_label", StatusCode::FORBIDDEN, "{}", None, true);
        assert!(matches!(err, HeraldError::RateLimited { retry_after_ms: 60000, .. }));
    }

    #[test]
    fn huge_retry_after_saturates() {
        let err = map_error(
            "add_label",
            StatusCode::TOO_MANY_REQUESTS,
            "",
            Some(u64::MAX / 10),
            false,
        );
        assert!(matches!(err, HeraldError::RateLimited { retry_after_ms: u64::MAX, .. }));
    }

    #[test]
    fn map_error_forbidden_without_quota_signal_is_permanent() {
        let err = map_error(
            "add_label",
            StatusCode::FORBIDDEN,
            r#"{"message":"Resource not accessible by integration"}"#,
            None,
            false,
        );
        match err {
            HeraldError::ProviderError {
                status,
                message,
                retryable,
                ..
            } => {
                assert_eq!(status, 403);
                assert_eq!(message, "Resource not accessible by integration");
                assert!(!retryable);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn map_error_auth_and_server_errors() {
        assert!(matches!(
            map_error("bot_name", StatusCode::UNAUTHORIZED, "", None, false),
            HeraldError::AuthError { .. }
        ));
        let err = map_error("get_labels", StatusCode::BAD_GATEWAY, "upstream", None, false);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("upstream"));
    }

    #[test]
    fn comment_wire_format_converts() {
        let body = r#"[
            {"id": 11, "user": {"login": "herald-bot"}, "body": "hello", "created_at": "2024-01-02T03:04:05Z"},
            {"id": 12, "user": null, "body": null}
        ]"#;
        let parsed: Vec<GhComment> = parse_json("list_comments", body).unwrap();
        let comments: Vec<Comment> = parsed.into_iter().map(Comment::from).collect();
        assert_eq!(comments[0].author, "herald-bot");
        assert_eq!(comments[0].body, "hello");
        assert!(comments[0].created_at.is_some());
        assert_eq!(comments[1].author, "");
        assert_eq!(comments[1].body, "");
    }

    #[test]
    fn label_wire_format_converts() {
        let body = r#"[{"id": 1, "name": "help", "color": "006b75", "description": null}]"#;
        let parsed: Vec<GhLabel> = parse_json("get_labels", body).unwrap();
        let labels: Vec<Label> = parsed.into_iter().map(Label::from).collect();
        assert_eq!(labels[0].name, "help");
        assert_eq!(labels[0].color.as_deref(), Some("006b75"));
    }

    #[test]
    fn malformed_json_is_a_provider_error() {
        let err = parse_json::<Vec<GhLabel>>("get_labels", "<html>").unwrap_err();
        assert!(matches!(err, HeraldError::ProviderError { retryable: false, .. }));
    }

    // --- HTTP round trips against a mock server ---

    mod http {
        use super::*;
        use httpmock::prelude::*;

        fn issue() -> IssueRef {
            IssueRef::new("acme", "widget", 7, false)
        }

        fn client_for(server: &MockServer) -> GitHubClient {
            GitHubClient::new("token".into()).with_base_url(server.base_url())
        }

        #[tokio::test]
        async fn get_labels_follows_pages() {
            let server = MockServer::start();
            let first: Vec<serde_json::Value> = (0..PAGE_SIZE)
                .map(|i| json!({"name": format!("label-{i}")}))
                .collect();
            let page_one = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/acme/widget/issues/7/labels")
                    .query_param("per_page", "100")
                    .query_param("page", "1")
                    .header("authorization", "Bearer token")
                    .header("x-github-api-version", API_VERSION);
                then.status(200).json_body(json!(first));
            });
            let page_two = server.mock(|when, then| {
                when.method(GET)
                    .path("/repos/acme/widget/issues/7/labels")
                    .query_param("page", "2");
                then.status(200).json_body(json!([{"name": "help", "color": "006b75"}]));
            });

            let labels = client_for(&server).get_labels(&issue()).await.unwrap();

            assert_eq!(labels.len(), PAGE_SIZE + 1);
            assert_eq!(labels[0].name, "label-0");
            assert_eq!(labels[PAGE_SIZE].name, "help");
            page_one.assert_calls(1);
            page_two.assert_calls(1);
        }

        #[tokio::test]
        async fn exhausted_quota_maps_to_rate_limited() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/repos/acme/widget/issues/7/labels");
                then.status(403)
                    .header("x-ratelimit-remaining", "0")
                    .json_body(json!({"message": "API rate limit exceeded"}));
            });

            let err = client_for(&server)
                .add_label(&issue(), "hold")
                .await
                .unwrap_err();

            assert!(matches!(err, HeraldError::RateLimited { retry_after_ms: 60000, .. }));
        }

        #[tokio::test]
        async fn retry_after_header_is_honoured() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(POST).path("/repos/acme/widget/issues/7/comments");
                then.status(429).header("retry-after", "7").body("slow down");
            });

            let err = client_for(&server)
                .create_comment(&issue(), "hello")
                .await
                .unwrap_err();

            assert!(matches!(err, HeraldError::RateLimited { retry_after_ms: 7000, .. }));
        }

        #[tokio::test]
        async fn remove_label_keeps_slash_inside_one_segment() {
            let server = MockServer::start();
            let delete = server.mock(|when, then| {
                when.method(DELETE)
                    .path_prefix("/repos/acme/widget/issues/7/labels/do-not-merge")
                    .path_suffix("hold");
                then.status(200).json_body(json!([]));
            });

            client_for(&server)
                .remove_label(&issue(), "do-not-merge/hold")
                .await
                .unwrap();

            delete.assert_calls(1);
        }

        #[tokio::test]
        async fn missing_label_is_a_permanent_provider_error() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(DELETE).path("/repos/acme/widget/issues/7/labels/hold");
                then.status(404).json_body(json!({"message": "Label does not exist"}));
            });

            let err = client_for(&server)
                .remove_label(&issue(), "hold")
                .await
                .unwrap_err();

            match err {
                HeraldError::ProviderError {
                    status,
                    message,
                    retryable,
                    ..
                } => {
                    assert_eq!(status, 404);
                    assert_eq!(message, "Label does not exist");
                    assert!(!retryable);
                }
                other => panic!("unexpected error: {other:?}"),
            }
        }

        #[tokio::test]
        async fn bot_name_reads_authenticated_user() {
            let server = MockServer::start();
            let user = server.mock(|when, then| {
                when.method(GET).path("/user").header("authorization", "Bearer token");
                then.status(200).json_body(json!({"login": "herald-bot", "id": 1}));
            });

            let login = client_for(&server).bot_name().await.unwrap();

            assert_eq!(login, "herald-bot");
            user.assert_calls(1);
        }

        #[tokio::test]
        async fn comments_are_listed_and_deleted_by_id() {
            let server = MockServer::start();
            server.mock(|when, then| {
                when.method(GET).path("/repos/acme/widget/issues/7/comments");
                then.status(200).json_body(json!([
                    {"id": 31, "user": {"login": "herald-bot"}, "body": "old"}
                ]));
            });
            let delete = server.mock(|when, then| {
                when.method(DELETE).path("/repos/acme/widget/issues/comments/31");
                then.status(204);
            });

            let client = client_for(&server);
            let comments = client.list_comments(&issue()).await.unwrap();
            assert_eq!(comments.len(), 1);
            client.delete_comment(&issue(), comments[0].id).await.unwrap();

            delete.assert_calls(1);
        }
    }
}
