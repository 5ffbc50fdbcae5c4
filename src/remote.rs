//! Remote forum endpoints used by the mutator.
//!
//! [`ForumApi`] is the seam: the mutator is generic over it, the CLI uses
//! [`HttpForumApi`], and tests substitute in-memory fakes.
use crate::topic::{TopicId, TopicStatus};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Longest error text kept from a response body.
const MAX_ERROR_BODY: usize = 512;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// The server answered with an error payload.
    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

// ============================================================================
// Batch Operations
// ============================================================================

/// Actions applicable to a selection of topics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BatchOperation {
    Follow,
    Unfollow,
    Close,
    Archive,
    Unlist,
    Delete,
    ResetBumpDate,
}

impl BatchOperation {
    pub const ALL: [BatchOperation; 7] = [
        BatchOperation::Follow,
        BatchOperation::Unfollow,
        BatchOperation::Close,
        BatchOperation::Archive,
        BatchOperation::Unlist,
        BatchOperation::Delete,
        BatchOperation::ResetBumpDate,
    ];

    /// Operation type sent to the bulk endpoint, for operations that use it.
    pub fn bulk_type(&self) -> Option<&'static str> {
        match self {
            BatchOperation::Follow | BatchOperation::Unfollow => None,
            BatchOperation::Close => Some("close"),
            BatchOperation::Archive => Some("archive"),
            BatchOperation::Unlist => Some("unlist"),
            BatchOperation::Delete => Some("delete"),
            BatchOperation::ResetBumpDate => Some("reset_bump_dates"),
        }
    }

    /// Name used on the command line and in log output.
    pub fn name(&self) -> &'static str {
        match self {
            BatchOperation::Follow => "follow",
            BatchOperation::Unfollow => "unfollow",
            BatchOperation::Close => "close",
            BatchOperation::Archive => "archive",
            BatchOperation::Unlist => "unlist",
            BatchOperation::Delete => "delete",
            BatchOperation::ResetBumpDate => "reset-bump-date",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.name() == name)
    }
}

impl std::fmt::Display for BatchOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// API Seam
// ============================================================================

/// Remote calls the grid needs from the forum.
#[allow(async_fn_in_trait)]
pub trait ForumApi {
    /// `POST /voting/vote`
    async fn vote(&self, topic_id: TopicId) -> Result<(), RemoteError>;
    /// `POST /voting/unvote`
    async fn unvote(&self, topic_id: TopicId) -> Result<(), RemoteError>;
    /// `PUT /topics/bulk`
    async fn bulk(&self, topic_ids: &[TopicId], operation_type: &str) -> Result<(), RemoteError>;
    /// `PUT /t/:id/status`
    async fn set_status(
        &self,
        topic_id: TopicId,
        status: TopicStatus,
        enabled: bool,
    ) -> Result<(), RemoteError>;
    /// `DELETE /t/:id`
    async fn delete_topic(&self, topic_id: TopicId) -> Result<(), RemoteError>;
}

#[derive(Debug, Serialize)]
struct VoteBody {
    topic_id: TopicId,
}

#[derive(Debug, Serialize)]
struct BulkOperationBody<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Debug, Serialize)]
struct BulkBody<'a> {
    topic_ids: &'a [TopicId],
    operation: BulkOperationBody<'a>,
}

#[derive(Debug, Serialize)]
struct StatusBody {
    status: &'static str,
    enabled: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    error: Option<String>,
}

/// [`ForumApi`] over HTTP.
pub struct HttpForumApi {
    client: reqwest::Client,
    base: Url,
    api_key: Option<SecretString>,
    api_username: Option<String>,
    timeout: Duration,
}

impl std::fmt::Debug for HttpForumApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpForumApi")
            .field("base", &self.base.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("api_username", &self.api_username)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl HttpForumApi {
    /// `base` is the forum root; endpoint paths are resolved beneath it.
    pub fn new(client: reqwest::Client, mut base: Url) -> Self {
        if !base.path().ends_with('/') {
            let rooted = format!("{}/", base.path());
            base.set_path(&rooted);
        }
        Self {
            client,
            base,
            api_key: None,
            api_username: None,
            timeout: Duration::from_secs(20),
        }
    }

    pub fn with_credentials(mut self, api_key: SecretString, api_username: Option<String>) -> Self {
        self.api_key = Some(api_key);
        self.api_username = api_username;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base.join(path.trim_start_matches('/'))?)
    }

    async fn send(&self, request: reqwest::RequestBuilder, label: &str) -> Result<(), RemoteError> {
        let mut request = request.header("Accept", "application/json");
        if let Some(key) = &self.api_key {
            request = request.header("Api-Key", key.expose_secret());
            if let Some(user) = &self.api_username {
                request = request.header("Api-Username", user);
            }
        }

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| RemoteError::Timeout(self.timeout))?
            .map_err(RemoteError::Network)?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(endpoint = label, status = status.as_u16(), "Remote call succeeded");
            return Ok(());
        }

        let code = status.as_u16();
        let body = response.text().await.unwrap_or_default();
        let err = match error_message(&body) {
            Some(message) => RemoteError::Rejected {
                status: code,
                message,
            },
            None => RemoteError::HttpStatus(code),
        };
        tracing::warn!(endpoint = label, status = code, error = %err, "Remote call failed");
        Err(err)
    }
}

/// Pull a human-readable message out of a forum error body.
fn error_message(body: &str) -> Option<String> {
    let parsed: ErrorBody = serde_json::from_str(body).ok()?;
    let message = if parsed.errors.is_empty() {
        parsed.error?
    } else {
        parsed.errors.join("; ")
    };
    let mut message = message.trim().to_string();
    if message.is_empty() {
        return None;
    }
    if message.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !message.is_char_boundary(cut) {
            cut -= 1;
        }
        message.truncate(cut);
    }
    Some(message)
}

impl ForumApi for HttpForumApi {
    async fn vote(&self, topic_id: TopicId) -> Result<(), RemoteError> {
        let url = self.endpoint("/voting/vote")?;
        let request = self.client.post(url).json(&VoteBody { topic_id });
        self.send(request, "vote").await
    }

    async fn unvote(&self, topic_id: TopicId) -> Result<(), RemoteError> {
        let url = self.endpoint("/voting/unvote")?;
        let request = self.client.post(url).json(&VoteBody { topic_id });
        self.send(request, "unvote").await
    }

    async fn bulk(&self, topic_ids: &[TopicId], operation_type: &str) -> Result<(), RemoteError> {
        let url = self.endpoint("/topics/bulk")?;
        let body = BulkBody {
            topic_ids,
            operation: BulkOperationBody {
                kind: operation_type,
            },
        };
        let request = self.client.put(url).json(&body);
        self.send(request, "bulk").await
    }

    async fn set_status(
        &self,
        topic_id: TopicId,
        status: TopicStatus,
        enabled: bool,
    ) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("/t/{}/status", topic_id))?;
        let body = StatusBody {
            status: status.as_str(),
            enabled,
        };
        let request = self.client.put(url).json(&body);
        self.send(request, "status").await
    }

    async fn delete_topic(&self, topic_id: TopicId) -> Result<(), RemoteError> {
        let url = self.endpoint(&format!("/t/{}", topic_id))?;
        self.send(self.client.delete(url), "delete").await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api(server: &MockServer) -> HttpForumApi {
        HttpForumApi::new(reqwest::Client::new(), Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_vote_posts_topic_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voting/vote"))
            .and(body_json(serde_json::json!({ "topic_id": 12 })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(api(&server).vote(12).await.is_ok());
    }

    #[tokio::test]
    async fn test_unvote_uses_distinct_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voting/unvote"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(api(&server).unvote(3).await.is_ok());
    }

    #[tokio::test]
    async fn test_bulk_sends_ids_and_operation() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/topics/bulk"))
            .and(body_json(serde_json::json!({
                "topic_ids": [1, 2, 3],
                "operation": { "type": "close" }
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        assert!(api(&server).bulk(&[1, 2, 3], "close").await.is_ok());
    }

    #[tokio::test]
    async fn test_status_and_delete_paths() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/t/9/status"))
            .and(body_json(serde_json::json!({ "status": "archived", "enabled": true })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/t/9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server);
        assert!(api.set_status(9, TopicStatus::Archived, true).await.is_ok());
        assert!(api.delete_topic(9).await.is_ok());
    }

    #[tokio::test]
    async fn test_credentials_sent_as_headers() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("Api-Key", "secret"))
            .and(header("Api-Username", "system"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let api = api(&server).with_credentials(SecretString::from("secret".to_string()), Some("system".into()));
        assert!(api.vote(1).await.is_ok());
    }

    #[tokio::test]
    async fn test_error_body_becomes_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_string(r#"{"errors":["You have run out of votes"]}"#),
            )
            .mount(&server)
            .await;

        let err = api(&server).vote(1).await.unwrap_err();
        match err {
            RemoteError::Rejected { status, message } => {
                assert_eq!(status, 422);
                assert_eq!(message, "You have run out of votes");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sub_second_timeout_reported_exactly() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/voting/vote"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let err = api(&server)
            .with_timeout(Duration::from_millis(250))
            .vote(1)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Timeout(d) if d == Duration::from_millis(250)));
        assert_eq!(err.to_string(), "Request timed out after 250ms");
    }

    #[tokio::test]
    async fn test_plain_failure_is_http_status() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = api(&server).bulk(&[1], "archive").await.unwrap_err();
        assert!(matches!(err, RemoteError::HttpStatus(500)));
    }

    #[test]
    fn test_operation_names_round_trip() {
        for op in BatchOperation::ALL {
            assert_eq!(BatchOperation::from_name(op.name()), Some(op));
        }
        assert_eq!(BatchOperation::from_name("explode"), None);
        assert_eq!(BatchOperation::ResetBumpDate.bulk_type(), Some("reset_bump_dates"));
        assert_eq!(BatchOperation::Follow.bulk_type(), None);
    }

    #[test]
    fn test_debug_masks_api_key() {
        let api = HttpForumApi::new(reqwest::Client::new(), Url::parse("https://f.example").unwrap())
            .with_credentials(SecretString::from("hunter2".to_string()), None);
        let out = format!("{:?}", api);
        assert!(!out.contains("hunter2"));
        assert!(out.contains("[REDACTED]"));
    }
}
