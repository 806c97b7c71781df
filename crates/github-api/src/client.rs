//! reqwest-backed GitHub client and request descriptors
//!
//! [`GitHubClient`] carries everything shared by all calls (HTTP client, base
//! URL, User-Agent, per-call timeout) but no credential. [`ApiRequest`] is a
//! cloneable GET description that implements [`Call`], so the pool can run
//! the same request under whichever token has quota left.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use reqwest::Url;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderValue, LINK, USER_AGENT};
use tracing::debug;

use crate::constants::{API_URL, DEFAULT_USER_AGENT, MEDIA_TYPE_JSON};
use crate::error::{Error, Result};
use crate::rate_limit::RateLimit;
use crate::{Call, Response};

/// Default per-call timeout (10 minutes).
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(600);

/// Shared, credential-free GitHub client.
#[derive(Debug, Clone)]
pub struct GitHubClient {
    http: reqwest::Client,
    base_url: String,
    user_agent: String,
    timeout: Duration,
}

impl GitHubClient {
    /// Client for `base_url` (e.g. [`API_URL`] or a GitHub Enterprise API root).
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Client for the public API with default settings.
    pub fn public(http: reqwest::Client) -> Self {
        Self::new(http, API_URL)
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Start a GET request for `path` (relative to the base URL).
    pub fn get(&self, path: impl Into<String>) -> ApiRequest {
        ApiRequest {
            client: self.clone(),
            path: path.into(),
            query: Vec::new(),
            accept: MEDIA_TYPE_JSON,
        }
    }

    /// `GET /rate_limit`, which reports quota without consuming it.
    pub fn rate_limit(&self) -> ApiRequest {
        self.get("/rate_limit")
    }

    async fn send(&self, request: &ApiRequest, token: &str) -> Result<Response> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| Error::Url(format!("{}: {e}", self.base_url)))?;
        // Each segment is percent-encoded on its own; `.` and `..` are dropped
        url.path_segments_mut()
            .map_err(|()| Error::Url(format!("{} cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(request.path.split('/').filter(|s| !s.is_empty()));
        if !request.query.is_empty() {
            url.query_pairs_mut().extend_pairs(&request.query);
        }

        let authorization = HeaderValue::from_str(&format!("token {token}"))
            .map_err(|e| Error::Http(format!("invalid token value: {e}")))?;
        let user_agent = HeaderValue::from_str(&self.user_agent)
            .map_err(|e| Error::Http(format!("invalid user agent: {e}")))?;

        debug!(path = %request.path, "sending GitHub request");

        let response = self
            .http
            .get(url)
            .header(AUTHORIZATION, authorization)
            .header(ACCEPT, HeaderValue::from_static(request.accept))
            .header(USER_AGENT, user_agent)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| transport_error(&request.path, e))?;

        let status = response.status();
        let rate_limit = RateLimit::from_headers(response.headers());
        let link = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(Error::Status {
                status: status.as_u16(),
                body,
                rate_limit,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&request.path, e))?;
        let body = if bytes.is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .map_err(|e| Error::Decode(format!("{}: {e}", request.path)))?
        };

        Ok(Response {
            status: status.as_u16(),
            body,
            rate_limit,
            link,
        })
    }
}

fn transport_error(path: &str, e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(format!("{path}: {e}"))
    } else {
        Error::Http(format!("{path}: {e}"))
    }
}

/// A GET request against one API path, runnable under any token.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    client: GitHubClient,
    path: String,
    query: Vec<(String, String)>,
    accept: &'static str,
}

impl ApiRequest {
    /// Append a query parameter, replacing an existing one with the same key.
    pub fn query(mut self, key: &str, value: impl ToString) -> Self {
        self.query.retain(|(k, _)| k != key);
        self.query.push((key.to_string(), value.to_string()));
        self
    }

    /// Request a specific media type in the `Accept` header.
    pub fn accept(mut self, media_type: &'static str) -> Self {
        self.accept = media_type;
        self
    }

    /// Copy of this request for page `page`.
    pub fn page(&self, page: u32) -> Self {
        self.clone().query("page", page)
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_pairs(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn media_type(&self) -> &'static str {
        self.accept
    }
}

impl Call for ApiRequest {
    fn describe(&self) -> String {
        let page = self
            .query
            .iter()
            .find(|(k, _)| k == "page")
            .map(|(_, v)| format!(" page={v}"))
            .unwrap_or_default();
        format!("GET {}{page}", self.path)
    }

    fn call<'a>(
        &'a self,
        token: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Response>> + Send + 'a>> {
        Box::pin(self.client.send(self, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::MEDIA_TYPE_STAR;
    use axum::http::{HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use tokio::net::TcpListener;

    /// Start a mock GitHub that echoes request headers and query as JSON and
    /// answers `/fail` with a 403 carrying exhausted quota headers.
    async fn start_mock_github() -> (String, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let url = format!("http://{addr}");

        let handle = tokio::spawn(async move {
            let app = axum::Router::new()
                .route(
                    "/fail",
                    axum::routing::get(|| async {
                        (
                            StatusCode::FORBIDDEN,
                            [
                                ("x-ratelimit-remaining", "0"),
                                ("x-ratelimit-reset", "1700000000"),
                            ],
                            "API rate limit exceeded",
                        )
                            .into_response()
                    }),
                )
                .route(
                    "/empty",
                    axum::routing::get(|| async { StatusCode::NO_CONTENT.into_response() }),
                )
                .route(
                    "/garbage",
                    axum::routing::get(|| async { "this is not json".into_response() }),
                )
                .fallback(
                    |headers: HeaderMap, uri: axum::http::Uri| async move {
                        let header = |name: &str| {
                            headers
                                .get(name)
                                .and_then(|v| v.to_str().ok())
                                .unwrap_or("")
                                .to_string()
                        };
                        let body = serde_json::json!({
                            "path": uri.path(),
                            "query": uri.query().unwrap_or(""),
                            "authorization": header("authorization"),
                            "accept": header("accept"),
                            "user_agent": header("user-agent"),
                        });
                        (
                            StatusCode::OK,
                            [
                                ("content-type", "application/json"),
                                ("x-ratelimit-remaining", "4321"),
                                ("x-ratelimit-reset", "1700000000"),
                                (
                                    "link",
                                    "<https://api.github.com/x?page=2>; rel=\"next\", <https://api.github.com/x?page=3>; rel=\"last\"",
                                ),
                            ],
                            body.to_string(),
                        )
                            .into_response()
                    },
                );
            axum::serve(listener, app).await.unwrap();
        });

        (url, handle)
    }

    #[tokio::test]
    async fn sends_token_accept_and_user_agent() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url).with_user_agent("pool-test");

        let request = client
            .get("/repos/octo/cat/stargazers")
            .accept(MEDIA_TYPE_STAR)
            .query("per_page", 100)
            .page(2);
        let response = request.call("ghp_secret").await.unwrap();

        assert_eq!(response.status, 200);
        assert_eq!(response.body["path"], "/repos/octo/cat/stargazers");
        assert_eq!(response.body["query"], "per_page=100&page=2");
        assert_eq!(response.body["authorization"], "token ghp_secret");
        assert_eq!(response.body["accept"], MEDIA_TYPE_STAR);
        assert_eq!(response.body["user_agent"], "pool-test");
    }

    #[tokio::test]
    async fn reads_rate_limit_and_link_headers() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url);

        let response = client.rate_limit().call("t").await.unwrap();
        assert_eq!(
            response.rate_limit,
            Some(RateLimit {
                remaining: 4321,
                reset: 1_700_000_000
            })
        );
        let link = response.link.unwrap();
        assert_eq!(crate::link::last_page(&link).unwrap(), 3);
    }

    #[tokio::test]
    async fn error_status_carries_rate_limit() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url);

        let err = client.get("/fail").call("t").await.unwrap_err();
        match err {
            Error::Status {
                status,
                body,
                rate_limit,
            } => {
                assert_eq!(status, 403);
                assert!(body.contains("rate limit"));
                assert_eq!(rate_limit.map(|r| r.remaining), Some(0));
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn empty_body_decodes_to_null() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url);

        let response = client.get("/empty").call("t").await.unwrap();
        assert_eq!(response.status, 204);
        assert!(response.body.is_null());
    }

    #[tokio::test]
    async fn non_json_body_is_decode_error() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url);

        let err = client.get("/garbage").call("t").await.unwrap_err();
        assert!(matches!(err, Error::Decode(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn path_segments_are_encoded_and_dot_segments_dropped() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), url);

        let response = client
            .get("/repos/../../user?x=1")
            .call("t")
            .await
            .unwrap();
        assert_eq!(response.body["path"], "/repos/user%3Fx=1");
        assert_eq!(response.body["query"], "");

        let response = client.get("/users/%2E%2E").call("t").await.unwrap();
        assert_eq!(response.body["path"], "/users/%252E%252E");
    }

    #[tokio::test]
    async fn base_path_prefix_is_kept() {
        let (url, _server) = start_mock_github().await;
        let client = GitHubClient::new(reqwest::Client::new(), format!("{url}/api/v3/"));

        let response = client.get("/rate_limit").call("t").await.unwrap();
        assert_eq!(response.body["path"], "/api/v3/rate_limit");
    }

    #[tokio::test]
    async fn unreachable_host_is_http_error() {
        // Port 1 on localhost is reserved and refuses connections
        let client = GitHubClient::new(reqwest::Client::new(), "http://127.0.0.1:1")
            .with_timeout(Duration::from_secs(5));
        let err = client.get("/anything").call("t").await.unwrap_err();
        assert!(matches!(err, Error::Http(_) | Error::Timeout(_)), "got {err:?}");
    }

    #[test]
    fn page_replaces_existing_page_parameter() {
        let client = GitHubClient::public(reqwest::Client::new());
        let request = client
            .get("/repos/a/b/stargazers")
            .accept(MEDIA_TYPE_STAR)
            .query("per_page", 100)
            .page(1);
        let second = request.page(7);
        assert_eq!(second.media_type(), MEDIA_TYPE_STAR);
        assert_eq!(client.get("/x").media_type(), MEDIA_TYPE_JSON);
        assert_eq!(
            second.query_pairs(),
            &[
                ("per_page".to_string(), "100".to_string()),
                ("page".to_string(), "7".to_string())
            ]
        );
        assert_eq!(second.describe(), "GET /repos/a/b/stargazers page=7");
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = GitHubClient::new(reqwest::Client::new(), "https://ghe.example.com/api/v3/");
        assert_eq!(client.base_url(), "https://ghe.example.com/api/v3");
        assert_eq!(client.timeout(), DEFAULT_TIMEOUT);
    }
}
