//! Typed resource facade
//!
//! Each operation only shapes a request (path, query, media type, where the
//! items live) and hands it to the executor or the aggregator. Nothing here
//! fails loudly: malformed repository names and exhausted retry policies are
//! logged and turn into an empty `Vec` or `None`.

use std::fmt;
use std::str::FromStr;

use github_api::constants::{MEDIA_TYPE_LABELS, MEDIA_TYPE_STAR};
use github_api::{ApiRequest, GitHubClient};
use serde_json::Value;
use tracing::warn;

use crate::error::{Error, Result};
use crate::executor::Executor;
use crate::pagination::Collection;

/// An `owner/repo` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoName {
    pub owner: String,
    pub repo: String,
}

impl RepoName {
    /// API path for this repository plus `suffix` (e.g. `/stargazers`).
    pub fn path(&self, suffix: &str) -> String {
        format!("/repos/{}/{}{suffix}", self.owner, self.repo)
    }
}

impl FromStr for RepoName {
    type Err = Error;

    /// Takes the first two `/`-separated segments; both must be valid names.
    fn from_str(s: &str) -> Result<Self> {
        let mut segments = s.split('/');
        let owner = segments.next().unwrap_or_default().trim();
        let repo = segments.next().unwrap_or_default().trim();
        if !is_valid_name(owner) || !is_valid_name(repo) {
            return Err(Error::InvalidRepoName(s.to_string()));
        }
        Ok(Self {
            owner: owner.to_string(),
            repo: repo.to_string(),
        })
    }
}

/// Owner, repository and user names: `[A-Za-z0-9._-]+`, never `.` or `..`.
pub fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

impl fmt::Display for RepoName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.repo)
    }
}

/// Repository endpoints, see [`crate::GitHubPool::repos`].
pub struct Repos<'a> {
    client: &'a GitHubClient,
    executor: &'a Executor,
}

impl<'a> Repos<'a> {
    pub(crate) fn new(client: &'a GitHubClient, executor: &'a Executor) -> Self {
        Self { client, executor }
    }

    /// `GET /repos/{owner}/{repo}`
    pub async fn info(&self, repo: &str) -> Option<Value> {
        let name = parse_or_log(repo)?;
        let request = self.client.get(name.path(""));
        match self.executor.execute(&request).await {
            Ok(response) => Some(response.body),
            Err(e) => {
                warn!(repo = %name, error = %e, "repository info unavailable");
                None
            }
        }
    }

    /// Stargazers with `starred_at` timestamps.
    pub async fn stars(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/stargazers", |r| r.accept(MEDIA_TYPE_STAR))
            .await
    }

    pub async fn forks(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/forks", |r| r).await
    }

    /// Open and closed pull requests.
    pub async fn pull_requests(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/pulls", |r| r.query("state", "all"))
            .await
    }

    /// Review comments across all pull requests.
    pub async fn pull_request_comments(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/pulls/comments", |r| r.query("state", "all"))
            .await
    }

    /// Open and closed issues (GitHub includes pull requests here).
    pub async fn issues(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/issues", |r| r.query("state", "all"))
            .await
    }

    /// Comments across all issues.
    pub async fn issue_comments(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/issues/comments", |r| r.query("state", "all"))
            .await
    }

    pub async fn commits(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/commits", |r| r).await
    }

    pub async fn contributors(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/contributors", |r| r).await
    }

    /// Watchers, i.e. notification subscribers.
    pub async fn watchers(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/subscribers", |r| r).await
    }

    pub async fn events(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/events", |r| r).await
    }

    /// Labels including their descriptions.
    pub async fn labels(&self, repo: &str) -> Vec<Value> {
        self.collect(repo, "/labels", |r| r.accept(MEDIA_TYPE_LABELS))
            .await
    }

    async fn collect(
        &self,
        repo: &str,
        suffix: &str,
        shape: impl FnOnce(ApiRequest) -> ApiRequest,
    ) -> Vec<Value> {
        let Some(name) = parse_or_log(repo) else {
            return Vec::new();
        };
        let collection = Collection::new(shape(self.client.get(name.path(suffix))));
        fetch_or_log(self.executor, &collection).await
    }
}

/// Search endpoints, see [`crate::GitHubPool::search`].
pub struct Search<'a> {
    client: &'a GitHubClient,
    executor: &'a Executor,
}

impl<'a> Search<'a> {
    pub(crate) fn new(client: &'a GitHubClient, executor: &'a Executor) -> Self {
        Self { client, executor }
    }

    /// All repositories matching the raw search query `q`.
    pub async fn repositories(&self, q: &str) -> Vec<Value> {
        let collection =
            Collection::new(self.client.get("/search/repositories").query("q", q)).items_in("items");
        fetch_or_log(self.executor, &collection).await
    }
}

/// User endpoints, see [`crate::GitHubPool::users`].
pub struct Users<'a> {
    client: &'a GitHubClient,
    executor: &'a Executor,
}

impl<'a> Users<'a> {
    pub(crate) fn new(client: &'a GitHubClient, executor: &'a Executor) -> Self {
        Self { client, executor }
    }

    /// `GET /users/{login}`
    pub async fn info(&self, login: &str) -> Option<Value> {
        let login = login.trim();
        if !is_valid_name(login) {
            warn!(login, "invalid user login");
            return None;
        }
        let request = self.client.get(format!("/users/{login}"));
        match self.executor.execute(&request).await {
            Ok(response) => Some(response.body),
            Err(e) => {
                warn!(login, error = %e, "user info unavailable");
                None
            }
        }
    }
}

fn parse_or_log(repo: &str) -> Option<RepoName> {
    match repo.parse() {
        Ok(name) => Some(name),
        Err(e) => {
            warn!(error = %e, "rejecting malformed repository identifier");
            None
        }
    }
}

async fn fetch_or_log(executor: &Executor, collection: &Collection) -> Vec<Value> {
    match executor.fetch_all(collection).await {
        Ok(items) => items,
        Err(e) => {
            warn!(path = collection.request().path(), error = %e, "collection fetch failed");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_owner_and_repo() {
        let name: RepoName = "rust-lang/rust".parse().unwrap();
        assert_eq!(name.owner, "rust-lang");
        assert_eq!(name.repo, "rust");
        assert_eq!(name.to_string(), "rust-lang/rust");
        assert_eq!(name.path("/stargazers"), "/repos/rust-lang/rust/stargazers");
    }

    #[test]
    fn valid_names() {
        for good in ["rust-lang", "a", "foo.rs", "under_score", ".github", "v1.0"] {
            assert!(is_valid_name(good), "{good:?} should be accepted");
        }
        for bad in ["", ".", "..", "a/b", "a?b", "a%2Fb", "ä"] {
            assert!(!is_valid_name(bad), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn extra_segments_are_ignored() {
        let name: RepoName = "octo/cat/tree/main".parse().unwrap();
        assert_eq!(name.path(""), "/repos/octo/cat");
    }

    #[test]
    fn missing_segment_is_rejected() {
        for bad in ["not-a-valid-id", "owner/", "/repo", "", "/"] {
            assert!(
                matches!(bad.parse::<RepoName>(), Err(Error::InvalidRepoName(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn traversal_and_reserved_characters_are_rejected() {
        for bad in [
            "../..",
            "./repo",
            "owner/..",
            "../user?",
            "owner/repo?per_page=1",
            "owner/re po",
            "owner/%2E%2E",
            "owner/repo#x",
            "ow\\ner/repo",
        ] {
            assert!(
                matches!(bad.parse::<RepoName>(), Err(Error::InvalidRepoName(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
