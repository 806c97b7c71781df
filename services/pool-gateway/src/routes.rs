//! Read-only resource routes backed by the pool

use std::str::FromStr;
use std::time::Instant;

use axum::Json;
use axum::extract::{MatchedPath, Path, Query, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use github_pool::is_valid_name;
use serde::Deserialize;
use serde_json::Value;
use tracing::{Instrument, info, info_span};

use crate::AppState;
use crate::error::{Error, Result};

/// Repository collections exposed under `/repos/{owner}/{repo}/{collection}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepoCollection {
    Stars,
    Forks,
    Pulls,
    PullsComments,
    Issues,
    IssuesComments,
    Commits,
    Contributors,
    Watchers,
    Events,
    Labels,
}

impl FromStr for RepoCollection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "stars" => Self::Stars,
            "forks" => Self::Forks,
            "pulls" => Self::Pulls,
            "pulls-comments" => Self::PullsComments,
            "issues" => Self::Issues,
            "issues-comments" => Self::IssuesComments,
            "commits" => Self::Commits,
            "contributors" => Self::Contributors,
            "watchers" => Self::Watchers,
            "events" => Self::Events,
            "labels" => Self::Labels,
            other => return Err(Error::NotFound(format!("unknown collection {other:?}"))),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

pub async fn repo_info(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Value>> {
    let name = repo_name(&owner, &repo)?;
    state
        .pool
        .repos()
        .info(&name)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("repository {name}")))
}

pub async fn repo_collection(
    State(state): State<AppState>,
    Path((owner, repo, collection)): Path<(String, String, String)>,
) -> Result<Json<Vec<Value>>> {
    let collection: RepoCollection = collection.parse()?;
    let name = repo_name(&owner, &repo)?;
    let repos = state.pool.repos();
    let items = match collection {
        RepoCollection::Stars => repos.stars(&name).await,
        RepoCollection::Forks => repos.forks(&name).await,
        RepoCollection::Pulls => repos.pull_requests(&name).await,
        RepoCollection::PullsComments => repos.pull_request_comments(&name).await,
        RepoCollection::Issues => repos.issues(&name).await,
        RepoCollection::IssuesComments => repos.issue_comments(&name).await,
        RepoCollection::Commits => repos.commits(&name).await,
        RepoCollection::Contributors => repos.contributors(&name).await,
        RepoCollection::Watchers => repos.watchers(&name).await,
        RepoCollection::Events => repos.events(&name).await,
        RepoCollection::Labels => repos.labels(&name).await,
    };
    Ok(Json(items))
}

pub async fn search_repositories(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Value>>> {
    let q = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| Error::BadRequest("query parameter q is required".into()))?;
    Ok(Json(state.pool.search().repositories(&q).await))
}

pub async fn user(
    State(state): State<AppState>,
    Path(login): Path<String>,
) -> Result<Json<Value>> {
    if !is_valid_name(&login) {
        return Err(Error::BadRequest(format!("invalid user login {login:?}")));
    }
    state
        .pool
        .users()
        .info(&login)
        .await
        .map(Json)
        .ok_or_else(|| Error::NotFound(format!("user {login}")))
}

/// Decoded path segments, validated before anything reaches the pool.
fn repo_name(owner: &str, repo: &str) -> Result<String> {
    if !is_valid_name(owner) || !is_valid_name(repo) {
        return Err(Error::BadRequest(format!(
            "invalid repository name {owner:?}/{repo:?}"
        )));
    }
    Ok(format!("{owner}/{repo}"))
}

/// Tag each request with an id, log its outcome and record gateway metrics.
pub async fn track(request: Request, next: Next) -> Response {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_owned())
        .unwrap_or_else(|| "unmatched".to_owned());
    let request_id = format!("req_{}", uuid::Uuid::new_v4().as_simple());
    let span = info_span!("request", %request_id, route = %route);
    let started = Instant::now();

    let response = next.run(request).instrument(span.clone()).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    crate::metrics::record_request(&route, status, elapsed.as_secs_f64());
    span.in_scope(|| {
        info!(
            status,
            duration_ms = elapsed.as_millis() as u64,
            "request completed"
        )
    });
    response
}
