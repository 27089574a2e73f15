//! GitHub REST API client.
//!
//! Only two endpoints are needed: listing the root of a repository and
//! downloading a blob. Both go through the same throttled `get`.

use crate::github::fetcher::SubmissionSource;
use crate::github::{FetchError, Throttle};
use crate::models::{LabRef, Student, Submission};
use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

const JSON_MEDIA_TYPE: &str = "application/vnd.github+json";
const RAW_MEDIA_TYPE: &str = "application/vnd.github.v3.raw";

/// One entry of a repository directory listing.
#[derive(Debug, Clone, Deserialize)]
pub struct ContentEntry {
    pub name: String,
    pub path: String,
    pub sha: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// Authenticated, throttled client for one host.
pub struct GitHubClient {
    http: reqwest::Client,
    api_url: String,
    user: String,
    token: String,
    throttle: Throttle,
}

impl GitHubClient {
    /// Create a client authenticating as `user` with `token` (or password).
    pub fn new(
        api_url: &str,
        user: &str,
        token: &str,
        timeout: Duration,
        throttle: Throttle,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        info!(
            "Using {} as {} (min {:?} between requests)",
            api_url,
            user,
            throttle.interval()
        );

        Ok(Self {
            http,
            api_url: api_url.trim_end_matches('/').to_string(),
            user: user.to_string(),
            token: token.to_string(),
            throttle,
        })
    }

    /// List the files at the root of `repo` (`owner/name`).
    pub async fn list_root(&mut self, repo: &str) -> Result<Vec<ContentEntry>, FetchError> {
        let url = format!("{}/repos/{}/contents/", self.api_url, repo);
        let response = self.get(&url, JSON_MEDIA_TYPE).await.map_err(|e| match e {
            FetchError::Status { status: 404, .. } => FetchError::RepoNotFound {
                repo: repo.to_string(),
            },
            other => other,
        })?;

        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Download the blob `sha` of `repo` as text.
    pub async fn get_blob_text(&mut self, repo: &str, sha: &str) -> Result<String, FetchError> {
        let url = format!("{}/repos/{}/git/blobs/{}", self.api_url, repo, sha);
        let response = self.get(&url, RAW_MEDIA_TYPE).await?;
        let body = response.bytes().await?;
        String::from_utf8(body.to_vec()).map_err(|e| FetchError::Decode {
            url,
            message: e.to_string(),
        })
    }

    /// Download the first root file of `repo` whose path matches `pattern`.
    ///
    /// Returns the file name and its content.
    pub async fn fetch_notebook(
        &mut self,
        repo: &str,
        pattern: &Regex,
    ) -> Result<(String, String), FetchError> {
        let entries = self.list_root(repo).await?;
        let entry = select_entry(&entries, pattern)
            .cloned()
            .ok_or_else(|| FetchError::NoMatchingFile {
                repo: repo.to_string(),
                pattern: pattern.as_str().to_string(),
            })?;

        debug!("{}: fetching {}", repo, entry.name);
        let content = self.get_blob_text(repo, &entry.sha).await?;
        Ok((entry.name, content))
    }

    async fn get(&mut self, url: &str, accept: &str) -> Result<Response, FetchError> {
        self.throttle.wait().await;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .header(USER_AGENT, concat!("transmark/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, accept)
            .basic_auth(&self.user, Some(&self.token))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let headers = response.headers().clone();
        let body = response.text().await.unwrap_or_default();
        Err(classify_failure(url, &self.user, status, &headers, body))
    }
}

/// Turn a non-success response into the matching `FetchError`.
fn classify_failure(
    url: &str,
    user: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: String,
) -> FetchError {
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let quota_exhausted = headers
        .get("x-ratelimit-remaining")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v == "0");

    match status {
        StatusCode::UNAUTHORIZED => FetchError::Unauthorized {
            user: user.to_string(),
        },
        StatusCode::TOO_MANY_REQUESTS => FetchError::RateLimited { retry_after },
        StatusCode::FORBIDDEN if quota_exhausted || retry_after.is_some() => {
            FetchError::RateLimited { retry_after }
        }
        _ => FetchError::Status {
            url: url.to_string(),
            status: status.as_u16(),
            body: body.chars().take(200).collect(),
        },
    }
}

/// Fill the repository name template and prefix the organization.
pub fn repo_full_name(org: &str, template: &str, lab: &LabRef, student: &str) -> String {
    let name = template
        .replace("{course}", &lab.course)
        .replace("{lab}", &lab.lab)
        .replace("{student}", student);
    format!("{}/{}", org, name)
}

/// First file entry whose path matches `pattern` (regex search).
pub fn select_entry<'a>(entries: &'a [ContentEntry], pattern: &Regex) -> Option<&'a ContentEntry> {
    entries
        .iter()
        .filter(|e| e.kind == "file")
        .find(|e| pattern.is_match(&e.path))
}

/// Fetches the lab notebook of each student from their lab repository.
pub struct LabSource {
    client: GitHubClient,
    org: String,
    repo_template: String,
    lab: LabRef,
    pattern: Regex,
}

impl LabSource {
    pub fn new(
        client: GitHubClient,
        org: impl Into<String>,
        repo_template: impl Into<String>,
        lab: LabRef,
        pattern: Regex,
    ) -> Self {
        Self {
            client,
            org: org.into(),
            repo_template: repo_template.into(),
            lab,
            pattern,
        }
    }
}

impl SubmissionSource for LabSource {
    async fn fetch(&mut self, student: &Student) -> Result<Submission, FetchError> {
        let repo = repo_full_name(&self.org, &self.repo_template, &self.lab, &student.id);
        debug!("Fetching from {}", repo);

        let (file_name, content) = self.client.fetch_notebook(&repo, &self.pattern).await?;

        Ok(Submission {
            student: student.id.clone(),
            file_name,
            fetched_at: Utc::now(),
            content,
        })
    }
}
