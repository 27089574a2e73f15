//! Access to student repositories on GitHub (or GitHub Enterprise).
//!
//! `client` speaks the REST API, `throttle` spaces requests out so the
//! host does not flag the run as a bot, and `fetcher` drives the
//! per-student download loop with retries.

pub mod client;
pub mod fetcher;
pub mod throttle;

pub use client::{repo_full_name, GitHubClient, LabSource};
pub use fetcher::{fetch_submissions, FetchOptions};
pub use throttle::Throttle;

use thiserror::Error;

/// Failure to fetch one student's notebook.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("authentication rejected for user '{user}' (check the token)")]
    Unauthorized { user: String },

    #[error("repository not found: {repo}")]
    RepoNotFound { repo: String },

    #[error("no file matching '{pattern}' in {repo}")]
    NoMatchingFile { repo: String, pattern: String },

    #[error("rate limited by the host (retry after {retry_after:?}s)")]
    RateLimited { retry_after: Option<u64> },

    #[error("HTTP {status} from {url}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("unexpected response from {url}: {message}")]
    Decode { url: String, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

impl FetchError {
    /// Errors that no amount of retrying will fix for any student.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FetchError::Unauthorized { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_auth_failures_are_fatal() {
        assert!(FetchError::Unauthorized {
            user: "grader".to_string()
        }
        .is_fatal());
        assert!(!FetchError::RepoNotFound {
            repo: "org/repo".to_string()
        }
        .is_fatal());
        assert!(!FetchError::RateLimited { retry_after: Some(60) }.is_fatal());
    }

    #[test]
    fn test_error_messages() {
        let err = FetchError::NoMatchingFile {
            repo: "MDS/DSCI_571_lab4_alice".to_string(),
            pattern: ".*lab4.*ipynb".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no file matching '.*lab4.*ipynb' in MDS/DSCI_571_lab4_alice"
        );
    }
}
