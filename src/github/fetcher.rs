//! Sequential download of every student's notebook, with retry passes.

use crate::github::FetchError;
use crate::models::{Student, Submission};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{info, warn};

/// Something that can produce the submission of one student.
pub trait SubmissionSource {
    async fn fetch(&mut self, student: &Student) -> Result<Submission, FetchError>;
}

/// Options for the fetch loop.
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Total number of passes over the students still missing.
    pub attempts: usize,
    /// Pause between two passes.
    pub retry_pause: Duration,
    /// Whether to draw a progress bar.
    pub show_progress: bool,
}

/// Result of the fetch loop.
#[derive(Debug, Default)]
pub struct FetchOutcome {
    /// Submissions in roster order.
    pub submissions: Vec<Submission>,
    /// Students still without a submission after all passes.
    pub missing: Vec<Student>,
}

/// Fetch the submission of every student.
///
/// A failing student is logged and left for the next pass. Authentication
/// failures abort immediately.
pub async fn fetch_submissions<S: SubmissionSource>(
    source: &mut S,
    students: &[Student],
    options: &FetchOptions,
) -> Result<FetchOutcome, FetchError> {
    let mut fetched: HashMap<String, Submission> = HashMap::new();
    let mut missing: Vec<Student> = students.to_vec();
    let attempts = options.attempts.max(1);

    for attempt in 1..=attempts {
        if missing.is_empty() {
            break;
        }
        if attempt > 1 {
            info!("Attempt {} for {} missing students", attempt, missing.len());
            tokio::time::sleep(options.retry_pause).await;
        }

        let progress = make_progress_bar(options.show_progress, missing.len());
        let mut still_missing = Vec::new();

        for student in missing {
            if let Some(ref pb) = progress {
                pb.set_message(student.id.clone());
            }

            match source.fetch(&student).await {
                Ok(submission) => {
                    info!("Fetched {} for {}", submission.file_name, student.id);
                    fetched.insert(student.id.clone(), submission);
                }
                Err(e) if e.is_fatal() => {
                    if let Some(ref pb) = progress {
                        pb.abandon();
                    }
                    return Err(e);
                }
                Err(e) => {
                    warn!("{}: {}", student.id, e);
                    still_missing.push(student);
                }
            }

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }
        missing = still_missing;
    }

    // Keep roster order
    let submissions = students
        .iter()
        .filter_map(|s| fetched.remove(&s.id))
        .collect();

    Ok(FetchOutcome {
        submissions,
        missing,
    })
}

fn make_progress_bar(show: bool, len: usize) -> Option<ProgressBar> {
    if !show {
        return None;
    }

    let pb = ProgressBar::new(len as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    pb.set_style(style);
    Some(pb)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    /// Fails each listed student a fixed number of times before succeeding.
    struct FlakySource {
        failures_left: HashMap<String, usize>,
        fatal_for: Option<String>,
        calls: Vec<String>,
    }

    impl FlakySource {
        fn new(failures: &[(&str, usize)]) -> Self {
            Self {
                failures_left: failures
                    .iter()
                    .map(|(id, n)| (id.to_string(), *n))
                    .collect(),
                fatal_for: None,
                calls: Vec::new(),
            }
        }
    }

    impl SubmissionSource for FlakySource {
        async fn fetch(&mut self, student: &Student) -> Result<Submission, FetchError> {
            self.calls.push(student.id.clone());

            if self.fatal_for.as_deref() == Some(student.id.as_str()) {
                return Err(FetchError::Unauthorized {
                    user: "grader".to_string(),
                });
            }

            if let Some(left) = self.failures_left.get_mut(&student.id) {
                if *left > 0 {
                    *left -= 1;
                    return Err(FetchError::RepoNotFound {
                        repo: format!("org/{}", student.id),
                    });
                }
            }

            Ok(Submission {
                student: student.id.clone(),
                file_name: "lab1.ipynb".to_string(),
                fetched_at: Utc::now(),
                content: "{}".to_string(),
            })
        }
    }

    fn students(ids: &[&str]) -> Vec<Student> {
        ids.iter().map(|id| Student::new(*id)).collect()
    }

    fn options(attempts: usize) -> FetchOptions {
        FetchOptions {
            attempts,
            retry_pause: Duration::ZERO,
            show_progress: false,
        }
    }

    #[tokio::test]
    async fn test_all_fetched_in_roster_order() {
        let mut source = FlakySource::new(&[]);
        let roster = students(&["c", "a", "b"]);

        let outcome = fetch_submissions(&mut source, &roster, &options(3)).await.unwrap();

        let ids: Vec<&str> = outcome.submissions.iter().map(|s| s.student.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
        assert!(outcome.missing.is_empty());
        assert_eq!(source.calls.len(), 3);
    }

    #[tokio::test]
    async fn test_retries_only_missing_students() {
        let mut source = FlakySource::new(&[("b", 1)]);
        let roster = students(&["a", "b", "c"]);

        let outcome = fetch_submissions(&mut source, &roster, &options(3)).await.unwrap();

        assert_eq!(outcome.submissions.len(), 3);
        assert_eq!(outcome.submissions[1].student, "b");
        assert_eq!(source.calls, vec!["a", "b", "c", "b"]);
    }

    #[tokio::test]
    async fn test_reports_students_missing_after_all_attempts() {
        let mut source = FlakySource::new(&[("b", 10)]);
        let roster = students(&["a", "b"]);

        let outcome = fetch_submissions(&mut source, &roster, &options(2)).await.unwrap();

        assert_eq!(outcome.submissions.len(), 1);
        assert_eq!(outcome.missing, students(&["b"]));
        assert_eq!(source.calls, vec!["a", "b", "b"]);
    }

    #[test]
    fn test_auth_failure_aborts() {
        let mut source = FlakySource::new(&[]);
        source.fatal_for = Some("b".to_string());
        let roster = students(&["a", "b", "c"]);

        let result = tokio_test::block_on(fetch_submissions(&mut source, &roster, &options(5)));

        assert!(matches!(result, Err(FetchError::Unauthorized { .. })));
        assert_eq!(source.calls, vec!["a", "b"]);
    }
}
