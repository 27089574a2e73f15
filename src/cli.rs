//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use regex::Regex;
use std::path::PathBuf;

/// Transmark - transposed marking for GitHub-hosted notebooks
///
/// Pulls one notebook from every student's lab repository, slices out the
/// cells of the requested exercises, and writes them side by side into
/// paginated HTML pages so one question can be graded across the class.
///
/// Examples:
///   transmark --user grader --course 571 --lab 4 -e 3
///   transmark --user grader --course 572 --lab 1 -e 3 4 5 --section L02 --throttle 0.1
///   transmark --course 571 --lab 4 -e 2 --from-raw
///   transmark --course 571 --lab 4 -e 2 --dry-run
///   transmark --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Username on the source-control host
    ///
    /// Can also be set via TRANSMARK_USER or the [github] section of the config file.
    #[arg(short, long, value_name = "NAME", env = "TRANSMARK_USER")]
    pub user: Option<String>,

    /// Course number (e.g. pass 571 for DSCI 571)
    #[arg(long, value_name = "COURSE", required_unless_present = "init_config")]
    pub course: Option<String>,

    /// Lab number (e.g. pass 4 to grade Lab 4)
    #[arg(long, value_name = "LAB", required_unless_present = "init_config")]
    pub lab: Option<String>,

    /// Exercise number(s) to extract
    ///
    /// Pass 3 for Exercise 3, or 3 4 5 for Exercises 3 to 5 on the same page.
    #[arg(
        short,
        long = "exercise",
        value_name = "NUM",
        num_args = 1..,
        required_unless_present = "init_config"
    )]
    pub exercises: Vec<u32>,

    /// Regex used to pick the notebook among the repository's root files
    ///
    /// Defaults to `.*lab{LAB}.*ipynb`.
    #[arg(long, value_name = "REGEX")]
    pub file_pattern: Option<String>,

    /// CSV file listing the students' GitHub IDs
    ///
    /// Defaults to the [roster] path of the config file (classy.csv).
    #[arg(long, value_name = "FILE")]
    pub roster: Option<PathBuf>,

    /// Only keep students from this lab section (e.g. L02)
    #[arg(long, value_name = "SECTION")]
    pub section: Option<String>,

    /// Number of student answers per generated HTML page
    #[arg(long, value_name = "COUNT")]
    pub per_page: Option<usize>,

    /// Minimum delay in seconds between requests to the host
    #[arg(long, value_name = "SECS")]
    pub throttle: Option<f64>,

    /// Total fetch attempts for students still missing after a pass
    #[arg(long, value_name = "COUNT")]
    pub retries: Option<usize>,

    /// Save fetched notebooks as compressed files under raw/
    #[arg(long, conflicts_with = "no_save_raw")]
    pub save_raw: bool,

    /// Do not save fetched notebooks
    #[arg(long, conflicts_with = "save_raw")]
    pub no_save_raw: bool,

    /// Load notebooks saved by an earlier run instead of fetching them
    #[arg(long)]
    pub from_raw: bool,

    /// Root directory of the generated report tree
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// REST API base URL of the host
    ///
    /// Use https://HOST/api/v3 for GitHub Enterprise.
    #[arg(long, value_name = "URL", env = "GITHUB_API_URL")]
    pub api_url: Option<String>,

    /// Organization owning the student repositories
    #[arg(long, value_name = "ORG")]
    pub org: Option<String>,

    /// File whose first line is the access token (or password)
    #[arg(long, value_name = "FILE")]
    pub token_file: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .transmark.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load the roster and print what would be fetched and written
    #[arg(long)]
    pub dry_run: bool,

    /// Exit with code 2 when any student has no submission
    #[arg(long)]
    pub strict: bool,

    /// Generate a default .transmark.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Course number, empty when not given (validated first).
    pub fn course(&self) -> &str {
        self.course.as_deref().unwrap_or("")
    }

    /// Lab number, empty when not given (validated first).
    pub fn lab(&self) -> &str {
        self.lab.as_deref().unwrap_or("")
    }

    /// The notebook file regex, falling back to the lab-based default.
    pub fn effective_file_pattern(&self) -> String {
        self.file_pattern
            .clone()
            .unwrap_or_else(|| format!(".*lab{}.*ipynb", self.lab()))
    }

    /// Whether raw notebooks should be saved, if the CLI says so explicitly.
    pub fn save_raw_override(&self) -> Option<bool> {
        if self.save_raw {
            Some(true)
        } else if self.no_save_raw {
            Some(false)
        } else {
            None
        }
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.course().trim().is_empty() {
            return Err("Course number must not be empty".to_string());
        }

        if self.lab().trim().is_empty() {
            return Err("Lab number must not be empty".to_string());
        }

        if self.exercises.is_empty() {
            return Err("At least one exercise number is required".to_string());
        }

        if let Some(per_page) = self.per_page {
            if per_page == 0 {
                return Err("Students per page must be at least 1".to_string());
            }
        }

        if let Some(throttle) = self.throttle {
            if !throttle.is_finite() || throttle < 0.0 {
                return Err("Throttle must be a non-negative number of seconds".to_string());
            }
        }

        if let Some(retries) = self.retries {
            if retries == 0 {
                return Err("Retries must be at least 1".to_string());
            }
        }

        if let Some(ref url) = self.api_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("API URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Err(e) = Regex::new(&self.effective_file_pattern()) {
            return Err(format!("Invalid file pattern: {}", e));
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref roster) = self.roster {
            if !roster.is_file() {
                return Err(format!("Roster file does not exist: {}", roster.display()));
            }
        }

        if let Some(ref token_file) = self.token_file {
            if !token_file.is_file() {
                return Err(format!(
                    "Token file does not exist: {}",
                    token_file.display()
                ));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn make_args() -> Args {
        Args {
            user: Some("grader".to_string()),
            course: Some("571".to_string()),
            lab: Some("4".to_string()),
            exercises: vec![3],
            file_pattern: None,
            roster: None,
            section: None,
            per_page: None,
            throttle: None,
            retries: None,
            save_raw: false,
            no_save_raw: false,
            from_raw: false,
            output_dir: None,
            api_url: None,
            org: None,
            token_file: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            strict: false,
            init_config: false,
        }
    }

    #[test]
    fn test_parse_multiple_exercises() {
        let args = Args::try_parse_from([
            "transmark", "--course", "572", "--lab", "1", "-e", "3", "4", "5", "--section", "L02",
        ])
        .unwrap();
        assert_eq!(args.exercises, vec![3, 4, 5]);
        assert_eq!(args.section.as_deref(), Some("L02"));
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_init_config_needs_nothing_else() {
        let args = Args::try_parse_from(["transmark", "--init-config"]).unwrap();
        assert!(args.init_config);
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_course_is_required() {
        let result = Args::try_parse_from(["transmark", "--lab", "1", "-e", "2"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_default_file_pattern() {
        let args = make_args();
        assert_eq!(args.effective_file_pattern(), ".*lab4.*ipynb");

        let mut custom = make_args();
        custom.file_pattern = Some("answers\\.ipynb".to_string());
        assert_eq!(custom.effective_file_pattern(), "answers\\.ipynb");
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut args = make_args();
        args.per_page = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.throttle = Some(-1.0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.retries = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.file_pattern = Some("lab(".to_string());
        assert!(args.validate().is_err());

        let mut args = make_args();
        args.api_url = Some("github.example.com".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let mut args = make_args();
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_save_raw_override() {
        let mut args = make_args();
        assert_eq!(args.save_raw_override(), None);
        args.no_save_raw = true;
        assert_eq!(args.save_raw_override(), Some(false));
        args.no_save_raw = false;
        args.save_raw = true;
        assert_eq!(args.save_raw_override(), Some(true));
    }

    #[test]
    fn test_log_level() {
        let mut args = make_args();
        assert_eq!(args.log_level(), tracing::Level::INFO);

        args.verbose = true;
        assert_eq!(args.log_level(), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(), tracing::Level::ERROR);
    }
}
