//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.transmark.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = ".transmark.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Source-control host settings.
    #[serde(default)]
    pub github: GitHubConfig,

    /// Roster file settings.
    #[serde(default)]
    pub roster: RosterConfig,

    /// Download settings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// Host and repository naming settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubConfig {
    /// REST API base URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Organization owning the student repositories.
    #[serde(default = "default_org")]
    pub org: String,

    /// Repository name template with `{course}`, `{lab}` and `{student}`.
    #[serde(default = "default_repo_template")]
    pub repo_template: String,

    /// Username used to authenticate.
    #[serde(default)]
    pub user: Option<String>,

    /// Environment variable holding the token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            org: default_org(),
            repo_template: default_repo_template(),
            user: None,
            token_env: default_token_env(),
        }
    }
}

fn default_api_url() -> String {
    "https://api.github.com".to_string()
}

fn default_org() -> String {
    "MDS-2019-20".to_string()
}

fn default_repo_template() -> String {
    "DSCI_{course}_lab{lab}_{student}".to_string()
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".to_string()
}

/// Roster CSV settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterConfig {
    /// Path to the roster CSV.
    #[serde(default = "default_roster_path")]
    pub path: PathBuf,

    /// Column holding the student's GitHub ID.
    #[serde(default = "default_id_column")]
    pub id_column: String,

    /// Regex selecting the section column among the headers.
    #[serde(default = "default_section_pattern")]
    pub section_pattern: String,
}

impl Default for RosterConfig {
    fn default() -> Self {
        Self {
            path: default_roster_path(),
            id_column: default_id_column(),
            section_pattern: default_section_pattern(),
        }
    }
}

fn default_roster_path() -> PathBuf {
    PathBuf::from("classy.csv")
}

fn default_id_column() -> String {
    "id0".to_string()
}

fn default_section_pattern() -> String {
    "[Ss]ection".to_string()
}

/// Download settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Minimum seconds between two requests.
    #[serde(default = "default_throttle")]
    pub throttle_seconds: f64,

    /// Total attempts per missing student.
    #[serde(default = "default_retries")]
    pub retries: usize,

    /// Keep compressed copies of the fetched notebooks.
    #[serde(default = "default_true")]
    pub save_raw: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            throttle_seconds: default_throttle(),
            retries: default_retries(),
            save_raw: true,
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_throttle() -> f64 {
    0.25
}

fn default_retries() -> usize {
    5
}

fn default_true() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Student answers per page.
    #[serde(default = "default_per_page")]
    pub students_per_page: usize,

    /// Root of the output tree.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Heading regex for an exercise; `{n}` is the exercise number.
    #[serde(default = "default_exercise_heading")]
    pub exercise_heading: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            students_per_page: default_per_page(),
            output_dir: default_output_dir(),
            exercise_heading: default_exercise_heading(),
        }
    }
}

fn default_per_page() -> usize {
    15
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_exercise_heading() -> String {
    r"#+.*Exercise {n}\b".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(DEFAULT_CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref user) = args.user {
            self.github.user = Some(user.clone());
        }
        if let Some(ref api_url) = args.api_url {
            self.github.api_url = api_url.clone();
        }
        if let Some(ref org) = args.org {
            self.github.org = org.clone();
        }

        if let Some(ref roster) = args.roster {
            self.roster.path = roster.clone();
        }

        if let Some(throttle) = args.throttle {
            self.fetch.throttle_seconds = throttle;
        }
        if let Some(retries) = args.retries {
            self.fetch.retries = retries;
        }
        if let Some(save_raw) = args.save_raw_override() {
            self.fetch.save_raw = save_raw;
        }

        if let Some(per_page) = args.per_page {
            self.report.students_per_page = per_page;
        }
        if let Some(ref output_dir) = args.output_dir {
            self.report.output_dir = output_dir.clone();
        }
    }

    /// Resolve the access token: token file first, then the configured env var.
    pub fn resolve_token(&self, token_file: Option<&Path>) -> Result<Option<String>> {
        if let Some(path) = token_file {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read token file: {}", path.display()))?;
            let token = content.lines().next().unwrap_or("").trim().to_string();
            if token.is_empty() {
                anyhow::bail!("Token file is empty: {}", path.display());
            }
            return Ok(Some(token));
        }

        Ok(std::env::var(&self.github.token_env)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()))
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
