//! Transmark - transposed marking for GitHub-hosted notebooks
//!
//! A CLI tool that fetches one notebook from each student's lab
//! repository, extracts the cells of the requested exercises, and writes
//! them into paginated HTML pages so one question can be graded across
//! the whole class.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (roster, config, authentication, output, etc.)
//!   2 - Some students have no submission and --strict was set

mod archive;
mod cli;
mod config;
mod github;
mod models;
mod notebook;
mod report;
mod roster;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::Config;
use github::{FetchOptions, GitHubClient, LabSource, Throttle};
use models::{ExerciseSelection, LabRef, Page, RunSummary, Student, Submission};
use notebook::ExerciseLocator;
use regex::Regex;
use report::ReportContext;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

/// Pause between two fetch passes over the missing students.
const RETRY_PAUSE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("Transmark v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .transmark.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .transmark.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .transmark.toml")?;

    println!("✅ Created .transmark.toml with default settings.");
    println!("   Edit it to set the host URL, organization, roster columns, and more.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete workflow. Returns exit code (0 or 2).
async fn run(args: Args) -> Result<i32> {
    let start_time = Instant::now();

    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let lab = LabRef::new(args.course(), args.lab());
    let selection = ExerciseSelection::new(&args.exercises)
        .context("At least one exercise number is required")?;
    let file_pattern = args.effective_file_pattern();
    let pattern = Regex::new(&file_pattern)
        .with_context(|| format!("Invalid file pattern: {}", file_pattern))?;
    let locator = ExerciseLocator::new(config.report.exercise_heading.clone());
    locator.validate()?;

    let section_str = match args.section {
        Some(ref section) => format!("in section {}", section),
        None => "in all sections".to_string(),
    };
    println!(
        "📚 Accessing {} as {}",
        lab,
        config.github.user.as_deref().unwrap_or("(no user)")
    );
    println!(
        "   Looking for students {} listed in {}",
        section_str,
        config.roster.path.display()
    );
    println!("   Searching for {} in files matching {}", selection, file_pattern);
    println!(
        "   Throttle: {}s, students per page: {}",
        config.fetch.throttle_seconds, config.report.students_per_page
    );

    // Step 1: Roster
    let students = roster::load_roster(&config.roster.path, &config.roster)?;
    let students = roster::filter_section(students, args.section.as_deref());
    if students.is_empty() {
        warn!("No students left after filtering the roster");
    }
    info!("{} students on the roster", students.len());

    let pages = roster::paginate(&students, config.report.students_per_page);
    let out_dir = report::lab_dir(&config.report.output_dir, &lab);

    let ctx = ReportContext {
        lab: lab.clone(),
        selection,
        locator,
        generated_at: Utc::now(),
    };

    if args.dry_run {
        return handle_dry_run(&config, &ctx, &pages, &out_dir);
    }

    // Step 2: Submissions
    let (submissions, missing) = if args.from_raw {
        println!("\n📦 Loading saved notebooks from {}", archive::raw_dir(&out_dir).display());
        archive::load_raw(&out_dir, &students)?
    } else {
        println!("\n📥 Fetching notebooks...");
        let (submissions, missing) =
            fetch_from_host(&args, &config, &lab, pattern, &students).await?;

        if config.fetch.save_raw && !submissions.is_empty() {
            let raw = archive::save_raw(&out_dir, &submissions)?;
            println!("   Saved raw notebooks to {}", raw.display());
        }
        (submissions, missing)
    };

    let missing_ids: Vec<String> = missing.iter().map(|s| s.id.clone()).collect();
    if !missing_ids.is_empty() {
        println!("{}", "-".repeat(50));
        println!("Missing GitHub IDs:");
        for id in &missing_ids {
            println!("   {}", id);
        }
        println!("{}", "-".repeat(50));
    }

    // Step 3: Pages
    println!("\n📝 Writing pages to {}:", out_dir.display());
    let written = report::write_report(&out_dir, &pages, &submissions, &missing_ids, &ctx)?;
    for path in &written {
        if let Some(name) = path.file_name() {
            println!("   {}", name.to_string_lossy());
        }
    }

    let summary = RunSummary {
        students: students.len(),
        fetched: submissions.len(),
        missing: missing_ids,
        pages: pages.len(),
    };
    let duration = start_time.elapsed().as_secs_f64();

    println!("\n📊 Summary:");
    println!("   Students: {}", summary.students);
    println!("   Submissions: {}", summary.fetched);
    println!("   Missing: {}", summary.missing.len());
    println!("   Pages: {}", summary.pages);
    println!("   Duration: {:.1}s", duration);
    println!("\n✅ Done! Open {}", out_dir.join("index.html").display());

    if args.strict && !summary.missing.is_empty() {
        eprintln!(
            "\n⛔ {} students have no submission. Failing (exit code 2).",
            summary.missing.len()
        );
        return Ok(2);
    }

    Ok(0)
}

/// Authenticate and download every student's notebook.
async fn fetch_from_host(
    args: &Args,
    config: &Config,
    lab: &LabRef,
    pattern: Regex,
    students: &[Student],
) -> Result<(Vec<Submission>, Vec<Student>)> {
    let user = config
        .github
        .user
        .clone()
        .context("No username given: pass --user, set TRANSMARK_USER, or set [github].user")?;
    let token = config
        .resolve_token(args.token_file.as_deref())?
        .with_context(|| {
            format!(
                "No access token: pass --token-file or set {}",
                config.github.token_env
            )
        })?;

    let client = GitHubClient::new(
        &config.github.api_url,
        &user,
        &token,
        Duration::from_secs(config.fetch.timeout_seconds),
        Throttle::from_secs_f64(config.fetch.throttle_seconds),
    )?;
    let mut source = LabSource::new(
        client,
        config.github.org.clone(),
        config.github.repo_template.clone(),
        lab.clone(),
        pattern,
    );

    let options = FetchOptions {
        attempts: config.fetch.retries,
        retry_pause: RETRY_PAUSE,
        show_progress: !args.quiet,
    };

    let outcome = github::fetch_submissions(&mut source, students, &options).await?;
    info!(
        "Fetched {} of {} notebooks",
        outcome.submissions.len(),
        students.len()
    );
    Ok((outcome.submissions, outcome.missing))
}

/// Handle --dry-run: print repositories and output files, no network.
fn handle_dry_run(
    config: &Config,
    ctx: &ReportContext,
    pages: &[Page],
    out_dir: &Path,
) -> Result<i32> {
    println!("\n🔍 Dry run: nothing will be fetched or written.\n");

    if pages.is_empty() {
        println!("   No students on the roster.");
    }

    for page in pages {
        println!(
            "   📄 {}",
            out_dir.join(ctx.page_file_name(page.number)).display()
        );
        for student in &page.students {
            println!(
                "      {} -> {}",
                student.id,
                github::repo_full_name(
                    &config.github.org,
                    &config.github.repo_template,
                    &ctx.lab,
                    &student.id
                )
            );
        }
    }

    println!("\n✅ Dry run complete. {} pages would be written.", pages.len());
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location
    match Config::load_default() {
        Ok(Some(config)) => {
            info!("Loaded default config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        Ok(None) => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            warn!("Failed to load config: {}", e);
            Ok(Config::default())
        }
    }
}
