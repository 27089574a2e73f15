//! Compressed on-disk copies of fetched notebooks.
//!
//! Each submission is stored as gzip-compressed JSON under `raw/` in the
//! lab output directory, so a later run can re-render pages with
//! `--from-raw` without touching the network.

use crate::models::{Student, Submission};
use anyhow::{Context, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const RAW_DIR: &str = "raw";
const EXTENSION: &str = "json.gz";

/// Directory holding the raw submissions of a lab.
pub fn raw_dir(lab_dir: &Path) -> PathBuf {
    lab_dir.join(RAW_DIR)
}

/// Archive path of one student.
pub fn raw_path(lab_dir: &Path, student: &str) -> PathBuf {
    raw_dir(lab_dir).join(format!("{}.{}", student, EXTENSION))
}

/// Write every submission to `raw/{student}.json.gz`.
pub fn save_raw(lab_dir: &Path, submissions: &[Submission]) -> Result<PathBuf> {
    let dir = raw_dir(lab_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create {}", dir.display()))?;

    for submission in submissions {
        let path = raw_path(lab_dir, &submission.student);
        write_compressed(&path, submission)
            .with_context(|| format!("Failed to save {}", path.display()))?;
        debug!("Saved {}", path.display());
    }

    info!("Saved {} raw submissions to {}", submissions.len(), dir.display());
    Ok(dir)
}

fn write_compressed(path: &Path, submission: &Submission) -> Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::best());
    serde_json::to_writer(&mut encoder, submission)?;
    encoder.finish()?.flush()?;
    Ok(())
}

/// Load the archived submissions of `students`, skipping those with none.
///
/// Returns the submissions in roster order and the students without one.
pub fn load_raw(lab_dir: &Path, students: &[Student]) -> Result<(Vec<Submission>, Vec<Student>)> {
    let dir = raw_dir(lab_dir);
    if !dir.is_dir() {
        anyhow::bail!("No raw submissions found in {}", dir.display());
    }

    let mut submissions = Vec::new();
    let mut missing = Vec::new();

    for student in students {
        let path = raw_path(lab_dir, &student.id);
        if !path.is_file() {
            warn!("No raw submission for {}", student.id);
            missing.push(student.clone());
            continue;
        }

        let submission = read_compressed(&path)
            .with_context(|| format!("Failed to load {}", path.display()))?;
        submissions.push(submission);
    }

    info!("Loaded {} raw submissions from {}", submissions.len(), dir.display());
    Ok((submissions, missing))
}

fn read_compressed(path: &Path) -> Result<Submission> {
    let file = File::open(path)?;
    let decoder = GzDecoder::new(BufReader::new(file));
    Ok(serde_json::from_reader(decoder)?)
}
