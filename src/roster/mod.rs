//! Course roster loading, section filtering and pagination.
//!
//! The roster is a CSV export with one row per student. Only two columns
//! matter: the GitHub ID column and (optionally) the lab section column.

use crate::config::RosterConfig;
use crate::models::{Page, Student};
use anyhow::{Context, Result};
use regex::Regex;
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Load the roster CSV at `path`.
pub fn load_roster(path: &Path, config: &RosterConfig) -> Result<Vec<Student>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open roster: {}", path.display()))?;

    read_roster(file, config).with_context(|| format!("Failed to read roster: {}", path.display()))
}

/// Parse roster rows from any reader.
pub fn read_roster<R: Read>(reader: R, config: &RosterConfig) -> Result<Vec<Student>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader.headers().context("Roster has no header row")?.clone();

    let id_index = headers
        .iter()
        .position(|h| h == config.id_column)
        .with_context(|| {
            format!(
                "Roster has no '{}' column (found: {})",
                config.id_column,
                headers.iter().collect::<Vec<_>>().join(", ")
            )
        })?;

    let section_regex = Regex::new(&config.section_pattern)
        .with_context(|| format!("Invalid section pattern: {}", config.section_pattern))?;
    let section_index = headers.iter().position(|h| section_regex.is_match(h));
    match section_index {
        Some(i) => debug!("Using roster column '{}' as section", &headers[i]),
        None => debug!("Roster has no section column"),
    }

    let mut seen = HashSet::new();
    let mut students = Vec::new();

    for (row, record) in csv_reader.records().enumerate() {
        let record = record.with_context(|| format!("Malformed roster row {}", row + 2))?;

        let id = record.get(id_index).unwrap_or("").to_string();
        if id.is_empty() {
            debug!("Skipping roster row {} with no ID", row + 2);
            continue;
        }
        if !is_plain_id(&id) {
            warn!("Skipping roster row {}: '{}' is not a valid ID", row + 2, id);
            continue;
        }
        if !seen.insert(id.clone()) {
            warn!("Duplicate roster entry for {}, keeping the first", id);
            continue;
        }

        let section = section_index
            .and_then(|i| record.get(i))
            .filter(|s| !s.is_empty())
            .map(String::from);

        students.push(Student { id, section });
    }

    Ok(students)
}

/// IDs name files under the output tree, so they must be a single plain
/// path component.
fn is_plain_id(id: &str) -> bool {
    id != "." && id != ".." && !id.contains(['/', '\\', '\0'])
}

/// Keep only the students of `section`; `None` keeps everyone.
pub fn filter_section(students: Vec<Student>, section: Option<&str>) -> Vec<Student> {
    match section {
        None => students,
        Some(wanted) => students
            .into_iter()
            .filter(|s| s.section.as_deref() == Some(wanted))
            .collect(),
    }
}

/// Split the roster into pages of at most `per_page` students.
pub fn paginate(students: &[Student], per_page: usize) -> Vec<Page> {
    let per_page = per_page.max(1);

    students
        .chunks(per_page)
        .enumerate()
        .map(|(number, chunk)| Page {
            number,
            students: chunk.to_vec(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROSTER: &str = "\
name,id0,Lab Section
Alice,alice,L01
Bob,bob,L02
,,L02
Carol,carol,L02
Bobby,bob,L01
Dan,dan,
";

    fn roster() -> Vec<Student> {
        read_roster(ROSTER.as_bytes(), &RosterConfig::default()).unwrap()
    }

    #[test]
    fn test_read_roster_skips_blank_and_duplicate_ids() {
        let students = roster();
        let ids: Vec<&str> = students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "bob", "carol", "dan"]);
        assert_eq!(students[1].section.as_deref(), Some("L02"));
        assert_eq!(students[3].section, None);
    }

    #[test]
    fn test_ids_that_are_not_plain_path_components_are_skipped() {
        let csv = "id0\nalice\n../../etc\nbob/x\n..\nwin\\dows\ncarol\n";
        let students = read_roster(csv.as_bytes(), &RosterConfig::default()).unwrap();
        let ids: Vec<&str> = students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["alice", "carol"]);
    }

    #[test]
    fn test_missing_id_column() {
        let config = RosterConfig {
            id_column: "github".to_string(),
            ..RosterConfig::default()
        };
        let err = read_roster(ROSTER.as_bytes(), &config).unwrap_err();
        assert!(err.to_string().contains("github"));
    }

    #[test]
    fn test_roster_without_section_column() {
        let students = read_roster("id0\nx\ny\n".as_bytes(), &RosterConfig::default()).unwrap();
        assert_eq!(students.len(), 2);
        assert!(students.iter().all(|s| s.section.is_none()));
    }

    #[test]
    fn test_filter_section() {
        let l02 = filter_section(roster(), Some("L02"));
        let ids: Vec<&str> = l02.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["bob", "carol"]);

        assert_eq!(filter_section(roster(), None).len(), 4);
        assert!(filter_section(roster(), Some("L09")).is_empty());
    }

    #[test]
    fn test_paginate() {
        let students: Vec<Student> = (0..7).map(|i| Student::new(format!("s{}", i))).collect();

        let pages = paginate(&students, 3);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].number, 0);
        assert_eq!(pages[2].students.len(), 1);
        assert_eq!(pages[2].students[0].id, "s6");

        // An exact multiple does not produce a trailing empty page.
        assert_eq!(paginate(&students[..6], 3).len(), 2);
        assert!(paginate(&[], 3).is_empty());
    }

    #[test]
    fn test_load_roster_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("classy.csv");
        std::fs::write(&path, ROSTER).unwrap();

        let students = load_roster(&path, &RosterConfig::default()).unwrap();
        assert_eq!(students.len(), 4);

        assert!(load_roster(&dir.path().join("nope.csv"), &RosterConfig::default()).is_err());
    }
}
