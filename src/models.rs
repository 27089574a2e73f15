//! Data models for transposed marking.
//!
//! This module contains the core data structures passed between the
//! roster, fetch, notebook and report stages.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A student on the course roster.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Student {
    /// Source-control identifier (GitHub ID).
    pub id: String,
    /// Lab section, when the roster has a section column.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
}

impl Student {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            section: None,
        }
    }
}

impl fmt::Display for Student {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

/// The notebook fetched for one student.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// ID of the student the notebook belongs to.
    pub student: String,
    /// File name inside the student's repository.
    pub file_name: String,
    /// When the notebook was downloaded.
    pub fetched_at: DateTime<Utc>,
    /// Raw notebook JSON.
    pub content: String,
}

/// Course and lab the run is about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabRef {
    pub course: String,
    pub lab: String,
}

impl LabRef {
    pub fn new(course: impl Into<String>, lab: impl Into<String>) -> Self {
        Self {
            course: course.into(),
            lab: lab.into(),
        }
    }
}

impl fmt::Display for LabRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DSCI {} Lab {}", self.course, self.lab)
    }
}

/// The exercises to extract, in the order they are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExerciseSelection {
    numbers: Vec<u32>,
}

impl ExerciseSelection {
    /// Build a selection, dropping repeated numbers. Returns `None` when empty.
    pub fn new(numbers: &[u32]) -> Option<Self> {
        let mut unique = Vec::with_capacity(numbers.len());
        for &n in numbers {
            if !unique.contains(&n) {
                unique.push(n);
            }
        }

        if unique.is_empty() {
            None
        } else {
            Some(Self { numbers: unique })
        }
    }

    pub fn numbers(&self) -> &[u32] {
        &self.numbers
    }

    /// Label used in output file names: `[3, 4]` becomes `"34"`.
    pub fn label(&self) -> String {
        self.numbers.iter().map(|n| n.to_string()).collect()
    }
}

impl fmt::Display for ExerciseSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list: Vec<String> = self.numbers.iter().map(|n| n.to_string()).collect();
        if list.len() == 1 {
            write!(f, "Exercise {}", list[0])
        } else {
            write!(f, "Exercises {}", list.join(", "))
        }
    }
}

/// One output page: a slice of the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Zero-based page number.
    pub number: usize,
    /// Students on this page, in roster order.
    pub students: Vec<Student>,
}

impl Page {
    /// Human readable range of student IDs on the page.
    pub fn span(&self) -> String {
        match (self.students.first(), self.students.last()) {
            (Some(first), Some(last)) if first.id != last.id => {
                format!("{} \u{2013} {}", first.id, last.id)
            }
            (Some(first), _) => first.id.clone(),
            _ => String::new(),
        }
    }
}

/// Counters printed at the end of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub students: usize,
    pub fetched: usize,
    pub missing: Vec<String>,
    pub pages: usize,
}
