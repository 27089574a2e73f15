//! Locating the cells of an exercise inside a notebook.
//!
//! An exercise starts at the first markdown cell whose text matches the
//! exercise heading for `n` and ends (exclusive) at the first later markdown
//! cell matching the heading for `n + 1`. The last exercise runs to the end
//! of the notebook.

use crate::models::ExerciseSelection;
use crate::notebook::{Cell, Notebook};
use regex::Regex;
use std::ops::Range;
use thiserror::Error;
use tracing::debug;

/// Why an exercise could not be located.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocateError {
    #[error("invalid exercise heading pattern '{0}'")]
    BadPattern(String),

    #[error("no heading found for exercise {0}")]
    StartNotFound(u32),
}

/// Builds the heading regex of each exercise from a template.
#[derive(Debug, Clone)]
pub struct ExerciseLocator {
    template: String,
}

impl Default for ExerciseLocator {
    fn default() -> Self {
        Self::new(r"#+.*Exercise {n}\b")
    }
}

impl ExerciseLocator {
    /// `template` is a regex where `{n}` stands for the exercise number.
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Check that the template compiles.
    pub fn validate(&self) -> Result<(), LocateError> {
        self.heading(1).map(|_| ())
    }

    fn heading(&self, n: u32) -> Result<Regex, LocateError> {
        let pattern = self.template.replace("{n}", &n.to_string());
        Regex::new(&pattern).map_err(|_| LocateError::BadPattern(pattern))
    }

    /// Cell range of exercise `n`.
    pub fn locate(&self, notebook: &Notebook, n: u32) -> Result<Range<usize>, LocateError> {
        let start_re = self.heading(n)?;
        // No exercise follows u32::MAX; it runs to the end.
        let end_re = n.checked_add(1).map(|next| self.heading(next)).transpose()?;

        let is_heading = |cell: &Cell, re: &Regex| {
            if !cell.is_markdown() {
                return false;
            }
            let text = cell.source_text();
            !text.is_empty() && re.is_match(&text)
        };

        let start = notebook
            .cells
            .iter()
            .position(|c| is_heading(c, &start_re))
            .ok_or(LocateError::StartNotFound(n))?;

        let end = end_re
            .and_then(|re| {
                notebook.cells[start + 1..]
                    .iter()
                    .position(|c| is_heading(c, &re))
            })
            .map(|offset| start + 1 + offset)
            .unwrap_or(notebook.cells.len());

        debug!("Exercise {} spans cells {}..{}", n, start, end);
        Ok(start..end)
    }

    /// Cells of every selected exercise, in selection order.
    pub fn extract(&self, notebook: &Notebook, selection: &ExerciseSelection) -> Extraction {
        let mut extraction = Extraction::default();

        for &n in selection.numbers() {
            match self.locate(notebook, n) {
                Ok(range) => extraction.parts.push(ExercisePart {
                    number: n,
                    cells: notebook.cells[range].to_vec(),
                }),
                Err(e) => {
                    debug!("{}", e);
                    extraction.missing.push(n);
                }
            }
        }

        extraction
    }
}

/// The cells of one exercise.
#[derive(Debug, Clone)]
pub struct ExercisePart {
    pub number: u32,
    pub cells: Vec<Cell>,
}

/// Result of extracting a selection from one notebook.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    pub parts: Vec<ExercisePart>,
    /// Selected exercises with no heading in the notebook.
    pub missing: Vec<u32>,
}
