//! Jupyter notebook model (nbformat 4) and exercise extraction.

pub mod extract;

pub use extract::ExerciseLocator;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Failure to read a notebook document.
#[derive(Debug, Error)]
pub enum NotebookError {
    #[error("not a valid notebook: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unsupported notebook format v{0} (need v4)")]
    UnsupportedVersion(u32),
}

/// A parsed notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notebook {
    pub cells: Vec<Cell>,
    #[serde(default)]
    pub metadata: Value,
    #[serde(default = "default_nbformat")]
    pub nbformat: u32,
}

fn default_nbformat() -> u32 {
    4
}

impl Notebook {
    /// Parse notebook JSON.
    pub fn parse(content: &str) -> Result<Self, NotebookError> {
        // Older formats keep cells under "worksheets"; report the version instead of a field error.
        let raw: Value = serde_json::from_str(content)?;
        if let Some(version) = raw.get("nbformat").and_then(Value::as_u64) {
            if version < 4 {
                return Err(NotebookError::UnsupportedVersion(version as u32));
            }
        }
        Ok(serde_json::from_value(raw)?)
    }

    /// Kernel language, used as the highlighting class of code cells.
    pub fn language(&self) -> &str {
        self.metadata
            .pointer("/language_info/name")
            .or_else(|| self.metadata.pointer("/kernelspec/language"))
            .and_then(Value::as_str)
            .unwrap_or("python")
    }
}

/// Kind of a notebook cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Markdown,
    Code,
    Raw,
    #[serde(other)]
    Unknown,
}

/// One cell of a notebook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cell {
    pub cell_type: CellType,
    #[serde(default)]
    pub source: MultilineText,
    #[serde(default)]
    pub execution_count: Option<u32>,
    #[serde(default)]
    pub outputs: Vec<Output>,
}

impl Cell {
    /// The cell source as a single string.
    pub fn source_text(&self) -> String {
        self.source.text()
    }

    pub fn is_markdown(&self) -> bool {
        self.cell_type == CellType::Markdown
    }
}

/// Text stored either as one string or as a list of lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultilineText {
    Single(String),
    Lines(Vec<String>),
}

impl Default for MultilineText {
    fn default() -> Self {
        MultilineText::Single(String::new())
    }
}

impl MultilineText {
    pub fn text(&self) -> String {
        match self {
            MultilineText::Single(s) => s.clone(),
            MultilineText::Lines(lines) => lines.concat(),
        }
    }
}

/// MIME type to payload.
pub type MimeBundle = BTreeMap<String, Value>;

/// Read a MIME payload as text (strings and line lists are joined).
pub fn mime_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    }
}

/// Output of a code cell.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "output_type", rename_all = "snake_case")]
pub enum Output {
    Stream {
        #[serde(default)]
        name: String,
        #[serde(default)]
        text: MultilineText,
    },
    ExecuteResult {
        #[serde(default)]
        data: MimeBundle,
        #[serde(default)]
        execution_count: Option<u32>,
    },
    DisplayData {
        #[serde(default)]
        data: MimeBundle,
    },
    Error {
        #[serde(default)]
        ename: String,
        #[serde(default)]
        evalue: String,
        #[serde(default)]
        traceback: Vec<String>,
    },
    #[serde(other)]
    Unknown,
}
