//! Data models for the score pipeline.
//!
//! This module contains the core data structures shared by the reader,
//! the tree aggregator, the CDF engine and the run summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// An ordered, write-once sequence of scores.
///
/// Order is discovery order: traversal order of the score files, then line
/// order within each file. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    scores: Vec<f64>,
}

impl Dataset {
    /// Number of scores in the dataset.
    pub fn len(&self) -> usize {
        self.scores.len()
    }

    /// Returns true if no score was collected.
    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Borrow the scores in discovery order.
    pub fn as_slice(&self) -> &[f64] {
        &self.scores
    }

    /// Iterate over the scores in discovery order.
    pub fn iter(&self) -> impl Iterator<Item = &f64> {
        self.scores.iter()
    }
}

impl From<Vec<f64>> for Dataset {
    fn from(scores: Vec<f64>) -> Self {
        Self { scores }
    }
}

/// Kind of a non-fatal problem found while reading score files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// The score file does not exist.
    MissingFile,
    /// The score file exists but could not be read.
    UnreadableFile(String),
    /// The text after the first `:` is not a number.
    UnparsableValue(String),
    /// The value parsed but is NaN or infinite.
    NonFiniteValue(String),
    /// A directory below the source root could not be listed.
    UnreadableDirectory(String),
}

/// A recorded, non-fatal problem with one file or one line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// File (or directory) the problem belongs to.
    pub path: PathBuf,
    /// 1-based line number, when the problem is tied to a line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    /// What went wrong.
    pub kind: DiagnosticKind,
}

impl Diagnostic {
    /// Creates a file-level diagnostic.
    pub fn file(path: &Path, kind: DiagnosticKind) -> Self {
        Self {
            path: path.to_path_buf(),
            line: None,
            kind,
        }
    }

    /// Creates a line-level diagnostic.
    pub fn line(path: &Path, line: usize, kind: DiagnosticKind) -> Self {
        Self {
            path: path.to_path_buf(),
            line: Some(line),
            kind,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.line {
            Some(line) => write!(f, "{}:{}: ", self.path.display(), line)?,
            None => write!(f, "{}: ", self.path.display())?,
        }
        match &self.kind {
            DiagnosticKind::MissingFile => write!(f, "file does not exist"),
            DiagnosticKind::UnreadableFile(reason) => write!(f, "cannot read file: {}", reason),
            DiagnosticKind::UnparsableValue(value) => {
                write!(f, "skipping non-numeric value {:?}", value)
            }
            DiagnosticKind::NonFiniteValue(value) => {
                write!(f, "skipping non-finite value {:?}", value)
            }
            DiagnosticKind::UnreadableDirectory(reason) => {
                write!(f, "cannot list directory: {}", reason)
            }
        }
    }
}

/// Terminal status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Error,
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "SUCCESS"),
            RunStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Headline figures of the distribution, filled on success.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionStats {
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

/// Outcome of one run, handed to the notification and archival steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    /// Success or error.
    pub status: RunStatus,
    /// Human-readable one-line summary.
    pub message: String,
    /// Name of the last pipeline stage reached.
    pub stage: String,
    /// Number of score files that were read.
    pub score_files: usize,
    /// Number of scores in the dataset.
    pub scores: usize,
    /// Number of non-fatal diagnostics.
    pub diagnostics: usize,
    /// CombinedFile written or read by this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub combined_path: Option<PathBuf>,
    /// Image produced by this run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plot_path: Option<PathBuf>,
    /// Distribution figures, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<DistributionStats>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

impl RunSummary {
    /// Returns true if the pipeline reached its final stage.
    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
