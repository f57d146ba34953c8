//! Fatal pipeline errors.
//!
//! Per-file and per-line problems are not errors; they are recorded as
//! [`Diagnostic`](crate::models::Diagnostic)s and the run continues.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// A condition that terminates a pipeline run.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The source directory does not exist.
    #[error("source directory does not exist: {}", path.display())]
    MissingRoot { path: PathBuf },

    /// The source directory exists but cannot be listed.
    #[error("cannot read source directory {}: {source}", path.display())]
    UnreadableRoot {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// No valid score was found anywhere.
    #[error("no data: no valid scores were found")]
    EmptyDataset,

    /// Reading or writing an output artifact failed.
    #[error("I/O failure on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A line of the combined file is not a number.
    #[error("invalid value {value:?} at {}:{line}", path.display())]
    InvalidCombined {
        path: PathBuf,
        line: usize,
        value: String,
    },

    /// The plotting backend failed.
    #[error("failed to render {}: {message}", path.display())]
    Render { path: PathBuf, message: String },
}

impl PipelineError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
