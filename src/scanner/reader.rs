//! Reading `label: value` score files.

use crate::models::{Diagnostic, DiagnosticKind};
use std::fs;
use std::io;
use std::path::Path;

/// Scores parsed from one file, plus whatever went wrong along the way.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreRead {
    /// Parsed scores in line order.
    pub scores: Vec<f64>,
    /// Lines (or the whole file) that were skipped.
    pub diagnostics: Vec<Diagnostic>,
}

/// Read one score file.
///
/// Never fails: a missing or unreadable file yields no scores and a
/// diagnostic, so callers treat "no file" and "no valid scores" the same.
/// Invalid UTF-8 is replaced, which only spoils the lines it appears on.
pub fn read_scores(path: &Path) -> ScoreRead {
    match fs::read(path) {
        Ok(bytes) => parse_scores(&String::from_utf8_lossy(&bytes), path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => ScoreRead {
            scores: Vec::new(),
            diagnostics: vec![Diagnostic::file(path, DiagnosticKind::MissingFile)],
        },
        Err(e) => ScoreRead {
            scores: Vec::new(),
            diagnostics: vec![Diagnostic::file(
                path,
                DiagnosticKind::UnreadableFile(e.to_string()),
            )],
        },
    }
}

/// Parse score lines. `source` is only used to label diagnostics.
pub fn parse_scores(content: &str, source: &Path) -> ScoreRead {
    let mut read = ScoreRead::default();

    for (index, line) in content.lines().enumerate() {
        // Lines without a label separator are not score lines
        let Some((_, raw)) = line.split_once(':') else {
            continue;
        };
        let value = raw.trim();

        match value.parse::<f64>() {
            Ok(score) if score.is_finite() => read.scores.push(score),
            Ok(_) => read.diagnostics.push(Diagnostic::line(
                source,
                index + 1,
                DiagnosticKind::NonFiniteValue(value.to_string()),
            )),
            Err(_) => read.diagnostics.push(Diagnostic::line(
                source,
                index + 1,
                DiagnosticKind::UnparsableValue(value.to_string()),
            )),
        }
    }

    read
}
