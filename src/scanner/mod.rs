//! Score file discovery and merging.
//!
//! This module walks a result tree, reads every sentinel-named score file
//! and merges the scores into one [`Dataset`], which is persisted as the
//! combined file.

pub mod reader;

pub use reader::read_scores;

use crate::error::PipelineError;
use crate::models::{Dataset, Diagnostic, DiagnosticKind};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

/// Configuration for tree scanning.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    /// Exact file name of score files.
    pub sentinel: String,
    /// Directory names to prune from the walk.
    pub excludes: Vec<String>,
    /// Follow symbolic links while walking.
    pub follow_links: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            sentinel: "score".to_string(),
            excludes: Vec::new(),
            follow_links: false,
        }
    }
}

impl From<&crate::config::ScannerConfig> for ScanConfig {
    fn from(config: &crate::config::ScannerConfig) -> Self {
        Self {
            sentinel: config.sentinel.clone(),
            excludes: config.excludes.clone(),
            follow_links: config.follow_links,
        }
    }
}

/// Score files found under a root, in traversal order.
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub files: Vec<PathBuf>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Result of merging a tree into one dataset.
#[derive(Debug, Clone, Default)]
pub struct MergeOutcome {
    /// All scores, in traversal order then line order.
    pub dataset: Dataset,
    /// Score files that were read, in traversal order.
    pub files: Vec<PathBuf>,
    /// Non-fatal problems from the walk and from every file.
    pub diagnostics: Vec<Diagnostic>,
}

/// Walks a result tree looking for score files.
///
/// Entries of each directory are visited in lexical file-name order, depth
/// first, so an unchanged tree always yields the same file sequence.
pub struct ScoreScanner {
    config: ScanConfig,
    root: PathBuf,
    show_progress: bool,
}

impl ScoreScanner {
    /// Create a new scanner rooted at `root`.
    pub fn new(root: PathBuf, config: ScanConfig) -> Self {
        Self {
            config,
            root,
            show_progress: false,
        }
    }

    /// Show a spinner while walking.
    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Find all score files under the root.
    pub fn scan(&self) -> Result<ScanResult, PipelineError> {
        self.check_root()?;

        let spinner = self.spinner();
        let mut result = ScanResult::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(self.config.follow_links)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !self.is_excluded(entry));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) if e.depth() == 0 => {
                    return Err(PipelineError::UnreadableRoot {
                        path: self.root.clone(),
                        source: e.into_io_error().unwrap_or_else(|| {
                            io::Error::new(io::ErrorKind::Other, "filesystem loop at root")
                        }),
                    });
                }
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_default();
                    debug!("Cannot read {}: {}", path.display(), e);
                    result.diagnostics.push(Diagnostic::file(
                        &path,
                        DiagnosticKind::UnreadableDirectory(e.to_string()),
                    ));
                    continue;
                }
            };

            if self.matches(&entry) {
                if let Some(ref pb) = spinner {
                    pb.set_message(format!("{} score files", result.files.len() + 1));
                }
                result.files.push(entry.into_path());
            }
        }

        if let Some(pb) = spinner {
            pb.finish_and_clear();
        }

        debug!(
            "Found {} score files under {}",
            result.files.len(),
            self.root.display()
        );
        Ok(result)
    }

    /// Scan the tree and read every score file.
    pub fn collect(&self) -> Result<MergeOutcome, PipelineError> {
        let scan = self.scan()?;
        let mut scores = Vec::new();
        let mut diagnostics = scan.diagnostics;

        for file in &scan.files {
            let read = read_scores(file);
            debug!("{}: {} scores", file.display(), read.scores.len());
            scores.extend(read.scores);
            diagnostics.extend(read.diagnostics);
        }

        Ok(MergeOutcome {
            dataset: Dataset::from(scores),
            files: scan.files,
            diagnostics,
        })
    }

    /// Check if a walk entry is a score file.
    fn matches(&self, entry: &DirEntry) -> bool {
        entry.file_type().is_file()
            && entry.file_name().to_str() == Some(self.config.sentinel.as_str())
    }

    /// Check if a directory below the root is pruned.
    fn is_excluded(&self, entry: &DirEntry) -> bool {
        if entry.depth() == 0 || !entry.file_type().is_dir() {
            return false;
        }
        entry
            .file_name()
            .to_str()
            .is_some_and(|name| self.config.excludes.iter().any(|pattern| name == pattern))
    }

    /// The root must exist and be a listable directory.
    fn check_root(&self) -> Result<(), PipelineError> {
        let metadata = match fs::metadata(&self.root) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PipelineError::MissingRoot {
                    path: self.root.clone(),
                });
            }
            Err(e) => {
                return Err(PipelineError::UnreadableRoot {
                    path: self.root.clone(),
                    source: e,
                });
            }
        };

        if !metadata.is_dir() {
            return Err(PipelineError::UnreadableRoot {
                path: self.root.clone(),
                source: io::Error::new(io::ErrorKind::Other, "not a directory"),
            });
        }

        fs::read_dir(&self.root)
            .map(|_| ())
            .map_err(|e| PipelineError::UnreadableRoot {
                path: self.root.clone(),
                source: e,
            })
    }

    fn spinner(&self) -> Option<ProgressBar> {
        if !self.show_progress {
            return None;
        }
        let pb = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(format!("Scanning {}", self.root.display()));
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    }
}

/// Merge every score file under `source_root` and write the combined file.
///
/// The combined file is only written once the whole tree has been read, so
/// a fatal walk error leaves nothing behind.
pub fn merge_scores(
    source_root: &Path,
    output_file: &Path,
    config: &ScanConfig,
    show_progress: bool,
) -> Result<MergeOutcome, PipelineError> {
    let outcome = ScoreScanner::new(source_root.to_path_buf(), config.clone())
        .with_progress(show_progress)
        .collect()?;

    write_combined(&outcome.dataset, output_file)?;
    info!(
        "Merged {} scores from {} files into {}",
        outcome.dataset.len(),
        outcome.files.len(),
        output_file.display()
    );

    Ok(outcome)
}

/// Write a dataset to `path`, one score per line, replacing any content.
pub fn write_combined(dataset: &Dataset, path: &Path) -> Result<(), PipelineError> {
    let file = File::create(path).map_err(|e| PipelineError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    for score in dataset.iter() {
        // Debug formatting is the shortest text that parses back to the same bits
        writeln!(writer, "{:?}", score).map_err(|e| PipelineError::io(path, e))?;
    }

    writer.flush().map_err(|e| PipelineError::io(path, e))
}

/// Read a combined file back into a dataset.
///
/// Unlike score files, the combined file is this tool's own artifact: a
/// missing file or a malformed line is fatal. Blank lines are ignored.
pub fn load_combined(path: &Path) -> Result<Dataset, PipelineError> {
    let content = fs::read_to_string(path).map_err(|e| PipelineError::io(path, e))?;
    let mut scores = Vec::new();

    for (index, line) in content.lines().enumerate() {
        let value = line.trim();
        if value.is_empty() {
            continue;
        }
        match value.parse::<f64>() {
            Ok(score) if score.is_finite() => scores.push(score),
            _ => {
                return Err(PipelineError::InvalidCombined {
                    path: path.to_path_buf(),
                    line: index + 1,
                    value: value.to_string(),
                });
            }
        }
    }

    Ok(Dataset::from(scores))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn sorted(values: &[f64]) -> Vec<f64> {
        let mut v = values.to_vec();
        v.sort_by(f64::total_cmp);
        v
    }

    #[test]
    fn test_merge_nested_tree() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        write(&root, "dirA/score", "x:2.0\n");
        write(&root, "dirB/sub/score", "y:4.0\ny:4.0\n");
        let combined = temp_dir.path().join("combined.txt");

        let outcome = merge_scores(&root, &combined, &ScanConfig::default(), false).unwrap();

        assert_eq!(outcome.dataset.len(), 3);
        assert_eq!(sorted(outcome.dataset.as_slice()), vec![2.0, 4.0, 4.0]);
        assert_eq!(outcome.files.len(), 2);
        assert!(combined.exists());
    }

    #[test]
    fn test_traversal_is_lexical() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "b/score", "k:2\n");
        write(root, "a/deep/er/score", "k:1\n");
        write(root, "score", "k:4\n");
        write(root, "c/score", "k:3\n");

        let scanner = ScoreScanner::new(root.to_path_buf(), ScanConfig::default());
        let outcome = scanner.collect().unwrap();

        // "a" < "b" < "c" < "score" at the top level
        assert_eq!(outcome.dataset.as_slice(), &[1.0, 2.0, 3.0, 4.0]);
        let rel: Vec<_> = outcome
            .files
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_path_buf())
            .collect();
        assert_eq!(
            rel,
            vec![
                PathBuf::from("a/deep/er/score"),
                PathBuf::from("b/score"),
                PathBuf::from("c/score"),
                PathBuf::from("score"),
            ]
        );
    }

    #[test]
    fn test_only_exact_sentinel_names_match() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/score", "k:1\n");
        write(root, "a/score.txt", "k:100\n");
        write(root, "a/scores", "k:100\n");
        write(root, "a/old_score", "k:100\n");
        fs::create_dir_all(root.join("b/score")).unwrap();

        let outcome = ScoreScanner::new(root.to_path_buf(), ScanConfig::default())
            .collect()
            .unwrap();

        assert_eq!(outcome.dataset.as_slice(), &[1.0]);
    }

    #[test]
    fn test_custom_sentinel_and_excludes() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/result", "k:1\n");
        write(root, "tmp/result", "k:9\n");
        write(root, "a/score", "k:5\n");

        let config = ScanConfig {
            sentinel: "result".to_string(),
            excludes: vec!["tmp".to_string()],
            follow_links: false,
        };
        let outcome = ScoreScanner::new(root.to_path_buf(), config)
            .collect()
            .unwrap();

        assert_eq!(outcome.dataset.as_slice(), &[1.0]);
    }

    #[test]
    fn test_counts_add_up_and_diagnostics_collected() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "r1/score", "a:1\nb:2\nc:3\n");
        write(root, "r2/score", "a:4\nb:oops\n");
        write(root, "r3/score", "");

        let outcome = ScoreScanner::new(root.to_path_buf(), ScanConfig::default())
            .collect()
            .unwrap();

        assert_eq!(outcome.dataset.len(), 4);
        assert_eq!(outcome.files.len(), 3);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert!(outcome.diagnostics[0].path.ends_with("r2/score"));
    }

    #[cfg(unix)]
    #[test]
    fn test_unreadable_subdirectory_becomes_diagnostic() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path();
        write(root, "a/score", "k:1\n");
        write(root, "locked/score", "k:2\n");
        write(root, "z/score", "k:3\n");

        let locked = root.join("locked");
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
        // Permission bits do not stop root
        let still_readable = fs::read_dir(&locked).is_ok();

        let outcome = ScoreScanner::new(root.to_path_buf(), ScanConfig::default()).collect();
        fs::set_permissions(&locked, fs::Permissions::from_mode(0o755)).unwrap();
        if still_readable {
            return;
        }

        let outcome = outcome.unwrap();
        assert_eq!(outcome.dataset.as_slice(), &[1.0, 3.0]);
        assert_eq!(outcome.files.len(), 2);
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].path, locked);
        assert!(matches!(
            outcome.diagnostics[0].kind,
            DiagnosticKind::UnreadableDirectory(_)
        ));
    }

    #[test]
    fn test_missing_root_is_fatal_and_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let combined = temp_dir.path().join("combined.txt");

        let err = merge_scores(
            &temp_dir.path().join("nope"),
            &combined,
            &ScanConfig::default(),
            false,
        )
        .unwrap_err();

        assert!(matches!(err, PipelineError::MissingRoot { .. }));
        assert!(!combined.exists());
    }

    #[test]
    fn test_file_as_root_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("score");
        fs::write(&file, "a:1\n").unwrap();

        let err = ScoreScanner::new(file, ScanConfig::default())
            .scan()
            .unwrap_err();
        assert!(matches!(err, PipelineError::UnreadableRoot { .. }));
    }

    #[test]
    fn test_empty_tree_yields_empty_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        fs::create_dir_all(root.join("a/b")).unwrap();
        let combined = temp_dir.path().join("combined.txt");

        let outcome = merge_scores(&root, &combined, &ScanConfig::default(), false).unwrap();

        assert!(outcome.dataset.is_empty());
        assert_eq!(fs::read_to_string(&combined).unwrap(), "");
    }

    #[test]
    fn test_combined_file_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("combined.txt");
        let dataset = Dataset::from(vec![0.1, -3.0, 1e300, 2.5e-12, 0.1 + 0.2, 4.0, 4.0]);

        write_combined(&dataset, &path).unwrap();
        let loaded = load_combined(&path).unwrap();

        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_write_combined_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("combined.txt");
        fs::write(&path, "1.0\n2.0\n3.0\n4.0\n").unwrap();

        write_combined(&Dataset::from(vec![9.5]), &path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "9.5\n");
    }

    #[test]
    fn test_load_combined_rejects_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("combined.txt");
        fs::write(&path, "1.0\n\nabc\n").unwrap();

        let err = load_combined(&path).unwrap_err();
        match err {
            PipelineError::InvalidCombined { line, value, .. } => {
                assert_eq!(line, 3);
                assert_eq!(value, "abc");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_load_missing_combined_is_io_error() {
        let temp_dir = TempDir::new().unwrap();
        let err = load_combined(&temp_dir.path().join("missing.txt")).unwrap_err();
        assert!(matches!(err, PipelineError::Io { .. }));
    }
}
