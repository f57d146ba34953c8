//! Pipeline driver.
//!
//! Runs aggregation, reload of the combined file, CDF computation and
//! rendering as a state machine:
//!
//! ```text
//! Start -> Aggregate -> LoadCombined -> ComputeCdf -> Render -> Done
//!   \__________\_____________\______________\___________\____-> Error
//! ```
//!
//! `Error` is absorbing. When no source directory is given the run starts
//! from an existing combined file and skips `Aggregate`.

use crate::analysis::{compute_cdf, CdfCurve};
use crate::error::PipelineError;
use crate::models::{Dataset, Diagnostic, RunStatus, RunSummary};
use crate::report::CdfRenderer;
use crate::scanner::{load_combined, merge_scores, ScanConfig};
use chrono::{DateTime, Utc};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, error, warn};

/// Diagnostics beyond this count are summarized instead of logged one by one.
const MAX_LOGGED_DIAGNOSTICS: usize = 20;

/// Name of a pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Start,
    Aggregate,
    LoadCombined,
    ComputeCdf,
    Render,
    Done,
    Error,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Start => "start",
            Stage::Aggregate => "aggregate",
            Stage::LoadCombined => "load_combined",
            Stage::ComputeCdf => "compute_cdf",
            Stage::Render => "render",
            Stage::Done => "done",
            Stage::Error => "error",
        };
        f.write_str(name)
    }
}

/// Inputs and outputs of one run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Tree to scan; `None` reruns from an existing combined file.
    pub source: Option<PathBuf>,
    /// Combined file written by `Aggregate` and read by `LoadCombined`.
    pub combined: PathBuf,
    /// Image written by `Render`.
    pub plot: PathBuf,
    /// Tree scan settings.
    pub scan: ScanConfig,
    /// Show a spinner while scanning.
    pub show_progress: bool,
}

/// A state together with the data it carries forward.
enum State {
    Start,
    Aggregate(PathBuf),
    LoadCombined,
    ComputeCdf(Dataset),
    Render(CdfCurve),
    Done(CdfCurve),
    Error(Stage, PipelineError),
}

impl State {
    fn stage(&self) -> Stage {
        match self {
            State::Start => Stage::Start,
            State::Aggregate(_) => Stage::Aggregate,
            State::LoadCombined => Stage::LoadCombined,
            State::ComputeCdf(_) => Stage::ComputeCdf,
            State::Render(_) => Stage::Render,
            State::Done(_) => Stage::Done,
            State::Error(..) => Stage::Error,
        }
    }
}

/// Artifacts and counts gathered while the states run.
#[derive(Debug, Default)]
struct RunRecord {
    score_files: Vec<PathBuf>,
    diagnostics: Vec<Diagnostic>,
    scores: usize,
    combined_path: Option<PathBuf>,
    plot_path: Option<PathBuf>,
}

/// What a run did, whether it succeeded or not.
#[derive(Debug)]
pub struct PipelineReport {
    /// The curve on success, the fatal error otherwise.
    pub outcome: Result<CdfCurve, PipelineError>,
    /// Stage that failed, if any.
    pub failed_stage: Option<Stage>,
    /// Score files read during `Aggregate`.
    pub score_files: Vec<PathBuf>,
    /// Non-fatal problems met during `Aggregate`.
    pub diagnostics: Vec<Diagnostic>,
    /// Size of the dataset loaded from the combined file.
    pub scores: usize,
    /// Combined file written or read by this run.
    pub combined_path: Option<PathBuf>,
    /// Image written by this run.
    pub plot_path: Option<PathBuf>,
}

impl PipelineReport {
    /// Final state: `Done` or `Error`.
    pub fn final_stage(&self) -> Stage {
        if self.outcome.is_ok() {
            Stage::Done
        } else {
            Stage::Error
        }
    }

    /// Build the summary handed to the notification step.
    pub fn to_summary(&self, started_at: DateTime<Utc>, duration_seconds: f64) -> RunSummary {
        let (status, message, stats) = match &self.outcome {
            Ok(curve) => (
                RunStatus::Success,
                format!("Rendered CDF of {} scores", curve.len()),
                Some(curve.stats()),
            ),
            Err(e) => {
                let stage = self.failed_stage.unwrap_or(Stage::Error);
                (RunStatus::Error, format!("Failed at {}: {}", stage, e), None)
            }
        };

        RunSummary {
            status,
            message,
            stage: self.failed_stage.unwrap_or_else(|| self.final_stage()).to_string(),
            score_files: self.score_files.len(),
            scores: self.scores,
            diagnostics: self.diagnostics.len(),
            combined_path: self.combined_path.clone(),
            plot_path: self.plot_path.clone(),
            stats,
            started_at,
            duration_seconds,
        }
    }
}

/// Drives one run through the pipeline states.
pub struct Pipeline<'a, R: CdfRenderer> {
    config: PipelineConfig,
    renderer: &'a R,
}

impl<'a, R: CdfRenderer> Pipeline<'a, R> {
    pub fn new(config: PipelineConfig, renderer: &'a R) -> Self {
        Self { config, renderer }
    }

    /// Run to `Done` or `Error`.
    pub fn run(&self) -> PipelineReport {
        let mut record = RunRecord::default();
        let mut state = State::Start;

        let outcome = loop {
            let stage = state.stage();
            debug!("Pipeline stage: {}", stage);

            state = match state {
                State::Done(curve) => break Ok(curve),
                State::Error(failed, e) => {
                    error!("Pipeline failed at {}: {}", failed, e);
                    break Err((failed, e));
                }
                other => match self.step(other, &mut record) {
                    Ok(next) => next,
                    Err(e) => State::Error(stage, e),
                },
            };
        };

        let (outcome, failed_stage) = match outcome {
            Ok(curve) => (Ok(curve), None),
            Err((stage, e)) => (Err(e), Some(stage)),
        };

        PipelineReport {
            outcome,
            failed_stage,
            score_files: record.score_files,
            diagnostics: record.diagnostics,
            scores: record.scores,
            combined_path: record.combined_path,
            plot_path: record.plot_path,
        }
    }

    /// Perform the work of one state and return the next.
    fn step(&self, state: State, record: &mut RunRecord) -> Result<State, PipelineError> {
        match state {
            State::Start => Ok(match self.config.source {
                Some(ref source) => State::Aggregate(source.clone()),
                None => State::LoadCombined,
            }),
            State::Aggregate(source) => {
                let outcome = merge_scores(
                    &source,
                    &self.config.combined,
                    &self.config.scan,
                    self.config.show_progress,
                )?;
                log_diagnostics(&outcome.diagnostics);
                record.score_files = outcome.files;
                record.diagnostics = outcome.diagnostics;
                record.combined_path = Some(self.config.combined.clone());
                Ok(State::LoadCombined)
            }
            State::LoadCombined => {
                let dataset = load_combined(&self.config.combined)?;
                debug!(
                    "Loaded {} scores from {}",
                    dataset.len(),
                    self.config.combined.display()
                );
                record.scores = dataset.len();
                record.combined_path = Some(self.config.combined.clone());
                Ok(State::ComputeCdf(dataset))
            }
            State::ComputeCdf(dataset) => Ok(State::Render(compute_cdf(&dataset)?)),
            State::Render(curve) => {
                self.renderer.render(&curve, &self.config.plot)?;
                record.plot_path = Some(self.config.plot.clone());
                Ok(State::Done(curve))
            }
            State::Done(curve) => Ok(State::Done(curve)),
            State::Error(stage, e) => Ok(State::Error(stage, e)),
        }
    }
}

fn log_diagnostics(diagnostics: &[Diagnostic]) {
    for diag in diagnostics.iter().take(MAX_LOGGED_DIAGNOSTICS) {
        warn!("{}", diag);
    }
    if diagnostics.len() > MAX_LOGGED_DIAGNOSTICS {
        warn!(
            "... and {} more skipped lines or files",
            diagnostics.len() - MAX_LOGGED_DIAGNOSTICS
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Writes a marker file instead of an image and remembers the curves.
    #[derive(Default)]
    struct RecordingRenderer {
        rendered: RefCell<Vec<Vec<f64>>>,
    }

    impl CdfRenderer for RecordingRenderer {
        fn render(&self, curve: &CdfCurve, output: &Path) -> Result<(), PipelineError> {
            fs::write(output, b"plot").map_err(|e| PipelineError::io(output, e))?;
            self.rendered
                .borrow_mut()
                .push(curve.sorted_scores().to_vec());
            Ok(())
        }
    }

    struct FailingRenderer;

    impl CdfRenderer for FailingRenderer {
        fn render(&self, _curve: &CdfCurve, output: &Path) -> Result<(), PipelineError> {
            Err(PipelineError::Render {
                path: output.to_path_buf(),
                message: "backend unavailable".to_string(),
            })
        }
    }

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn make_config(temp: &Path, source: Option<PathBuf>) -> PipelineConfig {
        PipelineConfig {
            source,
            combined: temp.join("combined.txt"),
            plot: temp.join("cdf.png"),
            scan: ScanConfig::default(),
            show_progress: false,
        }
    }

    #[test]
    fn test_full_run_reaches_done() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        write(&root, "dirA/score", "x:2.0\n");
        write(&root, "dirB/sub/score", "y:4.0\ny:4.0\n");

        let renderer = RecordingRenderer::default();
        let config = make_config(temp_dir.path(), Some(root));
        let report = Pipeline::new(config.clone(), &renderer).run();

        assert_eq!(report.final_stage(), Stage::Done);
        let curve = report.outcome.as_ref().unwrap();
        assert_eq!(curve.sorted_scores(), &[2.0, 4.0, 4.0]);
        assert_eq!(*curve.cumulative_probability().last().unwrap(), 1.0);
        assert_eq!(report.score_files.len(), 2);
        assert_eq!(report.scores, 3);
        assert_eq!(renderer.rendered.borrow().len(), 1);
        assert!(config.plot.exists());
        assert_eq!(report.plot_path, Some(config.plot));
    }

    #[test]
    fn test_missing_root_fails_at_aggregate_without_outputs() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = RecordingRenderer::default();
        let config = make_config(temp_dir.path(), Some(temp_dir.path().join("missing")));

        let report = Pipeline::new(config.clone(), &renderer).run();

        assert_eq!(report.final_stage(), Stage::Error);
        assert_eq!(report.failed_stage, Some(Stage::Aggregate));
        assert!(matches!(
            report.outcome,
            Err(PipelineError::MissingRoot { .. })
        ));
        assert!(!config.combined.exists());
        assert!(!config.plot.exists());
    }

    #[test]
    fn test_empty_tree_fails_at_compute_without_image() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        write(&root, "a/notes.txt", "x:1\n");
        write(&root, "b/score", "garbage\nx: nope\n");

        let renderer = RecordingRenderer::default();
        let config = make_config(temp_dir.path(), Some(root));
        let report = Pipeline::new(config.clone(), &renderer).run();

        assert_eq!(report.failed_stage, Some(Stage::ComputeCdf));
        assert!(matches!(report.outcome, Err(PipelineError::EmptyDataset)));
        assert_eq!(report.diagnostics.len(), 1);
        assert!(renderer.rendered.borrow().is_empty());
        assert!(!config.plot.exists());
    }

    #[test]
    fn test_rerun_from_existing_combined_file() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = RecordingRenderer::default();
        let config = make_config(temp_dir.path(), None);
        fs::write(&config.combined, "3.5\n1.5\n").unwrap();

        let report = Pipeline::new(config, &renderer).run();

        assert_eq!(report.final_stage(), Stage::Done);
        assert!(report.score_files.is_empty());
        assert_eq!(renderer.rendered.borrow()[0], vec![1.5, 3.5]);
    }

    #[test]
    fn test_rerun_without_combined_file_fails_at_load() {
        let temp_dir = TempDir::new().unwrap();
        let renderer = RecordingRenderer::default();
        let config = make_config(temp_dir.path(), None);

        let report = Pipeline::new(config, &renderer).run();

        assert_eq!(report.failed_stage, Some(Stage::LoadCombined));
        assert!(matches!(report.outcome, Err(PipelineError::Io { .. })));
    }

    #[test]
    fn test_render_failure_is_terminal() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        write(&root, "score", "a:1\n");

        let config = make_config(temp_dir.path(), Some(root));
        let report = Pipeline::new(config, &FailingRenderer).run();

        assert_eq!(report.failed_stage, Some(Stage::Render));
        assert!(report.plot_path.is_none());
        assert!(matches!(report.outcome, Err(PipelineError::Render { .. })));
    }

    #[test]
    fn test_summary_reflects_outcome() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("runs");
        write(&root, "a/score", "k:5\nk:1\nk:3\n");

        let renderer = RecordingRenderer::default();
        let report = Pipeline::new(make_config(temp_dir.path(), Some(root)), &renderer).run();
        let summary = report.to_summary(Utc::now(), 0.1);

        assert_eq!(summary.status, RunStatus::Success);
        assert_eq!(summary.stage, "done");
        assert_eq!(summary.scores, 3);
        assert_eq!(summary.stats.unwrap().median, 3.0);

        let missing = make_config(temp_dir.path(), Some(temp_dir.path().join("x")));
        let summary = Pipeline::new(missing, &renderer)
            .run()
            .to_summary(Utc::now(), 0.1);
        assert_eq!(summary.status, RunStatus::Error);
        assert_eq!(summary.stage, "aggregate");
        assert!(summary.message.starts_with("Failed at aggregate"));
    }
}
