//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// scorecdf - merge scattered score files and plot their empirical CDF
///
/// Walks a result tree for files named `score`, merges their `label: value`
/// lines into one combined file and renders the CDF of all scores.
///
/// Examples:
///   scorecdf --source /logs
///   scorecdf --source /logs --combined merged.txt --plot cdf.png --show
///   scorecdf --from-combined --combined merged.txt --plot cdf.png
///   scorecdf --source /logs --archive-dir /logs --notify --label auth -d 5400
///   scorecdf --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Root of the result tree to scan
    #[arg(
        short,
        long,
        value_name = "DIR",
        required_unless_present_any = ["from_combined", "init_config"],
        conflicts_with = "from_combined"
    )]
    pub source: Option<PathBuf>,

    /// Combined scores file (written by the scan, read by the CDF step)
    #[arg(long, value_name = "FILE")]
    pub combined: Option<PathBuf>,

    /// Output image for the CDF plot
    #[arg(short = 'o', long, value_name = "FILE")]
    pub plot: Option<PathBuf>,

    /// Open the plot in an image viewer and wait until it is closed
    #[arg(long)]
    pub show: bool,

    /// Skip the scan and rebuild the plot from an existing combined file
    #[arg(long)]
    pub from_combined: bool,

    /// File name that identifies score files
    #[arg(long, value_name = "NAME")]
    pub sentinel: Option<String>,

    /// Directory names to skip while scanning (comma-separated)
    #[arg(long, value_name = "DIRS", value_delimiter = ',')]
    pub exclude: Option<Vec<String>>,

    /// Write a JSON run summary to this file
    #[arg(long, value_name = "FILE")]
    pub summary: Option<PathBuf>,

    /// Directory to zip after the run
    #[arg(long, value_name = "DIR")]
    pub archive_dir: Option<PathBuf>,

    /// Archive output path
    ///
    /// Defaults to results_<label>.zip, or results.zip without a label.
    #[arg(long, value_name = "FILE")]
    pub archive: Option<PathBuf>,

    /// Email a status report when the run ends
    ///
    /// Relay, sender and recipients come from the [mail] config section.
    #[arg(long)]
    pub notify: bool,

    /// Name of the dataset or job, used in the report and archive name
    #[arg(short = 't', long, value_name = "NAME")]
    pub label: Option<String>,

    /// Number of iterations the batch job ran
    #[arg(short = 'n', long, value_name = "COUNT")]
    pub iterations: Option<u64>,

    /// Duration of the batch job in seconds
    #[arg(short = 'd', long, value_name = "SECS")]
    pub duration: Option<u64>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .scorecdf.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Generate a default .scorecdf.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    ///
    /// The source directory is deliberately not checked here: a missing
    /// root is reported by the pipeline so it reaches the notification step.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.source.is_none() && !self.from_combined {
            return Err("--source is required unless --from-combined is given".to_string());
        }

        if self.source.is_some() && self.from_combined {
            return Err("Cannot use both --source and --from-combined".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref sentinel) = self.sentinel {
            if sentinel.is_empty() {
                return Err("Sentinel file name cannot be empty".to_string());
            }
            if sentinel.contains(['/', '\\']) {
                return Err(format!(
                    "Sentinel must be a file name, not a path: {}",
                    sentinel
                ));
            }
        }

        if let Some(ref label) = self.label {
            if label.is_empty() || label.contains(['/', '\\']) {
                return Err(format!("Invalid label: {:?}", label));
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
