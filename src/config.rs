//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.scorecdf.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name, looked up in the working directory.
pub const CONFIG_FILE: &str = ".scorecdf.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Scanner settings.
    #[serde(default)]
    pub scanner: ScannerConfig,

    /// Plot settings.
    #[serde(default)]
    pub plot: PlotConfig,

    /// Archive settings.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Mail settings.
    #[serde(default)]
    pub mail: MailConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Combined scores file path.
    #[serde(default = "default_combined")]
    pub combined: String,

    /// CDF image path.
    #[serde(default = "default_plot")]
    pub plot: String,

    /// JSON run summary path.
    #[serde(default)]
    pub summary: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            combined: default_combined(),
            plot: default_plot(),
            summary: None,
            verbose: false,
        }
    }
}

fn default_combined() -> String {
    "combined_scores.txt".to_string()
}

fn default_plot() -> String {
    "cdf.png".to_string()
}

/// Tree scanner settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannerConfig {
    /// Exact name of score files.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    /// Directory names to skip.
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Follow symbolic links.
    #[serde(default)]
    pub follow_links: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            excludes: Vec::new(),
            follow_links: false,
        }
    }
}

fn default_sentinel() -> String {
    "score".to_string()
}

/// Plot rendering settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlotConfig {
    /// Image width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,

    /// Image height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,

    /// Marker radius in pixels.
    #[serde(default = "default_marker_size")]
    pub marker_size: u32,

    /// Open the plot in a viewer after saving it.
    #[serde(default)]
    pub show: bool,

    /// Viewer command; must stay open until its window is closed.
    /// Defaults to the platform opener on macOS and Windows only.
    #[serde(default)]
    pub viewer: Option<String>,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            marker_size: default_marker_size(),
            show: false,
            viewer: None,
        }
    }
}

fn default_width() -> u32 {
    640
}

fn default_height() -> u32 {
    480
}

fn default_marker_size() -> u32 {
    2
}

/// Results archive settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory to zip after the run.
    #[serde(default)]
    pub source_dir: Option<String>,

    /// Archive path; `results_<label>.zip` or `results.zip` when unset.
    #[serde(default)]
    pub output: Option<String>,
}

impl ArchiveConfig {
    /// Archive path for a run with the given label.
    pub fn output_path(&self, label: Option<&str>) -> PathBuf {
        match (&self.output, label) {
            (Some(output), _) => PathBuf::from(output),
            (None, Some(label)) => PathBuf::from(format!("results_{}.zip", label)),
            (None, None) => PathBuf::from("results.zip"),
        }
    }
}

/// Notification email settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Send an email after each run.
    #[serde(default)]
    pub enabled: bool,

    /// SMTP relay host.
    #[serde(default = "default_smtp_server")]
    pub smtp_server: String,

    /// SMTP relay port.
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,

    /// Use STARTTLS.
    #[serde(default)]
    pub starttls: bool,

    /// SMTP login name.
    #[serde(default)]
    pub username: Option<String>,

    /// Environment variable holding the SMTP password.
    #[serde(default = "default_password_env")]
    pub password_env: String,

    /// Sender address.
    #[serde(default = "default_from")]
    pub from: String,

    /// Recipient addresses.
    #[serde(default)]
    pub to: Vec<String>,

    /// Subject prefix; status and label are appended.
    #[serde(default = "default_subject")]
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: default_smtp_server(),
            smtp_port: default_smtp_port(),
            starttls: false,
            username: None,
            password_env: default_password_env(),
            from: default_from(),
            to: Vec::new(),
            subject: default_subject(),
        }
    }
}

fn default_smtp_server() -> String {
    "localhost".to_string()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_password_env() -> String {
    "SCORECDF_SMTP_PASSWORD".to_string()
}

fn default_from() -> String {
    "scorecdf@localhost".to_string()
}

fn default_subject() -> String {
    "Score pipeline finished".to_string()
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref combined) = args.combined {
            self.general.combined = combined.display().to_string();
        }
        if let Some(ref plot) = args.plot {
            self.general.plot = plot.display().to_string();
        }
        if let Some(ref summary) = args.summary {
            self.general.summary = Some(summary.display().to_string());
        }

        if let Some(ref sentinel) = args.sentinel {
            self.scanner.sentinel = sentinel.clone();
        }
        if let Some(ref excludes) = args.exclude {
            self.scanner.excludes = excludes.clone();
        }

        if let Some(ref dir) = args.archive_dir {
            self.archive.source_dir = Some(dir.display().to_string());
        }
        if let Some(ref output) = args.archive {
            self.archive.output = Some(output.display().to_string());
        }

        // Flags always override
        if args.show {
            self.plot.show = true;
        }
        if args.notify {
            self.mail.enabled = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
