//! scorecdf - merge scattered score files and plot their empirical CDF
//!
//! Scans a result tree for `score` files, writes the merged scores to a
//! combined file, renders the empirical CDF, then optionally zips a results
//! directory and emails a status report.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Any fatal error (bad arguments or config, missing source
//!       directory, no valid scores, I/O, archive or mail failure)

mod analysis;
mod cli;
mod config;
mod error;
mod models;
mod notify;
mod pipeline;
mod report;
mod scanner;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::Config;
use models::RunSummary;
use pipeline::{Pipeline, PipelineConfig};
use report::{JobInfo, PlotOptions, PlotRenderer};
use scanner::ScanConfig;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config decides the default verbosity, so it is read before logging starts
    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    init_logging(&args, &config);

    info!("scorecdf v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args, config).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .scorecdf.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(config::CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  .scorecdf.toml already exists. Remove it first or edit it manually.");
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).context("Failed to write .scorecdf.toml")?;

    println!("✅ Created .scorecdf.toml with default settings.");
    println!("   Edit it to set the sentinel name, plot size and mail relay.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let level = if config.general.verbose && !args.quiet {
        tracing::Level::DEBUG
    } else {
        args.log_level()
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = match args.config {
        Some(ref path) => Config::load(path)?,
        None => Config::load_default()?.unwrap_or_default(),
    };
    config.merge_with_args(args);
    PlotOptions::from(&config.plot).validate()?;
    Ok(config)
}

/// Run the pipeline and the post-run steps. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let started_at = Utc::now();
    let start_time = Instant::now();

    let pipeline_config = PipelineConfig {
        source: args.source.clone(),
        combined: PathBuf::from(&config.general.combined),
        plot: PathBuf::from(&config.general.plot),
        scan: ScanConfig::from(&config.scanner),
        show_progress: !args.quiet,
    };

    match pipeline_config.source {
        Some(ref source) => println!(
            "📂 Scanning {} for '{}' files",
            source.display(),
            config.scanner.sentinel
        ),
        None => println!("📄 Rebuilding from {}", pipeline_config.combined.display()),
    }

    let renderer = PlotRenderer::new(PlotOptions::from(&config.plot));
    let report = Pipeline::new(pipeline_config, &renderer).run();
    let summary = report.to_summary(started_at, start_time.elapsed().as_secs_f64());

    let mut exit_code = if summary.is_success() { 0 } else { 1 };

    let job = JobInfo {
        label: args.label.clone(),
        iterations: args.iterations,
        duration_secs: args.duration,
    };

    // Archiving runs whatever the pipeline outcome
    let archive_path = match config.archive.source_dir {
        Some(ref dir) => {
            let output = config.archive.output_path(job.label.as_deref());
            match notify::zip_directory(Path::new(dir), &output) {
                Ok(result) => {
                    println!(
                        "🗜️  Archived {} files into {} ({} bytes)",
                        result.files,
                        result.path.display(),
                        result.size
                    );
                    Some(result.path)
                }
                Err(e) => {
                    error!("Archiving failed: {:#}", e);
                    exit_code = 1;
                    None
                }
            }
        }
        None => None,
    };

    if config.mail.enabled {
        let sent = send_notification(&config, &summary, &job, archive_path.as_deref()).await;
        if let Err(e) = sent {
            error!("Notification failed: {:#}", e);
            exit_code = 1;
        } else {
            println!("📧 Status email sent");
        }
    }

    if !args.quiet {
        println!("\n{}", report::generate_status_text(&summary, &job));
    }

    if summary.is_success() {
        println!("✅ {}", summary.message);
    } else {
        eprintln!("❌ {}", summary.message);
    }

    if let Some(ref path) = config.general.summary {
        report::write_json_summary(&summary, Path::new(path))?;
        debug!("Run summary written to {}", path);
    }

    Ok(exit_code)
}

/// Email the status report, attaching the archive when there is one.
async fn send_notification(
    config: &Config,
    summary: &RunSummary,
    job: &JobInfo,
    attachment: Option<&Path>,
) -> Result<()> {
    let settings = notify::MailSettings::from_config(&config.mail);
    let subject = report::generate_subject(&config.mail.subject, summary, job);
    let body = report::generate_status_text(summary, job);

    let message = notify::build_message(&settings, &subject, &body, attachment)?;
    notify::send_email(&settings, message).await
}
