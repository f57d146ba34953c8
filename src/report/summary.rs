//! Run summary text and JSON generation.
//!
//! The same text is printed at the end of a run and used as the body of
//! the notification email.

use crate::models::{RunStatus, RunSummary};
use anyhow::{Context, Result};
use std::path::Path;

/// Facts about the batch job that produced the scores.
#[derive(Debug, Clone, Default)]
pub struct JobInfo {
    /// Name of the dataset or job.
    pub label: Option<String>,
    /// Number of iterations the job ran.
    pub iterations: Option<u64>,
    /// Total job duration in seconds.
    pub duration_secs: Option<u64>,
}

/// Split seconds into hours, minutes and seconds.
pub fn seconds_to_hms(seconds: u64) -> (u64, u64, u64) {
    (seconds / 3600, (seconds % 3600) / 60, seconds % 60)
}

/// Format a duration as `1h 02m 03s`.
pub fn format_hms(seconds: u64) -> String {
    let (h, m, s) = seconds_to_hms(seconds);
    format!("{}h {:02}m {:02}s", h, m, s)
}

/// Generate the plain-text status report.
pub fn generate_status_text(summary: &RunSummary, job: &JobInfo) -> String {
    let mut output = String::new();

    output.push_str(&generate_header(summary, job));
    output.push_str(&generate_job_section(job));
    output.push_str(&generate_results_section(summary));

    output
}

fn generate_header(summary: &RunSummary, job: &JobInfo) -> String {
    let mut section = String::new();

    match &job.label {
        Some(label) => {
            section.push_str(&format!("Score pipeline [{}]: {}\n", label, summary.status))
        }
        None => section.push_str(&format!("Score pipeline: {}\n", summary.status)),
    }
    section.push_str(&format!("{}\n\n", summary.message));

    section
}

fn generate_job_section(job: &JobInfo) -> String {
    if job.iterations.is_none() && job.duration_secs.is_none() {
        return String::new();
    }

    let mut section = String::new();

    section.push_str("Job\n");
    if let Some(iterations) = job.iterations {
        section.push_str(&format!("  Iterations: {}\n", iterations));
    }
    if let Some(secs) = job.duration_secs {
        section.push_str(&format!("  Duration:   {}\n", format_hms(secs)));
    }
    section.push('\n');

    section
}

fn generate_results_section(summary: &RunSummary) -> String {
    let mut section = String::new();

    section.push_str("Results\n");
    section.push_str(&format!(
        "  Started:     {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("  Stage:       {}\n", summary.stage));
    section.push_str(&format!("  Score files: {}\n", summary.score_files));
    section.push_str(&format!("  Scores:      {}\n", summary.scores));
    if summary.diagnostics > 0 {
        section.push_str(&format!("  Skipped:     {}\n", summary.diagnostics));
    }
    if let Some(stats) = summary.stats {
        section.push_str(&format!(
            "  Min/Median/Max: {} / {} / {}\n",
            stats.min, stats.median, stats.max
        ));
    }
    if let Some(ref path) = summary.combined_path {
        section.push_str(&format!("  Combined:    {}\n", path.display()));
    }
    if let Some(ref path) = summary.plot_path {
        section.push_str(&format!("  Plot:        {}\n", path.display()));
    }
    section.push_str(&format!("  Elapsed:     {:.1}s\n", summary.duration_seconds));

    section
}

/// Email subject line for a run.
pub fn generate_subject(base: &str, summary: &RunSummary, job: &JobInfo) -> String {
    let status = match summary.status {
        RunStatus::Success => "OK",
        RunStatus::Error => "FAILED",
    };
    match &job.label {
        Some(label) => format!("{} [{}] {}", base, label, status),
        None => format!("{} {}", base, status),
    }
}

/// Generate the JSON summary.
pub fn generate_json_summary(summary: &RunSummary) -> Result<String> {
    serde_json::to_string_pretty(summary).map_err(Into::into)
}

/// Write the JSON summary to a file.
pub fn write_json_summary(summary: &RunSummary, path: &Path) -> Result<()> {
    let content = generate_json_summary(summary)?;
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write summary to {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DistributionStats;
    use chrono::Utc;
    use std::path::PathBuf;

    fn create_test_summary(status: RunStatus) -> RunSummary {
        RunSummary {
            status,
            message: "Rendered CDF of 3 scores".to_string(),
            stage: "done".to_string(),
            score_files: 2,
            scores: 3,
            diagnostics: 1,
            combined_path: Some(PathBuf::from("combined_scores.txt")),
            plot_path: Some(PathBuf::from("cdf.png")),
            stats: Some(DistributionStats {
                min: 2.0,
                median: 4.0,
                max: 4.0,
            }),
            started_at: Utc::now(),
            duration_seconds: 0.4,
        }
    }

    #[test]
    fn test_seconds_to_hms() {
        assert_eq!(seconds_to_hms(0), (0, 0, 0));
        assert_eq!(seconds_to_hms(3723), (1, 2, 3));
        assert_eq!(seconds_to_hms(90061), (25, 1, 1));
        assert_eq!(format_hms(3723), "1h 02m 03s");
    }

    #[test]
    fn test_generate_status_text() {
        let summary = create_test_summary(RunStatus::Success);
        let job = JobInfo {
            label: Some("auth-logs".to_string()),
            iterations: Some(12),
            duration_secs: Some(3723),
        };

        let text = generate_status_text(&summary, &job);

        assert!(text.starts_with("Score pipeline [auth-logs]: SUCCESS"));
        assert!(text.contains("Iterations: 12"));
        assert!(text.contains("1h 02m 03s"));
        assert!(text.contains("Scores:      3"));
        assert!(text.contains("Skipped:     1"));
        assert!(text.contains("cdf.png"));
    }

    #[test]
    fn test_job_section_omitted_without_job_facts() {
        let summary = create_test_summary(RunStatus::Error);
        let text = generate_status_text(&summary, &JobInfo::default());

        assert!(text.starts_with("Score pipeline: ERROR"));
        assert!(!text.contains("Job\n"));
    }

    #[test]
    fn test_generate_subject() {
        let job = JobInfo {
            label: Some("web".to_string()),
            ..JobInfo::default()
        };
        assert_eq!(
            generate_subject("Score pipeline", &create_test_summary(RunStatus::Error), &job),
            "Score pipeline [web] FAILED"
        );
        assert_eq!(
            generate_subject(
                "Done",
                &create_test_summary(RunStatus::Success),
                &JobInfo::default()
            ),
            "Done OK"
        );
    }

    #[test]
    fn test_generate_json_summary() {
        let json = generate_json_summary(&create_test_summary(RunStatus::Success)).unwrap();

        assert!(json.contains("\"status\": \"success\""));
        assert!(json.contains("\"plot_path\""));
        assert!(json.contains("\"median\""));
    }
}
