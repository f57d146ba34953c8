//! CDF plot rendering.
//!
//! This module draws the empirical CDF as an unconnected scatter plot and
//! saves it as a bitmap image.

use crate::analysis::CdfCurve;
use crate::error::PipelineError;
use anyhow::{bail, Result};
use plotters::prelude::*;
use std::path::Path;
use std::process::Command;
use tracing::{debug, info, warn};

const TITLE: &str = "CDF of Scores";
const X_LABEL: &str = "Score";
const Y_LABEL: &str = "CDF";

/// Anything that can turn a CDF curve into an artifact on disk.
pub trait CdfRenderer {
    /// Render `curve` to `output`, replacing an existing file.
    fn render(&self, curve: &CdfCurve, output: &Path) -> Result<(), PipelineError>;
}

/// Options for the bitmap renderer.
#[derive(Debug, Clone)]
pub struct PlotOptions {
    /// Image width in pixels.
    pub width: u32,
    /// Image height in pixels.
    pub height: u32,
    /// Marker radius in pixels.
    pub marker_size: u32,
    /// Open the image in a viewer and wait for it to close.
    pub show: bool,
    /// Viewer command. Defaults to the platform opener on macOS and
    /// Windows and is required elsewhere.
    pub viewer: Option<String>,
}

impl PlotOptions {
    /// Check that `show` can be honoured, which needs a viewer the run can
    /// wait on. Only the macOS and Windows openers can be told to wait.
    pub fn validate(&self) -> Result<()> {
        let has_viewer = self
            .viewer
            .as_deref()
            .is_some_and(|viewer| !viewer.trim().is_empty());
        if self.show && !has_viewer && !cfg!(any(target_os = "macos", target_os = "windows")) {
            bail!(
                "Showing the plot needs plot.viewer set to a viewer that stays open \
                 until its window is closed (for example \"feh\" or \"eog\")"
            );
        }
        Ok(())
    }
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            marker_size: 2,
            show: false,
            viewer: None,
        }
    }
}

impl From<&crate::config::PlotConfig> for PlotOptions {
    fn from(config: &crate::config::PlotConfig) -> Self {
        Self {
            width: config.width,
            height: config.height,
            marker_size: config.marker_size,
            show: config.show,
            viewer: config.viewer.clone(),
        }
    }
}

/// Renders the CDF to a PNG (or any bitmap format the extension names).
pub struct PlotRenderer {
    options: PlotOptions,
}

impl PlotRenderer {
    pub fn new(options: PlotOptions) -> Self {
        Self { options }
    }
}

impl CdfRenderer for PlotRenderer {
    fn render(&self, curve: &CdfCurve, output: &Path) -> Result<(), PipelineError> {
        draw_cdf(curve, output, &self.options).map_err(|e| PipelineError::Render {
            path: output.to_path_buf(),
            message: e.to_string(),
        })?;
        info!("CDF plot saved to {}", output.display());

        if self.options.show {
            show_image(output, self.options.viewer.as_deref());
        }
        Ok(())
    }
}

/// Draw the chart. The backend lives only inside this function, so it is
/// released whether or not `present` succeeds.
fn draw_cdf(
    curve: &CdfCurve,
    output: &Path,
    options: &PlotOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let (x_min, x_max) = x_range(curve).ok_or("score range is too wide to plot")?;

    let root = BitMapBackend::new(output, (options.width, options.height)).into_drawing_area();
    root.fill(&WHITE)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(TITLE, ("sans-serif", 20))
        .margin(12)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(x_min..x_max, 0f64..1.05f64)?;

    chart
        .configure_mesh()
        .x_desc(X_LABEL)
        .y_desc(Y_LABEL)
        .draw()?;

    let marker = options.marker_size;
    chart.draw_series(
        curve
            .points()
            .map(|point| Circle::new(point, marker, BLUE.filled())),
    )?;

    root.present()?;
    Ok(())
}

/// X axis range: the data span padded by 5% on each side.
///
/// A single distinct value is padded by 0.5 or 5% of its magnitude,
/// whichever is larger. `None` when the width of the range overflows.
fn x_range(curve: &CdfCurve) -> Option<(f64, f64)> {
    let (min, max) = (curve.min(), curve.max());
    let pad = if max - min <= f64::EPSILON * min.abs().max(1.0) {
        (min.abs() * 0.05).max(0.5)
    } else {
        // Scaled before subtracting so that far-apart scores cannot overflow
        max * 0.05 - min * 0.05
    };
    let (lo, hi) = (min - pad, max + pad);
    (hi - lo).is_finite().then_some((lo, hi))
}

/// Open `path` in a viewer and block until the viewer exits.
fn show_image(path: &Path, viewer: Option<&str>) {
    let Some(mut command) = viewer_command(path, viewer) else {
        warn!("No image viewer configured, set plot.viewer to show the plot");
        return;
    };

    debug!("Launching viewer: {:?}", command);
    match command.status() {
        Ok(status) if status.success() => {}
        Ok(status) => warn!("Image viewer exited with {}", status),
        Err(e) => warn!("Failed to launch image viewer: {}", e),
    }
}

/// Build the viewer command line for `path`.
///
/// Only macOS and Windows have a default opener that waits for the window.
fn viewer_command(path: &Path, viewer: Option<&str>) -> Option<Command> {
    if let Some(viewer) = viewer {
        let mut parts = viewer.split_whitespace();
        let mut command = Command::new(parts.next()?);
        command.args(parts).arg(path);
        return Some(command);
    }

    if cfg!(target_os = "macos") {
        let mut command = Command::new("open");
        command.arg("-W").arg(path);
        Some(command)
    } else if cfg!(target_os = "windows") {
        let mut command = Command::new("cmd");
        command.args(["/C", "start", "/WAIT", ""]).arg(path);
        Some(command)
    } else {
        None
    }
}
