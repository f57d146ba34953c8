//! Report output: the CDF plot and the run summary.

pub mod plot;
pub mod summary;

pub use plot::{CdfRenderer, PlotOptions, PlotRenderer};
pub use summary::*;
