//! Distribution analysis.

pub mod cdf;

pub use cdf::*;
