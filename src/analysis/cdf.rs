//! Empirical cumulative distribution function.

use crate::error::PipelineError;
use crate::models::{Dataset, DistributionStats};

/// Empirical CDF of a non-empty dataset.
///
/// `sorted_scores[i]` is paired with `cumulative_probability[i] = (i + 1) / N`,
/// so the curve steps by `1/N` at every sample, repeated values included,
/// and always ends at exactly `1.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct CdfCurve {
    sorted_scores: Vec<f64>,
    cumulative_probability: Vec<f64>,
}

/// Compute the empirical CDF of `dataset`.
///
/// An empty dataset has no CDF and yields [`PipelineError::EmptyDataset`].
pub fn compute_cdf(dataset: &Dataset) -> Result<CdfCurve, PipelineError> {
    if dataset.is_empty() {
        return Err(PipelineError::EmptyDataset);
    }

    let mut sorted_scores = dataset.as_slice().to_vec();
    sorted_scores.sort_by(f64::total_cmp);

    let n = sorted_scores.len() as f64;
    let cumulative_probability = (1..=sorted_scores.len())
        .map(|rank| rank as f64 / n)
        .collect();

    Ok(CdfCurve {
        sorted_scores,
        cumulative_probability,
    })
}

impl CdfCurve {
    /// Scores in ascending order.
    pub fn sorted_scores(&self) -> &[f64] {
        &self.sorted_scores
    }

    /// Cumulative probability of each sorted score.
    pub fn cumulative_probability(&self) -> &[f64] {
        &self.cumulative_probability
    }

    /// Iterate over `(score, probability)` points.
    pub fn points(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.sorted_scores
            .iter()
            .copied()
            .zip(self.cumulative_probability.iter().copied())
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        self.sorted_scores.len()
    }

    /// Smallest score.
    pub fn min(&self) -> f64 {
        self.sorted_scores[0]
    }

    /// Largest score.
    pub fn max(&self) -> f64 {
        self.sorted_scores[self.sorted_scores.len() - 1]
    }

    /// Smallest score whose cumulative probability reaches `p`.
    ///
    /// `p` is clamped to `[0, 1]`.
    pub fn quantile(&self, p: f64) -> f64 {
        let p = p.clamp(0.0, 1.0);
        let idx = self
            .cumulative_probability
            .partition_point(|&prob| prob < p)
            .min(self.sorted_scores.len() - 1);
        self.sorted_scores[idx]
    }

    /// Min, median and max of the sample.
    pub fn stats(&self) -> DistributionStats {
        DistributionStats {
            min: self.min(),
            median: self.quantile(0.5),
            max: self.max(),
        }
    }
}
