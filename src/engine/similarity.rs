use crate::error::PatternError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Similarity metric between two equal-length normalized windows.
///
/// Every metric maps to the canonical [0, 1] range so scores are
/// comparable regardless of which one is selected: correlation's native
/// [-1, 1] is linearly rescaled, euclidean distance is inverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityMetric {
    /// Pearson correlation of the two shape vectors.
    Correlation,
    /// Inverse RMS distance: `1 / (1 + d)`.
    Euclidean,
    /// Correlation with a linear weight ramp so recent bars dominate.
    Weighted,
}

impl FromStr for SimilarityMetric {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "correlation" => Ok(Self::Correlation),
            "euclidean" => Ok(Self::Euclidean),
            "weighted" => Ok(Self::Weighted),
            other => Err(PatternError::UnknownName {
                kind: "similarity metric",
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Correlation => write!(f, "correlation"),
            Self::Euclidean => write!(f, "euclidean"),
            Self::Weighted => write!(f, "weighted"),
        }
    }
}

/// Score two normalized windows. Always returns a finite value in [0, 1];
/// length mismatch or an undefined correlation (zero variance) scores 0.0.
pub fn score(a: &[f64], b: &[f64], metric: SimilarityMetric) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    match metric {
        SimilarityMetric::Correlation => pearson(a, b).map_or(0.0, rescale_unit),
        SimilarityMetric::Euclidean => 1.0 / (1.0 + rms_distance(a, b)),
        SimilarityMetric::Weighted => {
            let weights = linear_ramp(a.len());
            weighted_pearson(a, b, &weights).map_or(0.0, rescale_unit)
        }
    }
}

/// Map a correlation in [-1, 1] onto the canonical [0, 1] range.
fn rescale_unit(r: f64) -> f64 {
    ((r + 1.0) / 2.0).clamp(0.0, 1.0)
}

/// Pearson correlation coefficient. None when either vector has zero
/// variance (undefined).
fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a < 1e-18 || var_b < 1e-18 {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

/// Pearson correlation where each bar's contribution is scaled by a
/// weight. Weights are renormalized to sum to 1, so the result stays in
/// the same [-1, 1] range as the plain coefficient.
fn weighted_pearson(a: &[f64], b: &[f64], weights: &[f64]) -> Option<f64> {
    let w_sum: f64 = weights.iter().sum();
    if w_sum < 1e-18 {
        return None;
    }

    let mean_a: f64 = a.iter().zip(weights).map(|(x, w)| x * w).sum::<f64>() / w_sum;
    let mean_b: f64 = b.iter().zip(weights).map(|(y, w)| y * w).sum::<f64>() / w_sum;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for ((x, y), w) in a.iter().zip(b.iter()).zip(weights) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        cov += w * dx * dy;
        var_a += w * dx * dx;
        var_b += w * dy * dy;
    }

    if var_a < 1e-18 || var_b < 1e-18 {
        return None;
    }
    Some(cov / (var_a * var_b).sqrt())
}

/// Monotonically increasing ramp 1..=n — the last bar weighs n times the
/// first.
fn linear_ramp(n: usize) -> Vec<f64> {
    (1..=n).map(|i| i as f64).collect()
}

/// Root-mean-square distance. RMS rather than the raw euclidean sum keeps
/// the score comparable across window sizes.
fn rms_distance(a: &[f64], b: &[f64]) -> f64 {
    let sum_sq: f64 = a
        .iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum();
    (sum_sq / a.len() as f64).sqrt()
}
