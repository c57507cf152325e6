use crate::engine::ScanResult;
use crate::error::PatternError;
use serde::{Deserialize, Serialize};
use statrs::statistics::{Data, Median, Statistics};

/// Summary of what happened after the matched windows.
///
/// Return metrics are `None` when there are no matches — an empty match
/// set is an expected outcome of a strict similarity floor, so the
/// undefined state is represented explicitly instead of raising.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForwardStats {
    pub count: usize,
    pub mean_return_pct: Option<f64>,
    pub median_return_pct: Option<f64>,
    pub std_return_pct: Option<f64>,
    pub min_return_pct: Option<f64>,
    pub max_return_pct: Option<f64>,
    /// Fraction of matches whose forward return was positive, in [0, 1].
    pub positive_rate: Option<f64>,
    /// Mean of the matches' best forward excursions (highest high).
    pub avg_max_excursion_pct: Option<f64>,
    /// Mean of the matches' worst forward excursions (lowest low).
    pub avg_min_excursion_pct: Option<f64>,
}

impl ForwardStats {
    fn empty() -> Self {
        Self {
            count: 0,
            mean_return_pct: None,
            median_return_pct: None,
            std_return_pct: None,
            min_return_pct: None,
            max_return_pct: None,
            positive_rate: None,
            avg_max_excursion_pct: None,
            avg_min_excursion_pct: None,
        }
    }
}

/// Reduce a ranked result set to forward-return statistics.
pub fn aggregate(result: &ScanResult) -> ForwardStats {
    let returns: Vec<f64> = result.matches.iter().map(|m| m.forward_return_pct).collect();
    if returns.is_empty() {
        return ForwardStats::empty();
    }

    let count = returns.len();
    let mean = returns.iter().copied().mean();
    // Sample std dev needs at least two observations.
    let std = if count > 1 {
        Some(returns.iter().copied().std_dev())
    } else {
        None
    };
    let median = Data::new(returns.clone()).median();
    let min = returns.iter().copied().fold(f64::INFINITY, f64::min);
    let max = returns.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let positive = returns.iter().filter(|&&r| r > 0.0).count();

    let avg_max = result
        .matches
        .iter()
        .map(|m| m.max_return_pct)
        .sum::<f64>()
        / count as f64;
    let avg_min = result
        .matches
        .iter()
        .map(|m| m.min_return_pct)
        .sum::<f64>()
        / count as f64;

    ForwardStats {
        count,
        mean_return_pct: Some(mean),
        median_return_pct: Some(median),
        std_return_pct: std,
        min_return_pct: Some(min),
        max_return_pct: Some(max),
        positive_rate: Some(positive as f64 / count as f64),
        avg_max_excursion_pct: Some(avg_max),
        avg_min_excursion_pct: Some(avg_min),
    }
}

/// Like [`aggregate`], but for callers that require a non-empty report.
pub fn aggregate_strict(result: &ScanResult) -> Result<ForwardStats, PatternError> {
    if result.matches.is_empty() {
        return Err(PatternError::EmptyResult);
    }
    Ok(aggregate(result))
}
