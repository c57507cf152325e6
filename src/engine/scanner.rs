use crate::domain::{closes, Bar, PriceSeries};
use crate::engine::normalize::{normalize, NormalizeMethod};
use crate::engine::similarity::{score, SimilarityMetric};
use crate::error::PatternError;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Scan configuration. Immutable once built — passed into every scan call
/// explicitly, never held as shared state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanParams {
    /// End index of the target window. Negative counts from the end
    /// (-1 = last bar).
    pub target_end: i64,
    /// Bars per comparison window.
    pub window_size: usize,
    /// Bars of forward context attached to each match.
    pub lookahead: usize,
    /// Maximum matches kept after ranking.
    pub top_n: usize,
    /// Similarity floor in [0, 1]; candidates below it are dropped.
    pub min_similarity: f64,
    pub metric: SimilarityMetric,
    pub normalize: NormalizeMethod,
    /// Candidates ending within this many BARS of the target end are
    /// excluded. Bar count, not calendar days — for intraday data the two
    /// differ.
    pub exclude_recent: usize,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            target_end: -1,
            window_size: 10,
            lookahead: 10,
            top_n: 20,
            min_similarity: 0.7,
            metric: SimilarityMetric::Correlation,
            normalize: NormalizeMethod::Relative,
            exclude_recent: 10,
        }
    }
}

impl ScanParams {
    /// Fail fast on unusable parameters, before any scanning work.
    pub fn validate(&self) -> Result<(), PatternError> {
        if self.window_size == 0 {
            return Err(PatternError::invalid_parameter(
                "window_size",
                "must be positive",
            ));
        }
        if self.lookahead == 0 {
            return Err(PatternError::invalid_parameter(
                "lookahead",
                "must be positive",
            ));
        }
        if self.top_n == 0 {
            return Err(PatternError::invalid_parameter("top_n", "must be positive"));
        }
        if !self.min_similarity.is_finite() || !(0.0..=1.0).contains(&self.min_similarity) {
            return Err(PatternError::invalid_parameter(
                "min_similarity",
                format!("must lie in [0, 1], got {}", self.min_similarity),
            ));
        }
        Ok(())
    }
}

/// The window being searched for, with its absolute position in the series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetWindow {
    pub start: usize,
    pub end: usize,
    pub bars: Vec<Bar>,
}

/// A candidate window that cleared the similarity floor, together with the
/// forward bars that followed it and the returns realized over them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternMatch {
    pub start: usize,
    pub end: usize,
    pub similarity: f64,
    pub window: Vec<Bar>,
    pub forward: Vec<Bar>,
    /// Close-to-close change over the forward window, percent.
    pub forward_return_pct: f64,
    /// Highest high in the forward window relative to entry, percent.
    pub max_return_pct: f64,
    /// Lowest low in the forward window relative to entry, percent.
    pub min_return_pct: f64,
}

/// Sweep every valid candidate position against the target window.
///
/// Returns the extracted target window and all candidates clearing the
/// similarity floor, in ascending position order. Per-candidate data
/// problems (flat window, missing values, truncated forward window) skip
/// that candidate only; a bad target or bad parameters abort the call.
pub fn scan(
    series: &PriceSeries,
    params: &ScanParams,
) -> Result<(TargetWindow, Vec<PatternMatch>), PatternError> {
    let (target, target_norm, target_end) = prepare_target(series, params)?;

    let mut matches = Vec::new();
    let mut evaluated = 0usize;
    for end in candidate_range(series, params) {
        if excluded(end, target_end, params) {
            continue;
        }
        evaluated += 1;
        if let Some(m) = evaluate_candidate(series, &target_norm, end, params) {
            matches.push(m);
        }
    }

    info!(
        evaluated,
        kept = matches.len(),
        metric = %params.metric,
        "scan complete"
    );
    Ok((target, matches))
}

/// Same contract and same output as [`scan`], with candidate positions
/// partitioned across rayon workers. Workers only read the shared series
/// and emit into their own lists; the merge is re-sorted by position so
/// the result is identical to the sequential sweep.
pub fn scan_parallel(
    series: &PriceSeries,
    params: &ScanParams,
) -> Result<(TargetWindow, Vec<PatternMatch>), PatternError> {
    let (target, target_norm, target_end) = prepare_target(series, params)?;

    let mut matches: Vec<PatternMatch> = candidate_range(series, params)
        .into_par_iter()
        .filter(|&end| !excluded(end, target_end, params))
        .filter_map(|end| evaluate_candidate(series, &target_norm, end, params))
        .collect();
    matches.sort_by_key(|m| m.end);

    info!(kept = matches.len(), "parallel scan complete");
    Ok((target, matches))
}

/// Validate parameters, resolve the target end index and extract + normalize
/// the target window.
fn prepare_target(
    series: &PriceSeries,
    params: &ScanParams,
) -> Result<(TargetWindow, Vec<f64>, usize), PatternError> {
    params.validate()?;

    let target_end = series.resolve_index(params.target_end).ok_or_else(|| {
        PatternError::invalid_window(format!(
            "target end {} outside series of {} bars",
            params.target_end,
            series.len()
        ))
    })?;

    let bars = series.window(target_end, params.window_size).ok_or_else(|| {
        PatternError::invalid_window(format!(
            "target window of {} bars ending at {} extends before series start",
            params.window_size, target_end
        ))
    })?;

    if let Some(bad) = bars.iter().position(|b| !b.is_complete()) {
        return Err(PatternError::invalid_window(format!(
            "target window has missing values at offset {}",
            bad
        )));
    }

    let target_norm = normalize(&closes(bars), params.normalize).ok_or_else(|| {
        PatternError::invalid_window(format!(
            "target window cannot be normalized with {}",
            params.normalize
        ))
    })?;

    let target = TargetWindow {
        start: target_end + 1 - params.window_size,
        end: target_end,
        bars: bars.to_vec(),
    };
    Ok((target, target_norm, target_end))
}

/// Candidate end positions whose window and forward window both fit.
fn candidate_range(series: &PriceSeries, params: &ScanParams) -> std::ops::Range<usize> {
    let first = params.window_size - 1;
    let last_exclusive = series.len().saturating_sub(params.lookahead);
    first..last_exclusive.max(first)
}

/// Exclusion rules relative to the target: no overlap with the target
/// window, and nothing within `exclude_recent` bars of the target end.
fn excluded(end: usize, target_end: usize, params: &ScanParams) -> bool {
    let distance = end.abs_diff(target_end);
    distance < params.window_size || distance <= params.exclude_recent
}

/// Normalize and score one candidate. None means the candidate is not
/// matchable (incomplete bars, flat window) or falls below the floor.
fn evaluate_candidate(
    series: &PriceSeries,
    target_norm: &[f64],
    end: usize,
    params: &ScanParams,
) -> Option<PatternMatch> {
    let window = series.window(end, params.window_size)?;
    if window.iter().any(|b| !b.is_complete()) {
        debug!(end, "candidate skipped: incomplete bars");
        return None;
    }

    let candidate_norm = normalize(&closes(window), params.normalize)?;
    let similarity = score(target_norm, &candidate_norm, params.metric);
    if similarity < params.min_similarity {
        return None;
    }

    let forward = series.forward(end, params.lookahead)?;
    if forward.iter().any(|b| !b.is_complete()) {
        debug!(end, "candidate skipped: incomplete forward bars");
        return None;
    }

    let entry = window.last()?.close;
    if entry.abs() < 1e-12 {
        return None;
    }
    let exit = forward.last()?.close;
    let max_high = forward.iter().map(|b| b.high).fold(f64::NEG_INFINITY, f64::max);
    let min_low = forward.iter().map(|b| b.low).fold(f64::INFINITY, f64::min);

    Some(PatternMatch {
        start: end + 1 - params.window_size,
        end,
        similarity,
        window: window.to_vec(),
        forward: forward.to_vec(),
        forward_return_pct: (exit - entry) / entry * 100.0,
        max_return_pct: (max_high - entry) / entry * 100.0,
        min_return_pct: (min_low - entry) / entry * 100.0,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_from_closes(closes: &[f64]) -> PriceSeries {
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: i as i64 * 86_400_000,
                open: c,
                high: c + 0.5,
                low: c - 0.5,
                close: c,
                volume: 1000.0,
            })
            .collect();
        PriceSeries::new(bars).unwrap()
    }

    /// 30 closes rising 100..129, so every same-step window matches the
    /// target shape exactly under relative normalization.
    fn rising_series() -> PriceSeries {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        series_from_closes(&closes)
    }

    fn base_params() -> ScanParams {
        ScanParams {
            window_size: 5,
            lookahead: 5,
            min_similarity: 0.9,
            exclude_recent: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_rejects_bad_parameters() {
        let mut p = ScanParams::default();
        p.window_size = 0;
        assert!(matches!(
            p.validate(),
            Err(PatternError::InvalidParameter { name: "window_size", .. })
        ));

        let mut p = ScanParams::default();
        p.lookahead = 0;
        assert!(p.validate().is_err());

        let mut p = ScanParams::default();
        p.top_n = 0;
        assert!(p.validate().is_err());

        let mut p = ScanParams::default();
        p.min_similarity = 1.5;
        assert!(p.validate().is_err());

        let mut p = ScanParams::default();
        p.min_similarity = f64::NAN;
        assert!(p.validate().is_err());
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(ScanParams::default().validate().is_ok());
    }

    #[test]
    fn test_target_window_extraction() {
        let series = rising_series();
        let (target, _) = scan(&series, &base_params()).unwrap();
        assert_eq!(target.start, 25);
        assert_eq!(target.end, 29);
        assert_eq!(target.bars.len(), 5);
        assert!((target.bars[0].close - 125.0).abs() < 1e-10);
    }

    #[test]
    fn test_target_before_series_start_fails() {
        let series = series_from_closes(&[100.0, 101.0, 102.0]);
        let params = ScanParams {
            window_size: 5,
            ..Default::default()
        };
        assert!(matches!(
            scan(&series, &params),
            Err(PatternError::InvalidWindow { .. })
        ));
    }

    #[test]
    fn test_target_out_of_range_index_fails() {
        let series = rising_series();
        let params = ScanParams {
            target_end: 99,
            ..base_params()
        };
        assert!(scan(&series, &params).is_err());

        let params = ScanParams {
            target_end: -31,
            ..base_params()
        };
        assert!(scan(&series, &params).is_err());
    }

    #[test]
    fn test_target_with_nan_fails() {
        let mut closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        closes[28] = f64::NAN;
        let bars: Vec<Bar> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar {
                timestamp: i as i64 * 1000,
                open: 100.0,
                high: 130.0,
                low: 99.0,
                close: c,
                volume: 1.0,
            })
            .collect();
        let series = PriceSeries::new(bars).unwrap();
        let err = scan(&series, &base_params()).unwrap_err();
        assert!(matches!(err, PatternError::InvalidWindow { .. }));
    }

    #[test]
    fn test_rising_series_finds_perfect_analogues() {
        let series = rising_series();
        let (_, matches) = scan(&series, &base_params()).unwrap();
        assert!(!matches.is_empty());
        // Every earlier same-step window has correlation 1.0 → canonical 1.0.
        for m in &matches {
            assert!(
                m.similarity > 0.999,
                "window ending at {} scored {}",
                m.end,
                m.similarity
            );
        }
    }

    #[test]
    fn test_matches_carry_forward_window_and_returns() {
        let series = rising_series();
        let (_, matches) = scan(&series, &base_params()).unwrap();
        let m = &matches[0];
        assert_eq!(m.forward.len(), 5);
        assert_eq!(m.forward[0].timestamp, series.get(m.end + 1).unwrap().timestamp);
        // +1 per bar from entry: 5 bars ahead of close[end] = end+5 steps.
        let entry = series.get(m.end).unwrap().close;
        let expected = (entry + 5.0 - entry) / entry * 100.0;
        assert!((m.forward_return_pct - expected).abs() < 1e-10);
        assert!(m.max_return_pct >= m.forward_return_pct - 1.0);
        assert!(m.min_return_pct <= m.forward_return_pct);
    }

    #[test]
    fn test_no_match_overlaps_target_or_exclusion_zone() {
        // 100 bars, window 10, lookahead 5, exclusion 10, target at 99:
        // nothing touching positions 90..=99 may come back.
        let closes: Vec<f64> = (0..100).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
        let series = series_from_closes(&closes);
        let params = ScanParams {
            window_size: 10,
            lookahead: 5,
            exclude_recent: 10,
            target_end: 99,
            min_similarity: 0.0,
            ..Default::default()
        };
        let (_, matches) = scan(&series, &params).unwrap();
        for m in &matches {
            assert!(m.end < 90, "match ending at {} overlaps the target zone", m.end);
            assert!(m.start + 10 == m.end + 1);
        }
    }

    #[test]
    fn test_candidates_without_full_forward_window_skipped() {
        let series = rising_series();
        let params = ScanParams {
            min_similarity: 0.0,
            ..base_params()
        };
        let (_, matches) = scan(&series, &params).unwrap();
        // Last 5 bars can never be a candidate end: no room for lookahead.
        assert!(matches.iter().all(|m| m.end + 5 < 30));
    }

    #[test]
    fn test_flat_candidate_skipped_under_minmax() {
        let mut closes: Vec<f64> = (0..40).map(|i| 100.0 + i as f64).collect();
        // A flat stretch far from the target.
        for c in closes.iter_mut().take(10).skip(5) {
            *c = 100.0;
        }
        // Sorting constraint: keep timestamps increasing, closes may repeat.
        let series = series_from_closes(&closes);
        let params = ScanParams {
            window_size: 5,
            lookahead: 5,
            normalize: NormalizeMethod::MinMax,
            min_similarity: 0.0,
            exclude_recent: 5,
            ..Default::default()
        };
        let (_, matches) = scan(&series, &params).unwrap();
        // The all-flat window ending at 9 cannot be normalized; it must be
        // absent rather than aborting the scan.
        assert!(matches.iter().all(|m| m.end != 9));
        assert!(!matches.is_empty());
    }

    #[test]
    fn test_similarity_floor_filters() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + (i as f64 * 1.3).sin() * 5.0)
            .collect();
        let series = series_from_closes(&closes);
        let strict = ScanParams {
            min_similarity: 0.99,
            ..base_params()
        };
        let loose = ScanParams {
            min_similarity: 0.0,
            ..base_params()
        };
        let (_, strict_matches) = scan(&series, &strict).unwrap();
        let (_, loose_matches) = scan(&series, &loose).unwrap();
        assert!(strict_matches.len() <= loose_matches.len());
        assert!(strict_matches.iter().all(|m| m.similarity >= 0.99));
    }

    #[test]
    fn test_zero_matches_is_not_an_error() {
        let closes: Vec<f64> = (0..40)
            .map(|i| 100.0 + (i as f64 * 2.1).sin() * 10.0)
            .collect();
        let series = series_from_closes(&closes);
        let params = ScanParams {
            min_similarity: 1.0,
            ..base_params()
        };
        let (_, matches) = scan(&series, &params).unwrap();
        assert!(matches.len() <= 1); // only exact duplicates of the shape survive
    }

    #[test]
    fn test_scan_is_deterministic() {
        let closes: Vec<f64> = (0..200)
            .map(|i| 100.0 + (i as f64 * 0.37).sin() * 4.0 + i as f64 * 0.01)
            .collect();
        let series = series_from_closes(&closes);
        let params = ScanParams {
            min_similarity: 0.5,
            ..base_params()
        };
        let (_, a) = scan(&series, &params).unwrap();
        let (_, b) = scan(&series, &params).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn test_parallel_scan_matches_sequential() {
        let closes: Vec<f64> = (0..300)
            .map(|i| 100.0 + (i as f64 * 0.11).sin() * 6.0 + (i as f64 * 0.53).cos() * 2.0)
            .collect();
        let series = series_from_closes(&closes);
        let params = ScanParams {
            min_similarity: 0.3,
            ..base_params()
        };
        let (_, seq) = scan(&series, &params).unwrap();
        let (_, par) = scan_parallel(&series, &params).unwrap();
        assert_eq!(
            serde_json::to_string(&seq).unwrap(),
            serde_json::to_string(&par).unwrap()
        );
    }

    #[test]
    fn test_normalize_method_change_preserves_scalar_multiple_winner() {
        // Candidate A is a positive scalar multiple of the target's relative
        // shape; candidate B contains a decrease. A must win under both
        // normalization methods.
        let mut closes = vec![0.0; 60];
        // Target shape at the end: +1 per bar from 200.
        for (i, c) in closes.iter_mut().enumerate() {
            *c = 150.0 + (i as f64 * 0.9).sin() * 20.0;
        }
        // Candidate A at 10..=14: doubles the target's per-bar fractional step.
        let a_base = 100.0;
        for (k, c) in closes[10..15].iter_mut().enumerate() {
            *c = a_base * (1.0 + 0.01 * k as f64);
        }
        // Candidate B at 30..=34: contains a dip.
        for (k, c) in closes[30..35].iter_mut().enumerate() {
            *c = 100.0 + [0.0, 1.0, -2.0, 1.0, 2.0][k];
        }
        // Target at 55..=59: steady rise.
        for (k, c) in closes[55..60].iter_mut().enumerate() {
            *c = 200.0 * (1.0 + 0.005 * k as f64);
        }
        let series = series_from_closes(&closes);

        for method in [NormalizeMethod::Relative, NormalizeMethod::MinMax] {
            let params = ScanParams {
                window_size: 5,
                lookahead: 5,
                min_similarity: 0.0,
                exclude_recent: 5,
                normalize: method,
                ..Default::default()
            };
            let (_, matches) = scan(&series, &params).unwrap();
            let sim_a = matches.iter().find(|m| m.end == 14).unwrap().similarity;
            let sim_b = matches.iter().find(|m| m.end == 34).unwrap().similarity;
            assert!(
                sim_a > sim_b,
                "{method:?}: scalar-multiple window must beat the dipping one ({sim_a} vs {sim_b})"
            );
        }
    }
}
