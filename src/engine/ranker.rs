use crate::engine::scanner::{PatternMatch, TargetWindow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Ranked scan output: the target window plus the surviving matches in
/// rank order. Read-only after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanResult {
    pub target: TargetWindow,
    pub matches: Vec<PatternMatch>,
}

/// Sort matches by similarity descending and keep the best `top_n`.
///
/// Ties go to the more recent candidate (higher end position) — recent
/// analogues are considered more informative. Fewer than `top_n`
/// candidates is not an error; an empty result set is a valid outcome.
pub fn rank(target: TargetWindow, mut matches: Vec<PatternMatch>, top_n: usize) -> ScanResult {
    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.end.cmp(&a.end))
    });
    matches.truncate(top_n);
    ScanResult { target, matches }
}
