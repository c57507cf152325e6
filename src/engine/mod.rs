pub mod normalize;
pub mod ranker;
pub mod scanner;
pub mod similarity;

pub use normalize::*;
pub use ranker::*;
pub use scanner::*;
pub use similarity::*;

use crate::domain::PriceSeries;
use crate::error::PatternError;

/// Scan and rank in one call — the usual entry point for callers.
pub fn find_similar(
    series: &PriceSeries,
    params: &ScanParams,
) -> Result<ScanResult, PatternError> {
    let (target, matches) = scanner::scan(series, params)?;
    Ok(ranker::rank(target, matches, params.top_n))
}

/// Parallel variant of [`find_similar`]; identical output.
pub fn find_similar_parallel(
    series: &PriceSeries,
    params: &ScanParams,
) -> Result<ScanResult, PatternError> {
    let (target, matches) = scanner::scan_parallel(series, params)?;
    Ok(ranker::rank(target, matches, params.top_n))
}
