use crate::error::PatternError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a raw price window is turned into a comparable shape vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NormalizeMethod {
    /// Fractional change from the first close: `(ci - c0) / c0`.
    Relative,
    /// Rescale the window's own min/max to [0, 1].
    MinMax,
}

impl FromStr for NormalizeMethod {
    type Err = PatternError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relative" => Ok(Self::Relative),
            "minmax" => Ok(Self::MinMax),
            other => Err(PatternError::UnknownName {
                kind: "normalize method",
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for NormalizeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Relative => write!(f, "relative"),
            Self::MinMax => write!(f, "minmax"),
        }
    }
}

/// Normalize a window of closes into a shape vector of the same length.
///
/// Returns `None` when the window cannot produce a valid vector: any
/// non-finite input, a zero or non-finite base close under `Relative`, or
/// a flat window under `MinMax`. Callers treat `None` candidates as
/// non-matchable and skip them.
pub fn normalize(closes: &[f64], method: NormalizeMethod) -> Option<Vec<f64>> {
    if closes.is_empty() || closes.iter().any(|v| !v.is_finite()) {
        return None;
    }

    match method {
        NormalizeMethod::Relative => {
            let base = closes[0];
            if base.abs() < 1e-12 {
                return None;
            }
            Some(closes.iter().map(|c| (c - base) / base).collect())
        }
        NormalizeMethod::MinMax => {
            let min = closes.iter().copied().fold(f64::INFINITY, f64::min);
            let max = closes.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let range = max - min;
            if range < 1e-12 {
                // Flat window carries no shape — flagged invalid, not
                // returned as a degenerate all-zero vector.
                return None;
            }
            Some(closes.iter().map(|c| (c - min) / range).collect())
        }
    }
}
