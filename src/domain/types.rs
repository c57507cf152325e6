use crate::error::PatternError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV observation. Timestamp is epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn datetime(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.timestamp).unwrap_or_default()
    }

    /// All four price fields are finite. Bars failing this are not matchable.
    pub fn is_complete(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
    }
}

/// Maps logical OHLCV fields to physical column names in an input file.
/// Resolved once when the series is loaded, never consulted by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMap {
    pub timestamp: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl Default for ColumnMap {
    fn default() -> Self {
        Self {
            timestamp: "date".to_string(),
            open: "open".to_string(),
            high: "high".to_string(),
            low: "low".to_string(),
            close: "close".to_string(),
            volume: "volume".to_string(),
        }
    }
}

/// Immutable, time-ordered bar store. Construction enforces strictly
/// increasing timestamps — duplicates are rejected, gaps are fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(bars: Vec<Bar>) -> Result<Self, PatternError> {
        for i in 1..bars.len() {
            if bars[i].timestamp <= bars[i - 1].timestamp {
                return Err(PatternError::UnorderedSeries {
                    index: i,
                    prev_ts: bars[i - 1].timestamp,
                    curr_ts: bars[i].timestamp,
                });
            }
        }
        Ok(Self { bars })
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn get(&self, index: usize) -> Option<&Bar> {
        self.bars.get(index)
    }

    /// Window of `size` bars ending at `end` (inclusive). A view, not a copy.
    pub fn window(&self, end: usize, size: usize) -> Option<&[Bar]> {
        if size == 0 || end >= self.bars.len() || end + 1 < size {
            return None;
        }
        Some(&self.bars[end + 1 - size..=end])
    }

    /// The `lookahead` bars immediately after `end`. None if truncated.
    pub fn forward(&self, end: usize, lookahead: usize) -> Option<&[Bar]> {
        if lookahead == 0 || end + lookahead >= self.bars.len() {
            return None;
        }
        Some(&self.bars[end + 1..=end + lookahead])
    }

    /// Resolve a possibly-negative index (-1 = last bar).
    pub fn resolve_index(&self, index: i64) -> Option<usize> {
        let len = self.bars.len() as i64;
        let abs = if index < 0 { len + index } else { index };
        if abs < 0 || abs >= len {
            None
        } else {
            Some(abs as usize)
        }
    }
}

/// Extract the close column from a bar slice.
pub fn closes(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(|b| b.close).collect()
}
