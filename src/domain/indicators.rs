use super::types::Bar;
use serde::{Deserialize, Serialize};

/// Indicator readings at the last bar of a slice, used to describe the
/// market context around a target window in reports. Only bars at or
/// before the snapshot position are consulted — no look-ahead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma_20: f64,
    pub ema_12: f64,
    pub rsi_14: f64,
    pub atr_14: f64,
}

impl IndicatorSnapshot {
    /// Compute from the bars up to and including the last element.
    /// With too little history, averages stay at zero and RSI at the
    /// neutral 50.
    pub fn compute(bars: &[Bar]) -> Self {
        Self {
            sma_20: trailing_mean(bars, 20).unwrap_or_default(),
            ema_12: ema(bars, 12).unwrap_or_default(),
            rsi_14: rsi(bars, 14).unwrap_or(50.0),
            atr_14: atr(bars, 14).unwrap_or_default(),
        }
    }
}

/// Mean close over the trailing `period` bars.
fn trailing_mean(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let tail = &bars[bars.len() - period..];
    Some(tail.iter().map(|b| b.close).sum::<f64>() / period as f64)
}

/// Exponential moving average of closes, seeded with the mean of the
/// first `period` bars.
fn ema(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() < period {
        return None;
    }
    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = bars[..period].iter().map(|b| b.close).sum::<f64>() / period as f64;
    Some(
        bars[period..]
            .iter()
            .fold(seed, |acc, b| acc + alpha * (b.close - acc)),
    )
}

/// Wilder-smoothed RSI of closes. None with fewer than `period + 1` bars.
fn rsi(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() <= period {
        return None;
    }
    let moves: Vec<f64> = bars.windows(2).map(|w| w[1].close - w[0].close).collect();

    let (mut up, mut down) = moves[..period].iter().fold((0.0, 0.0), |(u, d), &m| {
        if m > 0.0 {
            (u + m, d)
        } else {
            (u, d - m)
        }
    });
    up /= period as f64;
    down /= period as f64;

    let carry = (period - 1) as f64;
    for &m in &moves[period..] {
        up = (up * carry + m.max(0.0)) / period as f64;
        down = (down * carry + (-m).max(0.0)) / period as f64;
    }

    if down < 1e-10 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + up / down))
}

/// Wilder-smoothed average true range. None with fewer than `period + 1`
/// bars.
fn atr(bars: &[Bar], period: usize) -> Option<f64> {
    if period == 0 || bars.len() <= period {
        return None;
    }
    let ranges: Vec<f64> = bars
        .windows(2)
        .map(|w| {
            let (prev, bar) = (&w[0], &w[1]);
            (bar.high - bar.low)
                .max((bar.high - prev.close).abs())
                .max((bar.low - prev.close).abs())
        })
        .collect();

    let carry = (period - 1) as f64;
    let seed = ranges[..period].iter().sum::<f64>() / period as f64;
    Some(
        ranges[period..]
            .iter()
            .fold(seed, |acc, &tr| (acc * carry + tr) / period as f64),
    )
}
