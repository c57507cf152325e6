use crate::domain::{Bar, ColumnMap, PriceSeries};
use crate::error::PatternError;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Errors produced while turning an input file into a `PriceSeries`.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("column '{0}' not found in input")]
    MissingColumn(String),

    #[error("row {row}: cannot parse timestamp '{value}'")]
    BadTimestamp { row: usize, value: String },

    #[error("row {row}, column '{column}': cannot parse number '{value}'")]
    BadNumber {
        row: usize,
        column: String,
        value: String,
    },

    #[error(transparent)]
    Series(#[from] PatternError),
}

/// Load an OHLCV series from CSV. Column names come from `columns`; the
/// volume column is optional and defaults to zero when absent. Rows are
/// sorted by timestamp before series construction, so only true duplicate
/// timestamps are rejected.
pub fn load_csv(path: impl AsRef<Path>, columns: &ColumnMap) -> Result<PriceSeries, LoadError> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;
    let headers = reader.headers()?.clone();

    let find = |name: &str| headers.iter().position(|h| h.trim() == name);
    let ts_idx = find(&columns.timestamp)
        .ok_or_else(|| LoadError::MissingColumn(columns.timestamp.clone()))?;
    let open_idx =
        find(&columns.open).ok_or_else(|| LoadError::MissingColumn(columns.open.clone()))?;
    let high_idx =
        find(&columns.high).ok_or_else(|| LoadError::MissingColumn(columns.high.clone()))?;
    let low_idx =
        find(&columns.low).ok_or_else(|| LoadError::MissingColumn(columns.low.clone()))?;
    let close_idx =
        find(&columns.close).ok_or_else(|| LoadError::MissingColumn(columns.close.clone()))?;
    let volume_idx = find(&columns.volume);

    let mut bars = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        let timestamp = parse_timestamp(field(ts_idx)).ok_or_else(|| LoadError::BadTimestamp {
            row,
            value: field(ts_idx).to_string(),
        })?;

        let number = |idx: usize, column: &str| -> Result<f64, LoadError> {
            field(idx).parse::<f64>().map_err(|_| LoadError::BadNumber {
                row,
                column: column.to_string(),
                value: field(idx).to_string(),
            })
        };

        bars.push(Bar {
            timestamp,
            open: number(open_idx, &columns.open)?,
            high: number(high_idx, &columns.high)?,
            low: number(low_idx, &columns.low)?,
            close: number(close_idx, &columns.close)?,
            volume: match volume_idx {
                Some(idx) => number(idx, &columns.volume)?,
                None => 0.0,
            },
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    let series = PriceSeries::new(bars)?;
    info!(rows = series.len(), path = %path.as_ref().display(), "loaded csv series");
    Ok(series)
}

/// Load a series from a JSON array of records, e.g.
/// `[{"date": "2024-01-02", "open": 100.0, ...}, ...]`.
pub fn load_json(path: impl AsRef<Path>, columns: &ColumnMap) -> Result<PriceSeries, LoadError> {
    let text = std::fs::read_to_string(path.as_ref())?;
    let records: Vec<serde_json::Map<String, serde_json::Value>> = serde_json::from_str(&text)?;

    let mut bars = Vec::with_capacity(records.len());
    for (row, record) in records.iter().enumerate() {
        let timestamp = record
            .get(&columns.timestamp)
            .and_then(json_timestamp)
            .ok_or_else(|| LoadError::BadTimestamp {
                row,
                value: record
                    .get(&columns.timestamp)
                    .map(|v| v.to_string())
                    .unwrap_or_default(),
            })?;

        let number = |name: &str| -> Result<f64, LoadError> {
            record
                .get(name)
                .and_then(json_number)
                .ok_or_else(|| LoadError::BadNumber {
                    row,
                    column: name.to_string(),
                    value: record.get(name).map(|v| v.to_string()).unwrap_or_default(),
                })
        };

        bars.push(Bar {
            timestamp,
            open: number(&columns.open)?,
            high: number(&columns.high)?,
            low: number(&columns.low)?,
            close: number(&columns.close)?,
            volume: record
                .get(&columns.volume)
                .and_then(json_number)
                .unwrap_or(0.0),
        });
    }

    bars.sort_by_key(|b| b.timestamp);
    let series = PriceSeries::new(bars)?;
    info!(rows = series.len(), path = %path.as_ref().display(), "loaded json series");
    Ok(series)
}

/// Write a series back out as CSV with the given column names and
/// RFC 3339 timestamps.
pub fn save_csv(
    series: &PriceSeries,
    path: impl AsRef<Path>,
    columns: &ColumnMap,
) -> Result<(), LoadError> {
    let mut writer = csv::Writer::from_path(path.as_ref())?;
    writer.write_record([
        columns.timestamp.as_str(),
        columns.open.as_str(),
        columns.high.as_str(),
        columns.low.as_str(),
        columns.close.as_str(),
        columns.volume.as_str(),
    ])?;
    for bar in series.bars() {
        writer.write_record(&[
            bar.datetime().to_rfc3339(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])?;
    }
    writer.flush()?;
    Ok(())
}

/// Accepts epoch seconds, epoch milliseconds, RFC 3339, `Y-m-d H:M:S`
/// or bare `Y-m-d` dates.
fn parse_timestamp(raw: &str) -> Option<i64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(n) = s.parse::<i64>() {
        // Bare integers below ~1e11 are epoch seconds, anything larger
        // is already milliseconds.
        return Some(if n.abs() < 100_000_000_000 { n * 1000 } else { n });
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.timestamp_millis());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc().timestamp_millis());
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(d.and_hms_opt(0, 0, 0)?.and_utc().timestamp_millis());
    }
    None
}

fn json_timestamp(value: &serde_json::Value) -> Option<i64> {
    match value {
        serde_json::Value::String(s) => parse_timestamp(s),
        serde_json::Value::Number(n) => {
            let n = n.as_i64()?;
            Some(if n.abs() < 100_000_000_000 { n * 1000 } else { n })
        }
        _ => None,
    }
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
