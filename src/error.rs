use thiserror::Error;

/// Errors raised by series construction and the pattern scan.
///
/// Per-candidate data problems (flat window, missing values, truncated
/// forward window) are not errors — those candidates are skipped and the
/// scan continues. Only a bad target window or bad parameters abort a call.
#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid window: {reason}")]
    InvalidWindow { reason: String },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("result set is empty but a non-empty report was required")]
    EmptyResult,

    #[error("series not strictly ordered at row {index}: {prev_ts} -> {curr_ts}")]
    UnorderedSeries {
        index: usize,
        prev_ts: i64,
        curr_ts: i64,
    },

    #[error("unknown {kind} name: {name}")]
    UnknownName { kind: &'static str, name: String },
}

impl PatternError {
    pub fn invalid_window(reason: impl Into<String>) -> Self {
        Self::InvalidWindow {
            reason: reason.into(),
        }
    }

    pub fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}
