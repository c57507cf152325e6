//! Historical analogue search over OHLC time series.
//!
//! Given a loaded price series and a target window, the engine finds the
//! past windows whose shape most resembles the target, ranks them by
//! similarity, and summarizes what prices did in the bars that followed
//! each match.

pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod evaluation;
