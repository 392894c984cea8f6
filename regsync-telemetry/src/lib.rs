//! Tracing bootstrap for the registry mirror.
//!
//! Production environments log structured JSON to daily-rotated files with
//! bounded retention; development environments log pretty output to the
//! terminal.

mod tracing;

pub use tracing::*;
