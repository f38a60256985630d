//! Process bootstrap: telemetry and I/O error types.

pub mod error;
pub mod telemetry;
