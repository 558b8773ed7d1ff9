//! Records ready to be written

use cdc_bronze_postgresql_test_decoding_source::Lsn;
use cdc_bronze_test_decoding::Operation;
use chrono::{DateTime, Local};

/// Format of the `capture_ts` column
pub const CAPTURE_TS_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One captured change of the target table
///
/// All records of a batch share the same `capture_timestamp`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedRecord {
    pub capture_timestamp: DateTime<Local>,
    /// Position of the source entry in the log
    pub log_position: Lsn,
    pub operation: Operation,
    /// Columns as a JSON object in source order
    pub columns_json: String,
}

impl CapturedRecord {
    pub fn capture_ts(&self) -> String {
        self.capture_timestamp.format(CAPTURE_TS_FORMAT).to_string()
    }
}
