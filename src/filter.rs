//! Selecting the target table's changes from a decoded batch

use crate::error::EncodeError;
use crate::record::CapturedRecord;
use cdc_bronze_postgresql_test_decoding_source::RawChangeEntry;
use cdc_bronze_test_decoding::{decode, DecodedChange, TableRef};
use chrono::{DateTime, Local};

/// Counts of what [`ChangeSetFilter::filter`] saw
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterStats {
    /// Entries that decoded to a row change
    pub decoded: usize,
    /// Entries that were not row changes or could not be decoded
    pub skipped: usize,
    /// Row changes of other tables
    pub other_tables: usize,
    pub matched: usize,
    /// Matched changes whose column list was only partly read
    pub partial: usize,
}

/// Keeps the row changes of one table
#[derive(Debug, Clone)]
pub struct ChangeSetFilter {
    target: TableRef,
}

impl ChangeSetFilter {
    pub fn new(target: TableRef) -> Self {
        Self { target }
    }

    /// Turn the target table's changes into records stamped with `capture_time`.
    ///
    /// Each change is paired with the entry it was decoded from. Output order
    /// equals input order.
    pub fn filter<'a, I>(
        &self,
        entries: I,
        capture_time: DateTime<Local>,
    ) -> Result<(Vec<CapturedRecord>, FilterStats), EncodeError>
    where
        I: IntoIterator<Item = (&'a RawChangeEntry, Option<DecodedChange>)>,
    {
        let mut stats = FilterStats::default();
        let mut records = Vec::new();

        for (entry, change) in entries {
            let Some(change) = change else {
                stats.skipped += 1;
                continue;
            };
            stats.decoded += 1;

            if !change.is_for(&self.target) {
                stats.other_tables += 1;
                continue;
            }
            if change.is_partial() {
                stats.partial += 1;
            }

            records.push(CapturedRecord {
                capture_timestamp: capture_time,
                log_position: entry.lsn,
                operation: change.operation,
                columns_json: serde_json::to_string(&change.columns)?,
            });
        }

        stats.matched = records.len();
        Ok((records, stats))
    }
}

/// Decode every entry's payload, keeping the pairing with its entry
pub fn decode_entries(
    entries: &[RawChangeEntry],
) -> impl Iterator<Item = (&RawChangeEntry, Option<DecodedChange>)> {
    entries.iter().map(|entry| (entry, decode(&entry.payload)))
}
