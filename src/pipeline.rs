//! One capture cycle: fetch, decode, filter, write
//!
//! The fetch advances the slot before anything is written. If the write then
//! fails, the fetched changes are gone for good; the cycle reports this as
//! [`PipelineError::SinkWrite`] with the counts involved. The server commits
//! the advance as the fetch query runs, so a fetch error or a cycle cut short
//! by its timeout can lose changes the same way.

use crate::clock::Clock;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, WriteError};
use crate::filter::{decode_entries, ChangeSetFilter, FilterStats};
use crate::record::CapturedRecord;
use crate::writer::BatchWriter;
use cdc_bronze_object_sink::ObjectSink;
use cdc_bronze_postgresql_test_decoding_source::{ChangeSource, RawChangeEntry};
use chrono::{DateTime, Local};
use tracing::{debug, error, info, warn};

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// The slot had nothing pending
    NoEntries,
    /// Entries were consumed but none belonged to the target table
    NoMatches,
    /// A batch was written
    Written,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CycleResult {
    pub entries_fetched: usize,
    pub records_written: usize,
    /// Key of the written object
    pub destination: Option<String>,
    pub outcome: CycleOutcome,
}

impl CycleResult {
    fn without_batch(entries_fetched: usize, outcome: CycleOutcome) -> Self {
        Self {
            entries_fetched,
            records_written: 0,
            destination: None,
            outcome,
        }
    }
}

pub struct Pipeline<C, S> {
    config: PipelineConfig,
    source: C,
    writer: BatchWriter<S>,
    filter: ChangeSetFilter,
    clock: Box<dyn Clock>,
}

impl<C: ChangeSource, S: ObjectSink> Pipeline<C, S> {
    pub fn new(config: PipelineConfig, source: C, sink: S, clock: impl Clock + 'static) -> Self {
        let writer = BatchWriter::new(sink, config.sink.clone());
        let filter = ChangeSetFilter::new(config.target.clone());
        Self {
            config,
            source,
            writer,
            filter,
            clock: Box::new(clock),
        }
    }

    /// Run one cycle against the slot.
    ///
    /// Every error after the fetch means the fetched entries were consumed
    /// without being written. A fetch error usually leaves the slot where it
    /// was, but if the connection failed while rows were streaming back the
    /// server may already have advanced it.
    pub async fn run_cycle(&self) -> Result<CycleResult, PipelineError> {
        let slot = &self.config.slot_name;
        let entries = self
            .source
            .fetch_and_advance(slot, self.config.max_entries)
            .await
            .map_err(|source| PipelineError::SlotFetch {
                slot: slot.clone(),
                source,
            })?;

        let entries_fetched = entries.len();
        if entries.is_empty() {
            info!("No pending changes in slot {slot}");
            return Ok(CycleResult::without_batch(0, CycleOutcome::NoEntries));
        }
        info!("Fetched {entries_fetched} entries from slot {slot}");

        let batch_time = self.clock.now();
        let records = self.select(&entries, batch_time)?;
        if records.is_empty() {
            info!(
                "No changes for {} among {entries_fetched} entries",
                self.config.target
            );
            return Ok(CycleResult::without_batch(
                entries_fetched,
                CycleOutcome::NoMatches,
            ));
        }

        match self.writer.write_batch(&records, batch_time).await {
            Ok(Some(key)) => {
                info!(
                    "Wrote {} changes of {} to {}",
                    records.len(),
                    self.config.target,
                    self.writer.location(&key)
                );
                Ok(CycleResult {
                    entries_fetched,
                    records_written: records.len(),
                    destination: Some(key),
                    outcome: CycleOutcome::Written,
                })
            }
            Ok(None) => Ok(CycleResult::without_batch(
                entries_fetched,
                CycleOutcome::NoMatches,
            )),
            Err(WriteError::Sink(source)) => {
                error!(
                    "Write to {} failed after {entries_fetched} entries were consumed \
                     from slot {slot}; {} changes lost: {:#}",
                    source.location,
                    records.len(),
                    source.source
                );
                Err(PipelineError::SinkWrite {
                    entries_fetched,
                    records_lost: records.len(),
                    key: source.key.clone(),
                    source,
                })
            }
            Err(WriteError::Encode(source)) => {
                error!(
                    "Encoding failed after {entries_fetched} entries were consumed \
                     from slot {slot}: {source}"
                );
                Err(PipelineError::Encode {
                    entries_fetched,
                    source,
                })
            }
        }
    }

    /// Decode and filter pending changes without consuming or writing them
    pub async fn preview(&self) -> Result<Vec<CapturedRecord>, PipelineError> {
        let slot = &self.config.slot_name;
        let entries = self
            .source
            .peek(slot, self.config.max_entries)
            .await
            .map_err(|source| PipelineError::SlotFetch {
                slot: slot.clone(),
                source,
            })?;
        info!("Peeked {} entries from slot {slot}", entries.len());

        self.select(&entries, self.clock.now())
    }

    fn select(
        &self,
        entries: &[RawChangeEntry],
        batch_time: DateTime<Local>,
    ) -> Result<Vec<CapturedRecord>, PipelineError> {
        let (records, stats) = self
            .filter
            .filter(decode_entries(entries), batch_time)
            .map_err(|source| PipelineError::Encode {
                entries_fetched: entries.len(),
                source,
            })?;
        self.log_stats(&stats);
        Ok(records)
    }

    fn log_stats(&self, stats: &FilterStats) {
        debug!(
            "Decoded {} row changes ({} other tables, {} matched); skipped {} entries",
            stats.decoded, stats.other_tables, stats.matched, stats.skipped
        );
        if stats.partial > 0 {
            warn!(
                "{} of {} changes of {} kept with an incomplete column list",
                stats.partial, stats.matched, self.config.target
            );
        }
    }
}
