//! Pipeline errors

use thiserror::Error;

/// Serializing a batch failed before anything was sent to the sink
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("failed to serialize columns to JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write CSV: {0}")]
    Csv(#[from] csv::Error),
}

/// The sink rejected a batch
#[derive(Debug, Error)]
#[error("failed to write batch to {location}")]
pub struct SinkWriteError {
    pub key: String,
    /// Human readable destination
    pub location: String,
    pub source: anyhow::Error,
}

/// Failure of [`crate::BatchWriter::write_batch`]
#[derive(Debug, Error)]
pub enum WriteError {
    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error(transparent)]
    Sink(#[from] SinkWriteError),
}

/// Failure of one pipeline cycle
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Reading the slot failed.
    ///
    /// Usually nothing was consumed. The server advances the slot while the
    /// fetch query runs, so a connection lost mid-result can still have
    /// consumed entries that were never received.
    #[error("failed to fetch changes from slot {slot}")]
    SlotFetch {
        slot: String,
        source: anyhow::Error,
    },

    /// Entries were consumed from the slot but their batch was not written.
    ///
    /// Those changes are gone: the slot will not deliver them again.
    #[error(
        "failed to write batch {key} after consuming {entries_fetched} entries; \
         {records_lost} records lost"
    )]
    SinkWrite {
        entries_fetched: usize,
        records_lost: usize,
        key: String,
        source: SinkWriteError,
    },

    /// Serialization failed after `entries_fetched` entries were read
    #[error("failed to encode batch of {entries_fetched} entries")]
    Encode {
        entries_fetched: usize,
        source: EncodeError,
    },
}
