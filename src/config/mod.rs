//! Pipeline configuration
//!
//! [`PipelineConfig`] is what the pipeline runs with. The clap option groups
//! in [`cli`] read the same settings from flags or environment variables and
//! convert into it.

pub mod cli;
mod duration;

pub use duration::{parse_duration, parse_duration_to_secs};

use cdc_bronze_test_decoding::TableRef;
use std::num::NonZeroU32;

pub const DEFAULT_SLOT_NAME: &str = "data_sync_slot";
pub const DEFAULT_BATCH_LIMIT: u32 = 1000;
pub const DEFAULT_SCHEMA: &str = "db_loja";
pub const DEFAULT_TABLE: &str = "cliente";
pub const DEFAULT_BUCKET: &str = "raw";
pub const DEFAULT_BASE_PATH: &str = "inc/";
pub const DEFAULT_FILE_PREFIX: &str = "cliente_cdc";

/// Everything one capture cycle needs besides its collaborators
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Logical replication slot to consume
    pub slot_name: String,
    /// Upper bound passed to the slot fetch, applied per transaction
    pub max_entries: NonZeroU32,
    /// The only table whose changes are kept
    pub target: TableRef,
    pub sink: SinkConfig,
}

/// Where batches go
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkConfig {
    pub bucket: String,
    /// Key prefix below the bucket; may be empty
    pub base_path: String,
    /// File name prefix, e.g. `cliente_cdc`
    pub table_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            slot_name: DEFAULT_SLOT_NAME.to_string(),
            max_entries: NonZeroU32::new(DEFAULT_BATCH_LIMIT).unwrap_or(NonZeroU32::MIN),
            target: TableRef::new(DEFAULT_SCHEMA, DEFAULT_TABLE),
            sink: SinkConfig::default(),
        }
    }
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            bucket: DEFAULT_BUCKET.to_string(),
            base_path: DEFAULT_BASE_PATH.to_string(),
            table_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl SinkConfig {
    /// Base path with a trailing `/` when it is non-empty
    pub fn normalized_base_path(&self) -> String {
        if self.base_path.is_empty() || self.base_path.ends_with('/') {
            self.base_path.clone()
        } else {
            format!("{}/", self.base_path)
        }
    }
}
