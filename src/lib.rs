//! cdc-bronze
//!
//! Moves row changes of one PostgreSQL table from a logical replication slot
//! using the `test_decoding` plugin into CSV batches on object storage.
//!
//! # Cycle
//!
//! 1. Fetch up to a limit of pending changes from the slot, advancing it
//! 2. Decode each line; lines that are not row changes are skipped
//! 3. Keep the changes of the target table
//! 4. Write them as one CSV object below a `data=YYYYMMDD` partition
//!
//! A slot cannot be rewound. Changes fetched in step 1 are lost if step 4
//! fails, so delivery is at most once.
//!
//! # Crates
//!
//! - `cdc_bronze_test_decoding` - test_decoding line decoder
//! - `cdc_bronze_postgresql_test_decoding_source` - slot reader
//! - `cdc_bronze_object_sink` - S3, local and in-memory sinks
//!
//! # CLI Usage
//!
//! ```bash
//! # Capture one batch into MinIO
//! cdc-bronze run --slot data_sync_slot --schema db_loja --table cliente \
//!   --s3-endpoint http://minio:9000 --bucket raw
//!
//! # Show pending changes without consuming them
//! cdc-bronze peek --slot data_sync_slot
//! ```

pub mod clock;
pub mod config;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod record;
pub mod writer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{PipelineConfig, SinkConfig};
pub use error::{EncodeError, PipelineError, SinkWriteError, WriteError};
pub use filter::{decode_entries, ChangeSetFilter, FilterStats};
pub use pipeline::{CycleOutcome, CycleResult, Pipeline};
pub use record::CapturedRecord;
pub use writer::{encode_csv, BatchWriter, CSV_HEADER};

pub use cdc_bronze_object_sink as object_sink;
pub use cdc_bronze_postgresql_test_decoding_source as source;
pub use cdc_bronze_test_decoding as test_decoding;
