//! PostgreSQL logical replication source for the `test_decoding` plugin
//!
//! Reads batches of raw change lines from an existing logical replication
//! slot using the SQL-level `pg_logical_slot_*_changes` functions over a
//! regular (non-replication) connection. Slots are never created or dropped
//! here; provisioning them is an operational concern.
//!
//! ```ignore
//! use cdc_bronze_postgresql_test_decoding_source::{ChangeSource, PgSlotSource};
//! use std::num::NonZeroU32;
//!
//! let source = PgSlotSource::connect("host=db user=myuser dbname=mydb").await?;
//! let entries = source
//!     .fetch_and_advance("data_sync_slot", NonZeroU32::new(1000).unwrap())
//!     .await?;
//! for entry in &entries {
//!     println!("{} {} {}", entry.lsn, entry.xid, entry.payload);
//! }
//! ```
//!
//! # Preconditions
//!
//! A replication slot supports a single reader. Running two fetchers against
//! the same slot at once is not guarded against here.

mod entry;
mod lsn;
mod slot;
mod source;

// Make testing module available for integration tests
#[doc(hidden)]
pub mod testing;

pub use entry::RawChangeEntry;
pub use lsn::{Lsn, LsnParseError};
pub use slot::{PgSlotSource, TEST_DECODING_PLUGIN};
pub use source::ChangeSource;
