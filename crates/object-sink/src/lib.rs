//! Object storage sinks
//!
//! Every sink stores a complete object in one call. There is no append or
//! multi-part API: an object either appears under its final key with its full
//! contents or does not appear at all.
//!
//! # Sink Types
//!
//! - **S3**: AWS S3 or an S3-compatible store such as MinIO ([`S3Sink`])
//! - **Local**: a directory tree, one sub-directory per bucket ([`LocalSink`])
//! - **Memory**: in-process, for tests and previews ([`MemorySink`])

mod local;
mod memory;
mod s3;

use anyhow::Result;

pub use local::LocalSink;
pub use memory::{MemorySink, StoredObject};
pub use s3::{S3Sink, S3SinkConfig};

/// Content type used for CSV batches
pub const CSV_CONTENT_TYPE: &str = "text/csv";

/// Destination for whole objects
#[async_trait::async_trait]
pub trait ObjectSink: Send + Sync {
    /// Store `body` as the object `key` in `bucket`.
    ///
    /// An existing object with the same key is replaced. Readers never see
    /// a partially written object under `key`.
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()>;

    /// Human readable location of an object, for logging
    fn display_location(&self, bucket: &str, key: &str) -> String {
        format!("{bucket}/{key}")
    }
}
