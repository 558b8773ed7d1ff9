//! Change source trait

use crate::entry::RawChangeEntry;
use anyhow::Result;
use std::num::NonZeroU32;

/// A logical replication slot that can be drained in bounded batches.
///
/// Implemented by [`crate::PgSlotSource`] for real servers; tests provide
/// in-memory implementations.
#[async_trait::async_trait]
pub trait ChangeSource: Send + Sync {
    /// Fetch up to `max_entries` pending changes and advance the slot.
    ///
    /// This is a destructive read. When it returns `Ok`, the slot's
    /// confirmed position has moved past every returned entry and they will
    /// never be delivered again, whatever the caller does with them. An empty
    /// vector means nothing is pending. An `Err` does not prove the slot is
    /// unchanged: the server may have advanced it before the result was lost.
    ///
    /// The server checks the limit only at transaction boundaries, so more
    /// than `max_entries` entries may be returned.
    async fn fetch_and_advance(
        &self,
        slot_name: &str,
        max_entries: NonZeroU32,
    ) -> Result<Vec<RawChangeEntry>>;

    /// Look at up to `max_entries` pending changes without consuming them.
    async fn peek(&self, slot_name: &str, max_entries: NonZeroU32) -> Result<Vec<RawChangeEntry>>;
}
