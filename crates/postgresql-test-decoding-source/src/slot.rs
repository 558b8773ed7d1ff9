//! Slot reader over a regular PostgreSQL connection
//!
//! Uses `pg_logical_slot_get_changes` (consuming) and
//! `pg_logical_slot_peek_changes` (non-consuming) with the test_decoding
//! options `include-xids` and `skip-empty-xacts` enabled, so transactions that
//! touched no rows never show up as BEGIN/COMMIT pairs.

use crate::entry::RawChangeEntry;
use crate::lsn::Lsn;
use crate::source::ChangeSource;
use anyhow::{Context, Result};
use std::num::NonZeroU32;
use tokio_postgres::{Client as PgClient, NoTls, Row};
use tracing::{debug, error, info};

/// Output plugin name the slot must have been created with
pub const TEST_DECODING_PLUGIN: &str = "test_decoding";

const GET_CHANGES_QUERY: &str = "SELECT lsn::text, xid::text::bigint, data \
     FROM pg_logical_slot_get_changes($1, NULL, $2, 'include-xids', '1', 'skip-empty-xacts', '1')";

const PEEK_CHANGES_QUERY: &str = "SELECT lsn::text, xid::text::bigint, data \
     FROM pg_logical_slot_peek_changes($1, NULL, $2, 'include-xids', '1', 'skip-empty-xacts', '1')";

const SLOT_PLUGIN_QUERY: &str = "SELECT plugin FROM pg_replication_slots WHERE slot_name = $1";

/// [`ChangeSource`] backed by a tokio-postgres connection
pub struct PgSlotSource {
    pg_client: PgClient,
}

impl PgSlotSource {
    /// Connects to PostgreSQL and spawns the connection driver task
    pub async fn connect(connection_string: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .context("Failed to connect to PostgreSQL")?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("PostgreSQL connection error: {e}");
            }
        });

        Ok(Self { pg_client: client })
    }

    /// Returns the output plugin of `slot_name`, or `None` if no such slot exists
    pub async fn slot_plugin(&self, slot_name: &str) -> Result<Option<String>> {
        let rows = self
            .pg_client
            .query(SLOT_PLUGIN_QUERY, &[&slot_name])
            .await
            .context("Failed to look up replication slot")?;

        match rows.first() {
            Some(row) => Ok(Some(row.try_get(0)?)),
            None => Ok(None),
        }
    }

    /// Fails unless `slot_name` exists and uses the test_decoding plugin
    pub async fn ensure_test_decoding_slot(&self, slot_name: &str) -> Result<()> {
        match self.slot_plugin(slot_name).await? {
            Some(plugin) if plugin == TEST_DECODING_PLUGIN => {
                debug!("Replication slot {slot_name} uses {plugin}");
                Ok(())
            }
            Some(plugin) => anyhow::bail!(
                "Replication slot '{slot_name}' uses the '{plugin}' plugin; \
                 a '{TEST_DECODING_PLUGIN}' slot is required"
            ),
            None => anyhow::bail!("Replication slot '{slot_name}' does not exist"),
        }
    }

    async fn query_changes(
        &self,
        query: &str,
        slot_name: &str,
        max_entries: NonZeroU32,
    ) -> Result<Vec<RawChangeEntry>> {
        let limit = i32::try_from(max_entries.get())
            .with_context(|| format!("Batch limit {max_entries} does not fit in an integer"))?;

        let rows = self
            .pg_client
            .query(query, &[&slot_name, &limit])
            .await
            .with_context(|| format!("Failed to read changes from replication slot '{slot_name}'"))?;

        let entries = rows
            .iter()
            .map(entry_from_row)
            .collect::<Result<Vec<_>>>()?;

        if entries.len() > max_entries.get() as usize {
            debug!(
                "Slot {slot_name} returned {} entries for a limit of {max_entries} (limit applies at transaction boundaries)",
                entries.len()
            );
        }

        Ok(entries)
    }
}

#[async_trait::async_trait]
impl ChangeSource for PgSlotSource {
    async fn fetch_and_advance(
        &self,
        slot_name: &str,
        max_entries: NonZeroU32,
    ) -> Result<Vec<RawChangeEntry>> {
        let entries = self
            .query_changes(GET_CHANGES_QUERY, slot_name, max_entries)
            .await?;
        match entries.last() {
            Some(last) => info!(
                "Consumed {} entries from slot {slot_name} up to LSN {}",
                entries.len(),
                last.lsn
            ),
            None => debug!("No pending changes on slot {slot_name}"),
        }
        Ok(entries)
    }

    async fn peek(&self, slot_name: &str, max_entries: NonZeroU32) -> Result<Vec<RawChangeEntry>> {
        let entries = self
            .query_changes(PEEK_CHANGES_QUERY, slot_name, max_entries)
            .await?;
        debug!("Peeked {} entries from slot {slot_name}", entries.len());
        Ok(entries)
    }
}

fn entry_from_row(row: &Row) -> Result<RawChangeEntry> {
    let lsn: String = row.try_get(0)?;
    let xid: i64 = row.try_get(1)?;
    let payload: String = row.try_get(2)?;
    let lsn = lsn
        .parse::<Lsn>()
        .with_context(|| format!("Replication slot returned an unparseable LSN for xid {xid}"))?;
    Ok(RawChangeEntry { lsn, xid, payload })
}
