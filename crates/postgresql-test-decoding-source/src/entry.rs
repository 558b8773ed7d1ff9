use crate::lsn::Lsn;

/// One row returned by `pg_logical_slot_get_changes`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawChangeEntry {
    /// Position of the change in the WAL stream
    pub lsn: Lsn,
    /// Transaction id the change belongs to
    pub xid: i64,
    /// test_decoding output line
    pub payload: String,
}

impl RawChangeEntry {
    pub fn new(lsn: Lsn, xid: i64, payload: impl Into<String>) -> Self {
        Self {
            lsn,
            xid,
            payload: payload.into(),
        }
    }
}
