//! Serializing batches to CSV and storing them
//!
//! A batch becomes exactly one object:
//!
//! ```text
//! <bucket>/<base_path>data=YYYYMMDD/<prefix>_YYYYMMDD_HHMMSS.csv
//! ```
//!
//! The date partition and the file stamp come from the batch time, in the
//! process's local time zone. Two batches written within the same second
//! map to the same key and the later one replaces the earlier.

use crate::config::SinkConfig;
use crate::error::{EncodeError, SinkWriteError, WriteError};
use crate::record::CapturedRecord;
use cdc_bronze_object_sink::{ObjectSink, CSV_CONTENT_TYPE};
use chrono::{DateTime, Local};
use serde::Serialize;

/// Columns of every batch file, in order
pub const CSV_HEADER: [&str; 4] = ["capture_ts", "log_position", "op", "columns"];

#[derive(Serialize)]
struct CsvRow<'a> {
    capture_ts: String,
    log_position: String,
    op: &'a str,
    columns: &'a str,
}

/// Writes batches of [`CapturedRecord`]s to an [`ObjectSink`]
pub struct BatchWriter<S> {
    sink: S,
    config: SinkConfig,
}

impl<S: ObjectSink> BatchWriter<S> {
    pub fn new(sink: S, config: SinkConfig) -> Self {
        Self { sink, config }
    }

    /// Object key of a batch written at `batch_time`
    pub fn object_key(&self, batch_time: &DateTime<Local>) -> String {
        format!(
            "{}data={}/{}_{}.csv",
            self.config.normalized_base_path(),
            batch_time.format("%Y%m%d"),
            self.config.table_prefix,
            batch_time.format("%Y%m%d_%H%M%S"),
        )
    }

    /// Human readable destination of `key`
    pub fn location(&self, key: &str) -> String {
        self.sink.display_location(&self.config.bucket, key)
    }

    /// Store `records` as one CSV object and return its key.
    ///
    /// An empty batch is not written and yields `None`.
    pub async fn write_batch(
        &self,
        records: &[CapturedRecord],
        batch_time: DateTime<Local>,
    ) -> Result<Option<String>, WriteError> {
        if records.is_empty() {
            return Ok(None);
        }

        let body = encode_csv(records)?;
        let key = self.object_key(&batch_time);
        let size = body.len();

        self.sink
            .put_object(&self.config.bucket, &key, body, CSV_CONTENT_TYPE)
            .await
            .map_err(|source| SinkWriteError {
                location: self.location(&key),
                key: key.clone(),
                source,
            })?;

        tracing::debug!(
            "Wrote {} records ({size} bytes) to {}",
            records.len(),
            self.location(&key)
        );
        Ok(Some(key))
    }
}

/// Serialize records to CSV with a header line
pub fn encode_csv(records: &[CapturedRecord]) -> Result<Vec<u8>, EncodeError> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());

    writer.write_record(CSV_HEADER)?;
    for record in records {
        writer.serialize(CsvRow {
            capture_ts: record.capture_ts(),
            log_position: record.log_position.to_string(),
            op: record.operation.as_str(),
            columns: &record.columns_json,
        })?;
    }

    writer
        .into_inner()
        .map_err(|e| EncodeError::Csv(csv::Error::from(e.into_error())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdc_bronze_object_sink::MemorySink;
    use cdc_bronze_postgresql_test_decoding_source::Lsn;
    use cdc_bronze_test_decoding::Operation;
    use chrono::{NaiveDate, TimeZone};

    fn batch_time() -> DateTime<Local> {
        let naive = NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_micro_opt(3, 4, 5, 123_456)
            .unwrap();
        Local.from_local_datetime(&naive).single().unwrap()
    }

    fn record(lsn: u64, operation: Operation, columns_json: &str) -> CapturedRecord {
        CapturedRecord {
            capture_timestamp: batch_time(),
            log_position: Lsn::new(lsn),
            operation,
            columns_json: columns_json.to_string(),
        }
    }

    #[test]
    fn test_object_key() {
        let writer = BatchWriter::new(MemorySink::new(), SinkConfig::default());
        assert_eq!(
            writer.object_key(&batch_time()),
            "inc/data=20240102/cliente_cdc_20240102_030405.csv"
        );

        let writer = BatchWriter::new(
            MemorySink::new(),
            SinkConfig {
                base_path: "bronze/inc".to_string(),
                ..SinkConfig::default()
            },
        );
        assert_eq!(
            writer.object_key(&batch_time()),
            "bronze/inc/data=20240102/cliente_cdc_20240102_030405.csv"
        );
    }

    #[test]
    fn test_encode_csv_quotes_json() {
        let body = encode_csv(&[
            record(0x1949850, Operation::Insert, r#"{"id":"1","nome":"Ana"}"#),
            record(0x1949900, Operation::Delete, r#"{"id":"1"}"#),
        ])
        .unwrap();

        let text = String::from_utf8(body).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "capture_ts,log_position,op,columns",
                r#"2024-01-02T03:04:05.123456,0/1949850,INSERT,"{""id"":""1"",""nome"":""Ana""}""#,
                r#"2024-01-02T03:04:05.123456,0/1949900,DELETE,"{""id"":""1""}""#,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_batch_single_put() {
        let sink = MemorySink::new();
        let writer = BatchWriter::new(sink.clone(), SinkConfig::default());

        let key = writer
            .write_batch(
                &[record(1, Operation::Update, r#"{"id":"2"}"#)],
                batch_time(),
            )
            .await
            .unwrap()
            .unwrap();

        let objects = sink.objects();
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].bucket, "raw");
        assert_eq!(objects[0].key, key);
        assert_eq!(objects[0].content_type, "text/csv");

        let text = String::from_utf8(objects[0].body.clone()).unwrap();
        assert_eq!(
            text.lines().collect::<Vec<_>>(),
            vec![
                "capture_ts,log_position,op,columns",
                r#"2024-01-02T03:04:05.123456,0/1,UPDATE,"{""id"":""2""}""#,
            ]
        );
    }

    #[tokio::test]
    async fn test_write_empty_batch_is_noop() {
        let sink = MemorySink::failing("must not be called");
        let writer = BatchWriter::new(sink.clone(), SinkConfig::default());
        assert!(writer.write_batch(&[], batch_time()).await.unwrap().is_none());
        assert!(sink.objects().is_empty());
    }

    #[tokio::test]
    async fn test_write_batch_sink_failure() {
        let writer = BatchWriter::new(MemorySink::failing("access denied"), SinkConfig::default());
        let err = writer
            .write_batch(&[record(1, Operation::Insert, "{}")], batch_time())
            .await
            .unwrap_err();

        let WriteError::Sink(sink_err) = &err else {
            panic!("expected a sink error, got {err:?}");
        };
        assert_eq!(sink_err.key, "inc/data=20240102/cliente_cdc_20240102_030405.csv");
        assert_eq!(
            sink_err.location,
            "memory://raw/inc/data=20240102/cliente_cdc_20240102_030405.csv"
        );
        assert_eq!(sink_err.source.to_string(), "access denied");
    }
}
