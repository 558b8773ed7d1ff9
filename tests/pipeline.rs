//! Capture cycles against an in-memory slot and sink

use anyhow::Result;
use cdc_bronze::object_sink::{LocalSink, MemorySink};
use cdc_bronze::source::{ChangeSource, Lsn, RawChangeEntry};
use cdc_bronze::test_decoding::TableRef;
use cdc_bronze::{CycleOutcome, FixedClock, Pipeline, PipelineConfig, PipelineError, CSV_HEADER};
use chrono::{DateTime, Local, NaiveDate, TimeZone};
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A slot holding a fixed list of entries
///
/// Every fetch drains everything pending regardless of the limit, which is
/// what the server does when all entries belong to one transaction.
#[derive(Clone, Default)]
struct ScriptedSlot {
    pending: Arc<Mutex<Vec<RawChangeEntry>>>,
    failure: Option<String>,
    fetches: Arc<AtomicUsize>,
}

impl ScriptedSlot {
    fn with_lines(lines: &[&str]) -> Self {
        let entries = lines
            .iter()
            .enumerate()
            .map(|(i, line)| RawChangeEntry::new(Lsn::new(0x1949850 + i as u64 * 0x38), 740, *line))
            .collect();
        Self {
            pending: Arc::new(Mutex::new(entries)),
            ..Self::default()
        }
    }

    fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::default()
        }
    }

    fn pending(&self) -> usize {
        self.pending.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl ChangeSource for ScriptedSlot {
    async fn fetch_and_advance(
        &self,
        _slot_name: &str,
        _max_entries: NonZeroU32,
    ) -> Result<Vec<RawChangeEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }
        Ok(std::mem::take(&mut *self.pending.lock().unwrap()))
    }

    async fn peek(&self, _slot_name: &str, _max_entries: NonZeroU32) -> Result<Vec<RawChangeEntry>> {
        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }
        Ok(self.pending.lock().unwrap().clone())
    }
}

fn batch_time() -> DateTime<Local> {
    let naive = NaiveDate::from_ymd_opt(2024, 1, 2)
        .unwrap()
        .and_hms_micro_opt(3, 4, 5, 6)
        .unwrap();
    Local.from_local_datetime(&naive).single().unwrap()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        max_entries: NonZeroU32::new(2).unwrap(),
        ..PipelineConfig::default()
    }
}

const EXPECTED_KEY: &str = "inc/data=20240102/cliente_cdc_20240102_030405.csv";

const SESSION: &[&str] = &[
    "BEGIN 740",
    "table db_loja.cliente: INSERT: id[integer]:1 nome[character varying]:'Ana Maria' email[text]:'ana@x.com'",
    "table db_loja.pedido: INSERT: id[integer]:10 total[numeric]:199.90",
    "table db_loja.cliente: UPDATE: id[integer]:1 nome[character varying]:'Ana' email[text]:'ana@x.com'",
    "table db_loja.cliente: DELETE: id[integer]:1",
    "COMMIT 740",
];

#[tokio::test]
async fn test_empty_slot_writes_nothing() {
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(
        config(),
        ScriptedSlot::default(),
        sink.clone(),
        FixedClock::new(batch_time()),
    );

    let result = pipeline.run_cycle().await.unwrap();
    assert_eq!(result.outcome, CycleOutcome::NoEntries);
    assert_eq!(result.entries_fetched, 0);
    assert_eq!(result.destination, None);
    assert!(sink.objects().is_empty());
}

#[tokio::test]
async fn test_no_matching_table_writes_nothing() {
    let slot = ScriptedSlot::with_lines(&[
        "BEGIN 741",
        "table db_loja.pedido: INSERT: id[integer]:11",
        "COMMIT 741",
    ]);
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config(), slot.clone(), sink.clone(), FixedClock::new(batch_time()));

    let result = pipeline.run_cycle().await.unwrap();
    assert_eq!(result.outcome, CycleOutcome::NoMatches);
    assert_eq!(result.entries_fetched, 3);
    assert_eq!(result.records_written, 0);
    assert!(sink.objects().is_empty());
    // The entries were consumed all the same
    assert_eq!(slot.pending(), 0);
}

#[tokio::test]
async fn test_matches_become_one_csv_object() {
    let slot = ScriptedSlot::with_lines(SESSION);
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config(), slot.clone(), sink.clone(), FixedClock::new(batch_time()));

    let result = pipeline.run_cycle().await.unwrap();

    // All six entries are kept even though the limit is two
    assert_eq!(result.entries_fetched, 6);
    assert_eq!(result.records_written, 3);
    assert_eq!(result.outcome, CycleOutcome::Written);
    assert_eq!(result.destination.as_deref(), Some(EXPECTED_KEY));

    let objects = sink.objects();
    assert_eq!(objects.len(), 1);
    assert_eq!(objects[0].bucket, "raw");
    assert_eq!(objects[0].key, EXPECTED_KEY);
    assert_eq!(objects[0].content_type, "text/csv");

    let text = String::from_utf8(objects[0].body.clone()).unwrap();
    assert_eq!(text.lines().count(), 4);

    let mut reader = csv::Reader::from_reader(objects[0].body.as_slice());
    let headers = reader.headers().unwrap().clone();
    assert_eq!(headers.iter().collect::<Vec<_>>(), CSV_HEADER);

    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    let positions: Vec<(&str, &str)> = rows.iter().map(|r| (&r[1], &r[2])).collect();
    assert_eq!(
        positions,
        vec![
            ("0/1949888", "INSERT"),
            ("0/19498F8", "UPDATE"),
            ("0/1949930", "DELETE"),
        ]
    );
    assert!(rows.iter().all(|r| &r[0] == "2024-01-02T03:04:05.000006"));
    assert_eq!(
        &rows[0][3],
        r#"{"id":"1","nome":"Ana Maria","email":"ana@x.com"}"#
    );
    assert_eq!(&rows[2][3], r#"{"id":"1"}"#);
}

#[tokio::test]
async fn test_unsplittable_value_still_reaches_the_batch() {
    let slot = ScriptedSlot::with_lines(&[
        "BEGIN 742",
        "table db_loja.cliente: DELETE: id[integer]:7 obs[text]:'vide item[2] abaixo'",
        "COMMIT 742",
    ]);
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config(), slot, sink.clone(), FixedClock::new(batch_time()));

    let result = pipeline.run_cycle().await.unwrap();
    assert_eq!(result.outcome, CycleOutcome::Written);
    assert_eq!(result.records_written, 1);

    let objects = sink.objects();
    let mut reader = csv::Reader::from_reader(objects[0].body.as_slice());
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
    assert_eq!(rows.len(), 1);
    assert_eq!(&rows[0][2], "DELETE");
    assert_eq!(&rows[0][3], r#"{"id":"7","obs":"'vide"}"#);
}

#[tokio::test]
async fn test_fetch_failure_is_fatal() {
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(
        config(),
        ScriptedSlot::failing("connection refused"),
        sink.clone(),
        FixedClock::new(batch_time()),
    );

    let err = pipeline.run_cycle().await.unwrap_err();
    let PipelineError::SlotFetch { slot, source } = &err else {
        panic!("expected a fetch error, got {err:?}");
    };
    assert_eq!(slot, "data_sync_slot");
    assert_eq!(source.to_string(), "connection refused");
    assert!(sink.objects().is_empty());
}

#[tokio::test]
async fn test_sink_failure_reports_lost_changes() {
    let slot = ScriptedSlot::with_lines(SESSION);
    let pipeline = Pipeline::new(
        config(),
        slot.clone(),
        MemorySink::failing("bucket does not exist"),
        FixedClock::new(batch_time()),
    );

    let err = pipeline.run_cycle().await.unwrap_err();
    let PipelineError::SinkWrite {
        entries_fetched,
        records_lost,
        key,
        ..
    } = &err
    else {
        panic!("expected a write error, got {err:?}");
    };
    assert_eq!(*entries_fetched, 6);
    assert_eq!(*records_lost, 3);
    assert_eq!(key, EXPECTED_KEY);
    assert!(err.to_string().contains("3 records lost"));

    // The slot has moved past the batch; nothing is redelivered
    assert_eq!(slot.pending(), 0);
    assert_eq!(slot.fetches.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_preview_leaves_slot_and_sink_untouched() {
    let slot = ScriptedSlot::with_lines(SESSION);
    let sink = MemorySink::new();
    let pipeline = Pipeline::new(config(), slot.clone(), sink.clone(), FixedClock::new(batch_time()));

    let records = pipeline.preview().await.unwrap();
    assert_eq!(records.len(), 3);
    assert_eq!(slot.pending(), 6);
    assert_eq!(slot.fetches.load(Ordering::SeqCst), 0);
    assert!(sink.objects().is_empty());
}

#[tokio::test]
async fn test_other_target_table() {
    let slot = ScriptedSlot::with_lines(SESSION);
    let sink = MemorySink::new();
    let mut config = config();
    config.target = TableRef::new("db_loja", "pedido");
    config.sink.table_prefix = "pedido_cdc".to_string();
    let pipeline = Pipeline::new(config, slot, sink.clone(), FixedClock::new(batch_time()));

    let result = pipeline.run_cycle().await.unwrap();
    assert_eq!(result.records_written, 1);
    assert_eq!(
        result.destination.as_deref(),
        Some("inc/data=20240102/pedido_cdc_20240102_030405.csv")
    );

    let body = String::from_utf8(sink.objects()[0].body.clone()).unwrap();
    assert!(body.contains(r#"""total"":""199.90"""#));
}

#[tokio::test]
async fn test_local_sink_cycle() {
    let root = tempfile::TempDir::new().unwrap();
    let slot = ScriptedSlot::with_lines(SESSION);
    let pipeline = Pipeline::new(
        config(),
        slot,
        LocalSink::new(root.path()),
        FixedClock::new(batch_time()),
    );

    pipeline.run_cycle().await.unwrap();

    let path = root.path().join("raw").join(EXPECTED_KEY);
    let body = std::fs::read_to_string(path).unwrap();
    assert!(body.starts_with("capture_ts,log_position,op,columns\n"));
    assert_eq!(body.lines().count(), 4);
}
