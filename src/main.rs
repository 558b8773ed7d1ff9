//! Command-line interface for cdc-bronze
//!
//! # Usage Examples
//!
//! ```bash
//! # One capture cycle into MinIO, configured from the environment
//! PGHOST=db CDC_SLOT_NAME=data_sync_slot MINIO_ENDPOINT=http://minio:9000 \
//!   cdc-bronze run
//!
//! # One capture cycle into a local directory
//! cdc-bronze run --sink local --local-root ./bronze --table cliente
//!
//! # Pending changes of the target table as CSV, slot left untouched
//! cdc-bronze peek --slot data_sync_slot
//! ```
//!
//! The process exits with status 1 when a cycle fails. A failed write after
//! a successful fetch is logged at error level with the number of lost
//! changes. A `run` cycle that hits its timeout after the fetch started may
//! also have consumed changes that were never written.

use anyhow::Context;
use cdc_bronze::config::cli::{CaptureOpts, PostgresOpts, SinkKind, SinkOpts};
use cdc_bronze::object_sink::{LocalSink, MemorySink, ObjectSink, S3Sink};
use cdc_bronze::source::{ChangeSource, PgSlotSource};
use cdc_bronze::{encode_csv, CycleResult, Pipeline, SinkConfig, SystemClock};
use clap::{Parser, Subcommand};
use std::future::Future;
use std::io::Write;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "cdc-bronze")]
#[command(about = "Capture PostgreSQL test_decoding changes into CSV batches on object storage")]
#[command(long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Consume one batch from the slot and write the target table's changes
    Run {
        #[command(flatten)]
        postgres: PostgresOpts,

        #[command(flatten)]
        capture: CaptureOpts,

        #[command(flatten)]
        sink: SinkOpts,
    },

    /// Print pending changes of the target table as CSV without consuming them
    Peek {
        #[command(flatten)]
        postgres: PostgresOpts,

        #[command(flatten)]
        capture: CaptureOpts,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            postgres,
            capture,
            sink,
        } => {
            let timeout = capture.cycle_timeout;
            let result = within(timeout, Slot::Consumed, run_capture(postgres, capture, sink)).await?;
            tracing::info!(
                "Cycle finished: {:?}, {} entries fetched, {} records written",
                result.outcome,
                result.entries_fetched,
                result.records_written
            );
        }
        Commands::Peek { postgres, capture } => {
            let timeout = capture.cycle_timeout;
            within(timeout, Slot::Untouched, run_peek(postgres, capture)).await?;
        }
    }

    Ok(())
}

/// Whether a cycle advances the slot it reads
#[derive(Clone, Copy)]
enum Slot {
    Consumed,
    Untouched,
}

async fn within<T>(
    timeout: Duration,
    slot: Slot,
    cycle: impl Future<Output = anyhow::Result<T>>,
) -> anyhow::Result<T> {
    tokio::time::timeout(timeout, cycle).await.with_context(|| {
        let message = format!("Cycle did not finish within {}s", timeout.as_secs_f64());
        match slot {
            Slot::Consumed => format!(
                "{message}; changes already fetched from the slot may have been \
                 consumed without being written"
            ),
            Slot::Untouched => message,
        }
    })?
}

async fn connect_source(postgres: &PostgresOpts, slot: &str) -> anyhow::Result<PgSlotSource> {
    let source = PgSlotSource::connect(&postgres.connection_string()).await?;
    source.ensure_test_decoding_slot(slot).await?;
    Ok(source)
}

async fn run_capture(
    postgres: PostgresOpts,
    capture: CaptureOpts,
    sink: SinkOpts,
) -> anyhow::Result<CycleResult> {
    let config = capture.pipeline_config(SinkConfig::from(&sink));
    let source = connect_source(&postgres, &config.slot_name).await?;

    match sink.sink {
        SinkKind::S3 => {
            let object_sink = S3Sink::new(&sink.s3_config())
                .await
                .context("Failed to create S3 sink")?;
            run_cycle(Pipeline::new(config, source, object_sink, SystemClock)).await
        }
        SinkKind::Local => {
            let object_sink = LocalSink::new(&sink.local_root);
            run_cycle(Pipeline::new(config, source, object_sink, SystemClock)).await
        }
    }
}

async fn run_cycle<C: ChangeSource, S: ObjectSink>(
    pipeline: Pipeline<C, S>,
) -> anyhow::Result<CycleResult> {
    Ok(pipeline.run_cycle().await?)
}

async fn run_peek(postgres: PostgresOpts, capture: CaptureOpts) -> anyhow::Result<()> {
    let config = capture.pipeline_config(SinkConfig::default());
    let source = connect_source(&postgres, &config.slot_name).await?;
    let pipeline = Pipeline::new(config, source, MemorySink::new(), SystemClock);

    let records = pipeline.preview().await?;
    let body = encode_csv(&records)?;
    std::io::stdout()
        .write_all(&body)
        .context("Failed to write to stdout")?;
    Ok(())
}
