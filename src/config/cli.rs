//! Command-line option groups
//!
//! Every option also reads from an environment variable so the binary can be
//! configured entirely from a container's environment.

use super::{
    parse_duration, PipelineConfig, SinkConfig, DEFAULT_BASE_PATH, DEFAULT_BUCKET,
    DEFAULT_FILE_PREFIX, DEFAULT_SCHEMA, DEFAULT_SLOT_NAME, DEFAULT_TABLE,
};
use cdc_bronze_object_sink::S3SinkConfig;
use cdc_bronze_test_decoding::TableRef;
use clap::{Parser, ValueEnum};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Clone, Debug)]
pub struct PostgresOpts {
    /// Full connection string; overrides the individual --pg-* options
    #[arg(long, env = "PG_CONNECTION_STRING")]
    pub connection_string: Option<String>,

    #[arg(long, default_value = "db", env = "PGHOST")]
    pub pg_host: String,

    #[arg(long, default_value = "5432", env = "PGPORT")]
    pub pg_port: u16,

    #[arg(long, default_value = "mydb", env = "PGDATABASE")]
    pub pg_database: String,

    #[arg(long, default_value = "myuser", env = "PGUSER")]
    pub pg_user: String,

    #[arg(long, default_value = "mypassword", env = "PGPASSWORD", hide_env_values = true)]
    pub pg_password: String,
}

impl PostgresOpts {
    /// Connection string in libpq key/value form
    pub fn connection_string(&self) -> String {
        if let Some(connection_string) = &self.connection_string {
            return connection_string.clone();
        }
        format!(
            "host={} port={} dbname={} user={} password={}",
            quote_conninfo(&self.pg_host),
            self.pg_port,
            quote_conninfo(&self.pg_database),
            quote_conninfo(&self.pg_user),
            quote_conninfo(&self.pg_password),
        )
    }
}

/// Single-quote a conninfo value, escaping `\` and `'`
fn quote_conninfo(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('\'', "\\'");
    format!("'{escaped}'")
}

#[derive(Parser, Clone, Debug)]
pub struct CaptureOpts {
    /// Logical replication slot created with the test_decoding plugin
    #[arg(long, default_value = DEFAULT_SLOT_NAME, env = "CDC_SLOT_NAME")]
    pub slot: String,

    /// Maximum number of changes requested per cycle
    #[arg(long, default_value = "1000", env = "CDC_BATCH_LIMIT")]
    pub batch_limit: NonZeroU32,

    /// Schema of the captured table
    #[arg(long, default_value = DEFAULT_SCHEMA, env = "PGSCHEMA")]
    pub schema: String,

    /// Captured table
    #[arg(long, default_value = DEFAULT_TABLE, env = "CDC_TARGET_TABLE")]
    pub table: String,

    /// Upper bound on one whole cycle, e.g. "300s", "5m"
    #[arg(long, default_value = "300s", env = "CDC_CYCLE_TIMEOUT", value_parser = parse_duration)]
    pub cycle_timeout: Duration,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SinkKind {
    /// S3 or an S3-compatible store such as MinIO
    S3,
    /// A directory on the local filesystem
    Local,
}

#[derive(Parser, Clone, Debug)]
pub struct SinkOpts {
    #[arg(long, value_enum, default_value = "s3", env = "CDC_SINK")]
    pub sink: SinkKind,

    #[arg(long, default_value = DEFAULT_BUCKET, env = "CDC_BUCKET")]
    pub bucket: String,

    /// Key prefix for all batches
    #[arg(long, default_value = DEFAULT_BASE_PATH, env = "CDC_BASE_PATH")]
    pub base_path: String,

    /// File name prefix for all batches
    #[arg(long = "prefix", default_value = DEFAULT_FILE_PREFIX, env = "CDC_FILE_PREFIX")]
    pub file_prefix: String,

    #[arg(long, default_value = "http://minio:9000", env = "MINIO_ENDPOINT")]
    pub s3_endpoint: String,

    #[arg(long, default_value = "minioadmin", env = "MINIO_ACCESS_KEY")]
    pub s3_access_key: String,

    #[arg(long, default_value = "minioadmin", env = "MINIO_SECRET_KEY", hide_env_values = true)]
    pub s3_secret_key: String,

    #[arg(long, default_value = "us-east-1", env = "CDC_S3_REGION")]
    pub s3_region: String,

    /// Root directory for --sink local; buckets become sub-directories
    #[arg(long, default_value = "./bronze", env = "CDC_LOCAL_ROOT")]
    pub local_root: PathBuf,
}

impl SinkOpts {
    pub fn s3_config(&self) -> S3SinkConfig {
        S3SinkConfig {
            endpoint: Some(self.s3_endpoint.clone()),
            region: self.s3_region.clone(),
            access_key: Some(self.s3_access_key.clone()),
            secret_key: Some(self.s3_secret_key.clone()),
            force_path_style: true,
        }
    }
}

impl From<&SinkOpts> for SinkConfig {
    fn from(opts: &SinkOpts) -> Self {
        Self {
            bucket: opts.bucket.clone(),
            base_path: opts.base_path.clone(),
            table_prefix: opts.file_prefix.clone(),
        }
    }
}

impl CaptureOpts {
    /// Pipeline configuration writing to `sink`
    pub fn pipeline_config(&self, sink: SinkConfig) -> PipelineConfig {
        PipelineConfig {
            slot_name: self.slot.clone(),
            max_entries: self.batch_limit,
            target: TableRef::new(&self.schema, &self.table),
            sink,
        }
    }
}
