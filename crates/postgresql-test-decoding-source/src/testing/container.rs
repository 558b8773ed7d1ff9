//! Throwaway PostgreSQL server in Docker
//!
//! `test_decoding` ships with PostgreSQL, so the stock image works as long
//! as the server runs with `wal_level=logical`.

use crate::lsn::Lsn;
use anyhow::{Context, Result};
use std::process::{Command, Output};
use std::time::{Duration, Instant};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, info};

/// Image used unless `CDC_BRONZE_TEST_PG_IMAGE` overrides it
pub const DEFAULT_IMAGE: &str = "postgres:16";

const READY_TIMEOUT: Duration = Duration::from_secs(30);

/// A running container, removed on drop
pub struct PostgresContainer {
    name: String,
    connection_string: String,
}

fn docker(args: &[&str]) -> Result<Output> {
    Command::new("docker")
        .args(args)
        .output()
        .with_context(|| format!("Failed to run docker {}", args.first().unwrap_or(&"")))
}

impl PostgresContainer {
    /// Run a fresh server on `host_port` and wait until it accepts queries.
    ///
    /// A leftover container with the same name is removed first.
    pub async fn start(name: &str, host_port: u16) -> Result<Self> {
        let image =
            std::env::var("CDC_BRONZE_TEST_PG_IMAGE").unwrap_or_else(|_| DEFAULT_IMAGE.to_string());
        let _ = docker(&["rm", "-f", name]);

        let port_mapping = format!("{host_port}:5432");
        let output = docker(&[
            "run",
            "-d",
            "--name",
            name,
            "-e",
            "POSTGRES_PASSWORD=postgres",
            "-e",
            "POSTGRES_DB=testdb",
            "-p",
            &port_mapping,
            &image,
            "-c",
            "wal_level=logical",
        ])?;
        if !output.status.success() {
            anyhow::bail!(
                "docker run {image} failed: {}",
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        info!("Started {image} as {name} on port {host_port}");

        let container = Self {
            name: name.to_string(),
            connection_string: format!(
                "host=localhost port={host_port} user=postgres password=postgres dbname=testdb"
            ),
        };
        container.wait_until_ready().await?;
        Ok(container)
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    /// A new connection with its driver task already spawned
    pub async fn client(&self) -> Result<Client> {
        let (client, connection) = tokio_postgres::connect(&self.connection_string, NoTls)
            .await
            .with_context(|| format!("Failed to connect to {}", self.name))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                debug!("Test connection closed: {e}");
            }
        });
        Ok(client)
    }

    async fn wait_until_ready(&self) -> Result<()> {
        let started = Instant::now();
        loop {
            let attempt = match self.client().await {
                Ok(client) => client
                    .simple_query("SELECT 1")
                    .await
                    .map(|_| ())
                    .map_err(anyhow::Error::from),
                Err(e) => Err(e),
            };
            match attempt {
                Ok(()) => return Ok(()),
                Err(e) if started.elapsed() < READY_TIMEOUT => {
                    debug!("{} not ready yet: {e:#}", self.name);
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "{} not ready after {}s",
                        self.name,
                        READY_TIMEOUT.as_secs()
                    )))
                }
            }
        }
    }

    /// Create a test_decoding slot and return the position it starts from
    pub async fn create_slot(&self, slot_name: &str) -> Result<Lsn> {
        let row = self
            .client()
            .await?
            .query_one(
                "SELECT lsn::text FROM pg_create_logical_replication_slot($1, 'test_decoding')",
                &[&slot_name],
            )
            .await
            .with_context(|| format!("Failed to create replication slot {slot_name}"))?;
        let lsn: String = row.try_get(0)?;
        Ok(lsn.parse::<Lsn>()?)
    }
}

impl Drop for PostgresContainer {
    fn drop(&mut self) {
        match docker(&["rm", "-f", &self.name]) {
            Ok(output) if output.status.success() => debug!("Removed container {}", self.name),
            Ok(output) => debug!(
                "Could not remove container {}: {}",
                self.name,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
            Err(e) => debug!("Could not remove container {}: {e:#}", self.name),
        }
    }
}
