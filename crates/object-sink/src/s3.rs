//! S3 sink with support for S3-compatible endpoints

use crate::ObjectSink;
use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;

/// Connection settings for [`S3Sink`]
///
/// Fields left as `None` fall back to the regular AWS configuration chain
/// (environment variables, profile files, instance metadata).
#[derive(Debug, Clone)]
pub struct S3SinkConfig {
    /// Custom endpoint, e.g. `http://minio:9000`
    pub endpoint: Option<String>,
    /// Signing region; MinIO accepts any value
    pub region: String,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    /// Address buckets as `endpoint/bucket` instead of `bucket.endpoint`
    pub force_path_style: bool,
}

impl Default for S3SinkConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: "us-east-1".to_string(),
            access_key: None,
            secret_key: None,
            force_path_style: false,
        }
    }
}

/// Writes objects with a single `PutObject` request each
pub struct S3Sink {
    client: aws_sdk_s3::Client,
}

impl S3Sink {
    /// Create a new S3 sink
    pub async fn new(config: &S3SinkConfig) -> Result<Self> {
        let mut loader =
            aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            loader = loader.endpoint_url(endpoint);
        }

        match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => {
                loader = loader.credentials_provider(Credentials::new(
                    access_key,
                    secret_key,
                    None,
                    None,
                    "cdc-bronze",
                ));
            }
            (None, None) => {}
            _ => anyhow::bail!("S3 access key and secret key must be given together"),
        }

        let sdk_config = loader.load().await;
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(config.force_path_style)
            .build();

        tracing::debug!(
            "Created S3 client (endpoint: {}, path style: {})",
            config.endpoint.as_deref().unwrap_or("default"),
            config.force_path_style
        );

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(s3_config),
        })
    }
}

#[async_trait::async_trait]
impl ObjectSink for S3Sink {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        let size = body.len();
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("Failed to put object to S3: s3://{bucket}/{key}"))?;

        tracing::debug!("Put {size} bytes to s3://{bucket}/{key}");
        Ok(())
    }

    fn display_location(&self, bucket: &str, key: &str) -> String {
        format!("s3://{bucket}/{key}")
    }
}
