//! In-memory sink

use crate::ObjectSink;
use anyhow::Result;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An object held by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Keeps objects in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    objects: Arc<Mutex<Vec<StoredObject>>>,
    failure: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every put fails with `message`
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Self::default()
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<StoredObject>> {
        self.objects.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All stored objects in the order they were first written
    pub fn objects(&self) -> Vec<StoredObject> {
        self.lock().clone()
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.lock()
            .iter()
            .find(|o| o.bucket == bucket && o.key == key)
            .cloned()
    }
}

#[async_trait::async_trait]
impl ObjectSink for MemorySink {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        if let Some(message) = &self.failure {
            anyhow::bail!("{message}");
        }

        let object = StoredObject {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        };

        let mut objects = self.lock();
        match objects
            .iter_mut()
            .find(|o| o.bucket == bucket && o.key == key)
        {
            Some(existing) => *existing = object,
            None => objects.push(object),
        }
        Ok(())
    }

    fn display_location(&self, bucket: &str, key: &str) -> String {
        format!("memory://{bucket}/{key}")
    }
}
