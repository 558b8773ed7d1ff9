//! Local filesystem sink
//!
//! Objects land at `<root>/<bucket>/<key>`. Each object is first written to a
//! temporary file in the destination directory and then renamed into place,
//! so the final path only ever holds complete content.

use crate::ObjectSink;
use anyhow::{Context, Result};
use std::io::Write;
use std::path::{Component, Path, PathBuf};

/// Stores objects as files below a root directory
#[derive(Debug, Clone)]
pub struct LocalSink {
    root: PathBuf,
}

impl LocalSink {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path an object would be stored at, rejecting keys that escape the bucket
    pub fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        let mut path = self.root.clone();
        for part in [bucket, key] {
            let relative = Path::new(part);
            if part.is_empty()
                || !relative
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)))
            {
                anyhow::bail!("Invalid object location: {bucket}/{key}");
            }
            path.push(relative);
        }
        Ok(path)
    }
}

#[async_trait::async_trait]
impl ObjectSink for LocalSink {
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: Vec<u8>,
        _content_type: &str,
    ) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .with_context(|| format!("Object path has no parent: {}", path.display()))?;

        tokio::fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create directory: {}", dir.display()))?;

        let target = path.clone();
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)
                .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
            tmp.write_all(&body)?;
            tmp.as_file().sync_all()?;
            tmp.persist(&target)
                .with_context(|| format!("Failed to move object into place: {}", target.display()))?;
            Ok(())
        })
        .await
        .context("Local write task failed")??;

        tracing::debug!("Wrote object to {}", path.display());
        Ok(())
    }

    fn display_location(&self, bucket: &str, key: &str) -> String {
        self.root.join(bucket).join(key).display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_object_writes_file() {
        let tmp = TempDir::new().unwrap();
        let sink = LocalSink::new(tmp.path());

        sink.put_object("raw", "inc/data=20240102/a.csv", b"x,y\n".to_vec(), "text/csv")
            .await
            .unwrap();

        let written = std::fs::read(tmp.path().join("raw/inc/data=20240102/a.csv")).unwrap();
        assert_eq!(written, b"x,y\n");
    }

    #[tokio::test]
    async fn test_put_object_replaces_and_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let sink = LocalSink::new(tmp.path());

        sink.put_object("raw", "k.csv", b"old".to_vec(), "text/csv")
            .await
            .unwrap();
        sink.put_object("raw", "k.csv", b"new".to_vec(), "text/csv")
            .await
            .unwrap();

        let entries: Vec<_> = std::fs::read_dir(tmp.path().join("raw"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries, vec![std::ffi::OsString::from("k.csv")]);
        assert_eq!(std::fs::read(tmp.path().join("raw/k.csv")).unwrap(), b"new");
    }

    #[test]
    fn test_object_path_rejects_escape() {
        let sink = LocalSink::new("/data");
        assert!(sink.object_path("raw", "../etc/passwd").is_err());
        assert!(sink.object_path("raw", "/abs").is_err());
        assert!(sink.object_path("", "a.csv").is_err());
        assert!(sink.object_path("raw", "").is_err());
        assert_eq!(
            sink.object_path("raw", "inc/a.csv").unwrap(),
            PathBuf::from("/data/raw/inc/a.csv")
        );
    }
}
