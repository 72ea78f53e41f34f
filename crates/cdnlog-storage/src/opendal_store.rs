// OpenDAL-backed store
//
// Used for the operator-owned filesystem backend. Parts are appended to one
// OpenDAL writer; with an atomic-write directory configured, the object is
// staged there and only renamed into place when the writer closes.

use crate::{object_path, ArchiveStore, CompletedPart, MultipartUpload, ObjectPresence};
use async_trait::async_trait;
use bytes::Bytes;
use cdnlog_core::{PipelineError, Result};
use opendal::{Operator, Writer};
use std::path::Path;
use tracing::warn;

const STAGING_DIR: &str = ".staging";

#[derive(Clone)]
pub struct OpendalStore {
    operator: Operator,
    name: &'static str,
}

impl OpendalStore {
    /// Wrap an existing operator (any OpenDAL service)
    pub fn new(operator: Operator) -> Self {
        Self {
            operator,
            name: "opendal",
        }
    }

    /// Filesystem store rooted at `root/bucket`
    pub fn fs(root: &str, bucket: &str) -> anyhow::Result<Self> {
        use opendal::services;

        let root = if bucket.is_empty() {
            Path::new(root).to_path_buf()
        } else {
            Path::new(root).join(bucket)
        };
        let staging = root.join(STAGING_DIR);

        let builder = services::Fs::default()
            .root(&root.to_string_lossy())
            .atomic_write_dir(&staging.to_string_lossy());

        let operator = Operator::new(builder)?.finish();
        Ok(Self {
            operator,
            name: "fs",
        })
    }

    pub fn operator(&self) -> &Operator {
        &self.operator
    }
}

#[async_trait]
impl ArchiveStore for OpendalStore {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn presence(&self, key: &str) -> ObjectPresence {
        match self.operator.stat(object_path(key)).await {
            Ok(_) => ObjectPresence::Present,
            Err(e) if e.kind() == opendal::ErrorKind::NotFound => ObjectPresence::Absent,
            Err(e) => ObjectPresence::Unavailable(e.to_string()),
        }
    }

    async fn create_multipart(&self, key: &str) -> Result<Box<dyn MultipartUpload>> {
        let path = object_path(key);
        let writer = self.operator.writer(path).await.map_err(|e| {
            PipelineError::store_unavailable(format!("Failed to open writer for {}: {}", path, e))
        })?;

        let upload_id = blake3::hash(path.as_bytes()).to_hex()[..16].to_string();
        Ok(Box::new(OpendalUpload {
            path: path.to_string(),
            upload_id,
            writer,
            parts_written: 0,
        }))
    }
}

struct OpendalUpload {
    path: String,
    upload_id: String,
    writer: Writer,
    parts_written: u32,
}

#[async_trait]
impl MultipartUpload for OpendalUpload {
    fn upload_id(&self) -> &str {
        &self.upload_id
    }

    async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        if part_number != self.parts_written + 1 {
            return Err(PipelineError::store_unavailable(format!(
                "Part {} of {} out of order (expected {})",
                part_number,
                self.path,
                self.parts_written + 1
            )));
        }

        let tag = blake3::hash(&data).to_hex()[..16].to_string();
        if !data.is_empty() {
            self.writer.write(data).await.map_err(|e| {
                PipelineError::store_unavailable(format!(
                    "Failed to write part {} of {}: {}",
                    part_number, self.path, e
                ))
            })?;
        }
        self.parts_written = part_number;

        Ok(CompletedPart { part_number, tag })
    }

    async fn complete(mut self: Box<Self>, parts: Vec<CompletedPart>) -> Result<()> {
        if parts.len() as u32 != self.parts_written {
            if let Err(err) = self.writer.abort().await {
                warn!(path = %self.path, error = %err, "Failed to abort staged write");
            }
            return Err(PipelineError::store_unavailable(format!(
                "Completion of {} lists {} part(s) but {} were written",
                self.path,
                parts.len(),
                self.parts_written
            )));
        }

        self.writer.close().await.map_err(|e| {
            PipelineError::store_unavailable(format!("Failed to finalize {}: {}", self.path, e))
        })?;
        Ok(())
    }

    async fn abort(mut self: Box<Self>) -> Result<()> {
        self.writer.abort().await.map_err(|e| {
            PipelineError::store_unavailable(format!("Failed to abort {}: {}", self.path, e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream_multipart_upload;
    use cdnlog_core::ErrorCode;
    use futures::stream;

    const KEY: &str = "/cdnlog/a.example/20240315/01-a.example.gz";

    #[tokio::test]
    async fn memory_store_reports_presence() -> anyhow::Result<()> {
        let operator = Operator::new(opendal::services::Memory::default())?.finish();
        let store = OpendalStore::new(operator);

        assert_eq!(store.presence(KEY).await, ObjectPresence::Absent);

        store
            .operator()
            .write(object_path(KEY), b"gzip".to_vec())
            .await?;
        assert_eq!(store.presence(KEY).await, ObjectPresence::Present);
        assert!(store.exists(KEY).await?);
        Ok(())
    }

    #[tokio::test]
    async fn fs_store_lands_object_under_bucket() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = OpendalStore::fs(dir.path().to_str().unwrap(), "logs")?;

        let body = stream::iter(vec![
            Ok(Bytes::from_static(b"hello ")),
            Ok(Bytes::from_static(b"archive")),
        ]);
        let report = stream_multipart_upload(&store, KEY, body, 4).await?;
        assert_eq!(report.bytes, 13);
        assert_eq!(report.parts, 4);

        let on_disk = dir
            .path()
            .join("logs/cdnlog/a.example/20240315/01-a.example.gz");
        assert_eq!(std::fs::read(on_disk)?, b"hello archive");
        assert!(store.exists(KEY).await?);
        Ok(())
    }

    #[tokio::test]
    async fn completion_with_missing_parts_is_rejected() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = OpendalStore::fs(dir.path().to_str().unwrap(), "logs")?;

        let mut upload = store.create_multipart(KEY).await?;
        upload.upload_part(1, Bytes::from_static(b"abcd")).await?;
        let err = upload.complete(Vec::new()).await.unwrap_err();

        assert_eq!(err.code(), ErrorCode::E003StoreUnavailable);
        assert!(!store.exists(KEY).await?);
        Ok(())
    }

    #[tokio::test]
    async fn fs_store_hides_interrupted_upload() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let store = OpendalStore::fs(dir.path().to_str().unwrap(), "logs")?;

        let body = stream::iter(vec![
            Ok(Bytes::from(vec![1u8; 8])),
            Err(PipelineError::archive_fetch("https://cdn/x", "connection dropped")),
        ]);
        let err = stream_multipart_upload(&store, KEY, body, 4)
            .await
            .unwrap_err();

        assert_eq!(err.code(), ErrorCode::E005PartialUpload);
        assert!(!store.exists(KEY).await?);
        Ok(())
    }
}
