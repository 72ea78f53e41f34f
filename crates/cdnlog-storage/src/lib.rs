// cdnlog-storage - Destination store adapters
//
// Everything the worker needs from the destination bucket:
// - `ArchiveStore`: HEAD plus the multipart protocol, implemented for
//   S3-compatible stores (aws-sdk-s3) and a filesystem root (OpenDAL)
// - `stream_multipart_upload`: chunked streaming of an archive body into a store
//
// Keys arrive in their canonical `/prefix/...` form; backends address objects
// without the leading slash.

use async_trait::async_trait;
use bytes::Bytes;
use cdnlog_core::{PipelineError, Result};
use futures::stream::BoxStream;

mod init;
mod opendal_store;
mod s3;
mod upload;

pub use init::init_store;
pub use opendal_store::OpendalStore;
pub use s3::{S3Store, S3StoreOptions};
pub use upload::{stream_multipart_upload, UploadReport};

/// Lazy, finite, non-restartable sequence of body chunks
pub type ArchiveStream = BoxStream<'static, Result<Bytes>>;

/// Outcome of a HEAD request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObjectPresence {
    Present,
    Absent,
    /// Any answer other than success or "not found"
    Unavailable(String),
}

/// Part accepted by the store, in upload order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: u32,
    pub tag: String,
}

/// An initiated multipart upload. Nothing is visible under the key until
/// `complete` succeeds.
#[async_trait]
pub trait MultipartUpload: Send {
    fn upload_id(&self) -> &str;

    async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<CompletedPart>;

    async fn complete(self: Box<Self>, parts: Vec<CompletedPart>) -> Result<()>;

    async fn abort(self: Box<Self>) -> Result<()>;
}

#[async_trait]
pub trait ArchiveStore: Send + Sync {
    /// Backend name for logs
    fn name(&self) -> &'static str;

    async fn presence(&self, key: &str) -> ObjectPresence;

    /// `true` on success, `false` on "not found", `StoreUnavailable` otherwise
    async fn exists(&self, key: &str) -> Result<bool> {
        match self.presence(key).await {
            ObjectPresence::Present => Ok(true),
            ObjectPresence::Absent => Ok(false),
            ObjectPresence::Unavailable(message) => Err(PipelineError::store_unavailable(format!(
                "HEAD {} failed: {}",
                key, message
            ))),
        }
    }

    async fn create_multipart(&self, key: &str) -> Result<Box<dyn MultipartUpload>>;
}

/// Object path used by the backends: the key without its leading slash
pub(crate) fn object_path(key: &str) -> &str {
    key.trim_start_matches('/')
}
