//! Streaming multipart upload

use crate::{ArchiveStore, CompletedPart, MultipartUpload};
use bytes::{Bytes, BytesMut};
use cdnlog_core::{ErrorCode, PipelineError, Result};
use futures::{Stream, StreamExt};
use tracing::{debug, info, warn};

/// What landed under the key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    pub bytes: u64,
    pub parts: u32,
}

/// Stream `body` into `store` under `key` as a multipart upload.
///
/// The body is cut into parts of exactly `chunk_bytes` (the last one may be
/// shorter). The upload is completed only once the stream ends cleanly; any
/// failure aborts it so the key never becomes visible. The stream is consumed
/// and dropped here on every path.
pub async fn stream_multipart_upload<S>(
    store: &dyn ArchiveStore,
    key: &str,
    body: S,
    chunk_bytes: usize,
) -> Result<UploadReport>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    if chunk_bytes == 0 {
        return Err(PipelineError::config_invalid(
            "chunk_bytes must be greater than 0",
        ));
    }

    let mut upload = store.create_multipart(key).await?;
    debug!(
        store = store.name(),
        key,
        upload_id = upload.upload_id(),
        "Initiated multipart upload"
    );

    let mut parts = Vec::new();
    let result = upload_parts(upload.as_mut(), body, chunk_bytes, &mut parts).await;

    let bytes = match result {
        Ok(bytes) => bytes,
        Err(err) => {
            let upload_id = upload.upload_id().to_string();
            if let Err(abort_err) = upload.abort().await {
                warn!(key, upload_id = %upload_id, error = %abort_err, "Failed to abort multipart upload");
            }
            return Err(classify_failure(key, parts.len() as u32, err));
        }
    };

    let part_count = parts.len() as u32;
    if let Err(err) = upload.complete(parts).await {
        return Err(classify_failure(key, part_count, err));
    }

    info!(key, bytes, parts = part_count, "Completed multipart upload");
    Ok(UploadReport {
        bytes,
        parts: part_count,
    })
}

async fn upload_parts<S>(
    upload: &mut dyn MultipartUpload,
    mut body: S,
    chunk_bytes: usize,
    parts: &mut Vec<CompletedPart>,
) -> Result<u64>
where
    S: Stream<Item = Result<Bytes>> + Send + Unpin,
{
    let mut buffer = BytesMut::with_capacity(chunk_bytes);
    let mut total: u64 = 0;

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        total += chunk.len() as u64;
        buffer.extend_from_slice(&chunk);

        while buffer.len() >= chunk_bytes {
            let part = buffer.split_to(chunk_bytes).freeze();
            send_part(upload, part, parts).await?;
        }
    }

    // Final short part, or a single empty part so completion is well formed
    if !buffer.is_empty() || parts.is_empty() {
        send_part(upload, buffer.freeze(), parts).await?;
    }

    Ok(total)
}

async fn send_part(
    upload: &mut dyn MultipartUpload,
    data: Bytes,
    parts: &mut Vec<CompletedPart>,
) -> Result<()> {
    let part_number = parts.len() as u32 + 1;
    let size = data.len();
    let part = upload.upload_part(part_number, data).await?;
    debug!(
        upload_id = upload.upload_id(),
        part_number,
        size,
        "Uploaded part"
    );
    parts.push(part);
    Ok(())
}

/// Once any part has been accepted the failure is reported as a partial
/// upload; before that the original error stands.
fn classify_failure(key: &str, parts_uploaded: u32, err: PipelineError) -> PipelineError {
    if parts_uploaded == 0 || err.code() == ErrorCode::E005PartialUpload {
        return err;
    }
    PipelineError::partial_upload(key, parts_uploaded, err.to_string())
}
