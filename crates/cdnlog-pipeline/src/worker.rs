// Worker: lands one log archive in the destination bucket
//
// HEAD-before-upload makes the worker idempotent: the key is a pure function
// of the URL, and a multipart upload only becomes visible once completed.

use crate::source::ArchiveSource;
use cdnlog_core::{redact_url, KeyDeriver, WorkItem, WorkerOutcome};
use cdnlog_storage::{stream_multipart_upload, ArchiveStore};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct Worker {
    store: Arc<dyn ArchiveStore>,
    source: Arc<dyn ArchiveSource>,
    deriver: KeyDeriver,
    chunk_bytes: usize,
}

impl Worker {
    pub fn new(
        store: Arc<dyn ArchiveStore>,
        source: Arc<dyn ArchiveSource>,
        deriver: KeyDeriver,
        chunk_bytes: usize,
    ) -> Self {
        Self {
            store,
            source,
            deriver,
            chunk_bytes,
        }
    }

    pub fn deriver(&self) -> &KeyDeriver {
        &self.deriver
    }

    /// Process a work item received from a dispatcher. The key is always
    /// re-derived from the URL.
    pub async fn process_item(&self, item: &WorkItem) -> WorkerOutcome {
        let outcome = self.process(&item.url).await;
        if !item.key.is_empty() && outcome.key.as_deref().is_some_and(|k| k != item.key) {
            warn!(
                url = %redact_url(&item.url),
                supplied = %item.key,
                derived = outcome.key.as_deref().unwrap_or_default(),
                "Work item key differs from derived key; derived key was used"
            );
        }
        outcome
    }

    pub async fn process(&self, url: &str) -> WorkerOutcome {
        let redacted = redact_url(url);

        let key = match self.deriver.derive(url) {
            Ok(key) => key,
            Err(err) => {
                warn!(url = %redacted, error = %err, "Skipping malformed log URL");
                return WorkerOutcome::failed(url, None, &err);
            }
        };

        match self.store.exists(&key).await {
            Ok(true) => {
                info!(url = %redacted, key = %key, "Archive already landed; skipping");
                return WorkerOutcome::skipped(url, key);
            }
            Ok(false) => {}
            Err(err) => {
                warn!(url = %redacted, key = %key, error = %err, "Destination HEAD failed");
                return WorkerOutcome::failed(url, Some(key), &err);
            }
        }

        self.upload(url, key).await
    }

    async fn upload(&self, url: &str, key: String) -> WorkerOutcome {
        let redacted = redact_url(url);

        let body = match self.source.open(url).await {
            Ok(body) => body,
            Err(err) => {
                warn!(url = %redacted, key = %key, error = %err, "Failed to open archive");
                return WorkerOutcome::failed(url, Some(key), &err);
            }
        };

        match stream_multipart_upload(self.store.as_ref(), &key, body, self.chunk_bytes).await {
            Ok(report) => {
                info!(
                    url = %redacted,
                    key = %key,
                    bytes = report.bytes,
                    parts = report.parts,
                    "Archive landed"
                );
                WorkerOutcome::uploaded(url, key, report.bytes, report.parts)
            }
            Err(err) => {
                warn!(url = %redacted, key = %key, error = %err, "Archive upload failed");
                WorkerOutcome::failed(url, Some(key), &err)
            }
        }
    }
}
