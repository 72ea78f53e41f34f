//! In-memory fakes for the pipeline's adapter traits

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use cdnlog_core::{Domain, KeyDeriver, LogWindow, PipelineError, Result, WorkItem};
use cdnlog_pipeline::{ArchiveSource, Worker, WorkerInvoker};
use cdnlog_storage::{ArchiveStore, ArchiveStream, CompletedPart, MultipartUpload, ObjectPresence};
use cdnlog_upstream::CdnProvider;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

pub const CHUNK_BYTES: usize = 4;

/// CDN account with scripted listings
#[derive(Default)]
pub struct FakeCdn {
    pub domains: Vec<String>,
    pub discovery_error: Option<PipelineError>,
    pub logs: HashMap<String, Vec<String>>,
    pub failing_hosts: HashSet<String>,
    pub windows: Mutex<Vec<(String, LogWindow)>>,
    pub list_domains_calls: Mutex<usize>,
}

impl FakeCdn {
    pub fn with_logs(mut self, host: &str, urls: &[&str]) -> Self {
        self.logs
            .insert(host.to_string(), urls.iter().map(|u| u.to_string()).collect());
        self
    }

    pub fn failing(mut self, host: &str) -> Self {
        self.failing_hosts.insert(host.to_string());
        self
    }

    pub fn listed_hosts(&self) -> Vec<String> {
        self.windows
            .lock()
            .unwrap()
            .iter()
            .map(|(host, _)| host.clone())
            .collect()
    }
}

#[async_trait]
impl CdnProvider for FakeCdn {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        *self.list_domains_calls.lock().unwrap() += 1;
        if let Some(err) = &self.discovery_error {
            return Err(err.clone());
        }
        Ok(self.domains.iter().map(Domain::new).collect())
    }

    async fn list_log_urls(&self, domain: &Domain, window: &LogWindow) -> Result<Vec<String>> {
        self.windows
            .lock()
            .unwrap()
            .push((domain.host.clone(), *window));
        if self.failing_hosts.contains(&domain.host) {
            return Err(PipelineError::upstream_unavailable(format!(
                "{}: InternalError",
                domain.host
            )));
        }
        Ok(self.logs.get(&domain.host).cloned().unwrap_or_default())
    }
}

#[derive(Default)]
pub struct StoreState {
    pub objects: HashMap<String, Vec<u8>>,
    pub creates: usize,
    pub completes: usize,
    pub aborts: usize,
    pub heads: usize,
    pub head_unavailable: bool,
}

/// Bucket with S3 multipart semantics: nothing is visible before completion
#[derive(Clone, Default)]
pub struct MemoryStore(pub Arc<Mutex<StoreState>>);

impl MemoryStore {
    pub fn state(&self) -> std::sync::MutexGuard<'_, StoreState> {
        self.0.lock().unwrap()
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.state().objects.insert(key.to_string(), data.to_vec());
    }
}

struct MemoryUpload {
    key: String,
    parts: Vec<Bytes>,
    state: Arc<Mutex<StoreState>>,
}

#[async_trait]
impl MultipartUpload for MemoryUpload {
    fn upload_id(&self) -> &str {
        "memory-upload"
    }

    async fn upload_part(&mut self, part_number: u32, data: Bytes) -> Result<CompletedPart> {
        assert_eq!(part_number as usize, self.parts.len() + 1);
        self.parts.push(data);
        Ok(CompletedPart {
            part_number,
            tag: format!("etag-{part_number}"),
        })
    }

    async fn complete(self: Box<Self>, parts: Vec<CompletedPart>) -> Result<()> {
        assert_eq!(parts.len(), self.parts.len());
        let body: Vec<u8> = self.parts.iter().flat_map(|p| p.to_vec()).collect();
        let mut state = self.state.lock().unwrap();
        state.completes += 1;
        state.objects.insert(self.key.clone(), body);
        Ok(())
    }

    async fn abort(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().aborts += 1;
        Ok(())
    }
}

#[async_trait]
impl ArchiveStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn presence(&self, key: &str) -> ObjectPresence {
        // Suspend like a real HEAD so concurrent workers interleave
        tokio::task::yield_now().await;
        let mut state = self.state();
        state.heads += 1;
        if state.head_unavailable {
            ObjectPresence::Unavailable("503 Slow Down".to_string())
        } else if state.objects.contains_key(key) {
            ObjectPresence::Present
        } else {
            ObjectPresence::Absent
        }
    }

    async fn create_multipart(&self, key: &str) -> Result<Box<dyn MultipartUpload>> {
        self.state().creates += 1;
        Ok(Box::new(MemoryUpload {
            key: key.to_string(),
            parts: Vec::new(),
            state: self.0.clone(),
        }))
    }
}

/// Archive server: each URL serves a scripted sequence of chunks
#[derive(Default)]
pub struct FakeSource {
    pub bodies: HashMap<String, Vec<Result<Bytes>>>,
    pub opens: Mutex<usize>,
}

impl FakeSource {
    pub fn serve(mut self, url: &str, body: &[u8]) -> Self {
        self.bodies
            .insert(url.to_string(), vec![Ok(Bytes::copy_from_slice(body))]);
        self
    }

    pub fn serve_chunks(mut self, url: &str, chunks: Vec<Result<Bytes>>) -> Self {
        self.bodies.insert(url.to_string(), chunks);
        self
    }
}

#[async_trait]
impl ArchiveSource for FakeSource {
    async fn open(&self, url: &str) -> Result<ArchiveStream> {
        tokio::task::yield_now().await;
        *self.opens.lock().unwrap() += 1;
        match self.bodies.get(url) {
            Some(chunks) => Ok(stream::iter(chunks.clone()).boxed()),
            None => Err(PipelineError::archive_fetch(url, "HTTP 404")),
        }
    }
}

/// Fan-out target recording accepted invocations
#[derive(Default)]
pub struct RecordingInvoker {
    pub invoked: Mutex<Vec<WorkItem>>,
    pub rejected_urls: HashSet<String>,
}

#[async_trait]
impl WorkerInvoker for RecordingInvoker {
    async fn invoke(&self, item: &WorkItem) -> Result<()> {
        if self.rejected_urls.contains(&item.url) {
            return Err(PipelineError::invoke_failed("ResourceNotFound.Function"));
        }
        self.invoked.lock().unwrap().push(item.clone());
        Ok(())
    }
}

pub fn worker(store: &MemoryStore, source: FakeSource) -> Worker {
    Worker::new(
        Arc::new(store.clone()),
        Arc::new(source),
        KeyDeriver::default(),
        CHUNK_BYTES,
    )
}
