//! Per-URL worker outcomes and per-run dispatcher summaries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorCode, PipelineError};
use crate::window::LogWindow;
use crate::work::{redact_url, ExecutionMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    /// The destination key already existed; nothing was uploaded
    Skip,
    /// The archive was landed under its key
    Success,
    /// Nothing was published; the next dispatcher tick retries
    Failure,
}

/// Result of landing a single archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerOutcome {
    pub status: WorkerStatus,
    /// Redacted archive URL
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bytes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WorkerOutcome {
    pub fn skipped(url: &str, key: impl Into<String>) -> Self {
        Self {
            status: WorkerStatus::Skip,
            url: redact_url(url),
            key: Some(key.into()),
            bytes: None,
            parts: None,
            error_code: None,
            error: None,
        }
    }

    pub fn uploaded(url: &str, key: impl Into<String>, bytes: u64, parts: u32) -> Self {
        Self {
            status: WorkerStatus::Success,
            url: redact_url(url),
            key: Some(key.into()),
            bytes: Some(bytes),
            parts: Some(parts),
            error_code: None,
            error: None,
        }
    }

    pub fn failed(url: &str, key: Option<String>, error: &PipelineError) -> Self {
        Self {
            status: WorkerStatus::Failure,
            url: redact_url(url),
            key,
            bytes: None,
            parts: None,
            error_code: Some(error.code()),
            error: Some(error.to_string()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == WorkerStatus::Failure
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every host was listed and every URL was dispatched (and, inline, landed or skipped)
    Success,
    /// The run completed but some hosts or URLs failed; the next tick retries them
    PartialFailure,
    /// Host discovery failed; the run was a no-op
    Failure,
}

impl RunStatus {
    pub fn is_success(&self) -> bool {
        *self == RunStatus::Success
    }
}

/// Structured result of one dispatcher run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchSummary {
    pub mode: ExecutionMode,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub hosts_processed: usize,
    pub hosts_failed: usize,
    pub dispatched_urls: usize,
    pub malformed_urls: usize,
    /// Inline mode: archives uploaded by this run
    pub uploaded: usize,
    /// Inline mode: archives already present
    pub skipped: usize,
    /// Failed URLs: worker failures inline, rejected invocations in fanout
    pub failed: usize,
    pub status: RunStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl DispatchSummary {
    pub fn new(mode: ExecutionMode, window: &LogWindow) -> Self {
        Self {
            mode,
            window_start: window.start,
            window_end: window.end,
            hosts_processed: 0,
            hosts_failed: 0,
            dispatched_urls: 0,
            malformed_urls: 0,
            uploaded: 0,
            skipped: 0,
            failed: 0,
            status: RunStatus::Success,
            error: None,
        }
    }

    /// Record the outcome of an inline worker run
    pub fn record(&mut self, outcome: &WorkerOutcome) {
        match outcome.status {
            WorkerStatus::Success => self.uploaded += 1,
            WorkerStatus::Skip => self.skipped += 1,
            WorkerStatus::Failure => self.failed += 1,
        }
    }

    /// Mark the run as a no-op because host discovery failed
    pub fn abort(&mut self, error: &PipelineError) {
        self.status = RunStatus::Failure;
        self.error = Some(error.to_string());
    }

    /// Derive the final status from the counters
    pub fn finish(mut self) -> Self {
        if self.status != RunStatus::Failure {
            self.status = if self.hosts_failed > 0 || self.malformed_urls > 0 || self.failed > 0
            {
                RunStatus::PartialFailure
            } else {
                RunStatus::Success
            };
        }
        self
    }
}
