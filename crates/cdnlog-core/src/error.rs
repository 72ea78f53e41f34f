//! Error kinds for the archiver pipeline

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error codes for programmatic handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// E001: Configuration missing or invalid
    #[serde(rename = "E001")]
    E001ConfigInvalid,
    /// E002: CDN provider or cloud API failed
    #[serde(rename = "E002")]
    E002UpstreamUnavailable,
    /// E003: Destination store HEAD or upload failed
    #[serde(rename = "E003")]
    E003StoreUnavailable,
    /// E004: Archive URL does not follow the /{day}/{hour}/{filename} layout
    #[serde(rename = "E004")]
    E004MalformedLogUrl,
    /// E005: Multipart sequence interrupted after parts were uploaded
    #[serde(rename = "E005")]
    E005PartialUpload,
    /// E006: Archive download failed before anything was uploaded
    #[serde(rename = "E006")]
    E006ArchiveFetch,
    /// E007: Worker invocation rejected by the platform
    #[serde(rename = "E007")]
    E007InvokeFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::E001ConfigInvalid => "E001",
            Self::E002UpstreamUnavailable => "E002",
            Self::E003StoreUnavailable => "E003",
            Self::E004MalformedLogUrl => "E004",
            Self::E005PartialUpload => "E005",
            Self::E006ArchiveFetch => "E006",
            Self::E007InvokeFailed => "E007",
        }
    }

    /// Error kind name as surfaced in logs and handler results
    pub fn kind(&self) -> &'static str {
        match self {
            Self::E001ConfigInvalid => "ConfigInvalid",
            Self::E002UpstreamUnavailable => "UpstreamUnavailable",
            Self::E003StoreUnavailable => "StoreUnavailable",
            Self::E004MalformedLogUrl => "MalformedLogUrl",
            Self::E005PartialUpload => "PartialUpload",
            Self::E006ArchiveFetch => "ArchiveFetch",
            Self::E007InvokeFailed => "InvokeFailed",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors raised while harvesting and landing archives.
///
/// Only `ConfigInvalid` is fatal for a run; every other kind is converted into
/// a per-host or per-URL result by the dispatcher and worker.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PipelineError {
    #[error("[E001] Invalid configuration: {message}")]
    ConfigInvalid { message: String },

    #[error("[E002] Upstream unavailable: {message}")]
    UpstreamUnavailable { message: String },

    #[error("[E003] Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("[E004] Malformed log URL '{url}': {reason}")]
    MalformedLogUrl { url: String, reason: String },

    #[error("[E005] Partial upload of '{key}' abandoned after {parts_uploaded} part(s): {message}")]
    PartialUpload {
        key: String,
        parts_uploaded: u32,
        message: String,
    },

    #[error("[E006] Failed to fetch archive '{url}': {message}")]
    ArchiveFetch { url: String, message: String },

    #[error("[E007] Worker invocation failed: {message}")]
    InvokeFailed { message: String },
}

impl PipelineError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::ConfigInvalid { .. } => ErrorCode::E001ConfigInvalid,
            Self::UpstreamUnavailable { .. } => ErrorCode::E002UpstreamUnavailable,
            Self::StoreUnavailable { .. } => ErrorCode::E003StoreUnavailable,
            Self::MalformedLogUrl { .. } => ErrorCode::E004MalformedLogUrl,
            Self::PartialUpload { .. } => ErrorCode::E005PartialUpload,
            Self::ArchiveFetch { .. } => ErrorCode::E006ArchiveFetch,
            Self::InvokeFailed { .. } => ErrorCode::E007InvokeFailed,
        }
    }

    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    pub fn upstream_unavailable(message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            message: message.into(),
        }
    }

    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed_log_url(url: &str, reason: impl Into<String>) -> Self {
        Self::MalformedLogUrl {
            url: crate::work::redact_url(url),
            reason: reason.into(),
        }
    }

    pub fn partial_upload(key: &str, parts_uploaded: u32, message: impl Into<String>) -> Self {
        Self::PartialUpload {
            key: key.to_string(),
            parts_uploaded,
            message: message.into(),
        }
    }

    pub fn archive_fetch(url: &str, message: impl Into<String>) -> Self {
        Self::ArchiveFetch {
            url: crate::work::redact_url(url),
            message: message.into(),
        }
    }

    pub fn invoke_failed(message: impl Into<String>) -> Self {
        Self::InvokeFailed {
            message: message.into(),
        }
    }
}

/// Result type alias for PipelineError
pub type Result<T> = std::result::Result<T, PipelineError>;
