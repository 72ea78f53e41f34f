//! Hosts and work items shared by the dispatcher and the worker

use serde::{Deserialize, Serialize};
use url::Url;

/// A CDN-accelerated hostname whose access logs are archived
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Domain {
    pub host: String,
}

impl Domain {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    /// Sort and de-duplicate a host list, dropping blank entries
    pub fn normalize_list<I, S>(hosts: I) -> Vec<Domain>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut domains: Vec<Domain> = hosts
            .into_iter()
            .map(|h| h.as_ref().trim().to_string())
            .filter(|h| !h.is_empty())
            .map(Domain::new)
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }
}

impl std::fmt::Display for Domain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.host)
    }
}

/// One archive handed from the dispatcher to a worker.
///
/// This is also the event payload of a fanned-out worker invocation. The worker
/// re-derives the key from `url`; `key` is carried for logging and may be
/// absent in hand-crafted payloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            key: key.into(),
        }
    }
}

/// How the dispatcher hands work items to workers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Process every work item in the dispatcher's own process
    #[default]
    Inline,
    /// Invoke a separate worker function per work item
    Fanout,
}

impl std::fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExecutionMode::Inline => write!(f, "inline"),
            ExecutionMode::Fanout => write!(f, "fanout"),
        }
    }
}

impl std::str::FromStr for ExecutionMode {
    type Err = crate::PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inline" | "single" => Ok(ExecutionMode::Inline),
            "fanout" | "fan-out" | "dispatch" => Ok(ExecutionMode::Fanout),
            _ => Err(crate::PipelineError::config_invalid(format!(
                "Unsupported execution mode: {}. Supported: inline, fanout",
                s
            ))),
        }
    }
}

/// Strip the query string and fragment from a URL before logging it.
///
/// Archive URLs are signed; the signature lives in the query string.
pub fn redact_url(raw: &str) -> String {
    match Url::parse(raw) {
        Ok(mut url) => {
            url.set_query(None);
            url.set_fragment(None);
            url.to_string()
        }
        Err(_) => raw
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    }
}
