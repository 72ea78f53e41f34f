// Archive source: opens a log archive URL as a byte stream
//
// The signed archive URLs are fetched with a plain GET. The connect phase and
// each read are bounded separately so large archives are not cut off by an
// overall deadline.

use async_trait::async_trait;
use cdnlog_config::HttpConfig;
use cdnlog_core::{redact_url, PipelineError, Result};
use cdnlog_storage::ArchiveStream;
use futures::StreamExt;
use tracing::debug;

#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Start downloading `url`; the returned stream owns the connection
    async fn open(&self, url: &str) -> Result<ArchiveStream>;
}

#[derive(Debug, Clone)]
pub struct HttpArchiveSource {
    client: reqwest::Client,
}

impl HttpArchiveSource {
    pub fn new(http: &HttpConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(http.connect_timeout())
            .read_timeout(http.timeout())
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create reqwest client: {}", e))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ArchiveSource for HttpArchiveSource {
    async fn open(&self, url: &str) -> Result<ArchiveStream> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PipelineError::archive_fetch(url, e.without_url().to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::archive_fetch(
                url,
                format!("HTTP {}", status.as_u16()),
            ));
        }

        debug!(
            url = %redact_url(url),
            content_length = response.content_length(),
            "Opened archive stream"
        );

        let owned_url = url.to_string();
        let stream = response
            .bytes_stream()
            .map(move |chunk| {
                chunk.map_err(|e| PipelineError::archive_fetch(&owned_url, e.without_url().to_string()))
            })
            .boxed();
        Ok(stream)
    }
}
