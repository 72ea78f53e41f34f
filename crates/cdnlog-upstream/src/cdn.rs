// CDN provider adapter
//
// Lists the account's domains and the log archives of one domain within a
// window. Both listings are paginated with Offset/Limit; responses are decoded
// into typed records here and nowhere else.

use crate::client::{ApiError, CloudApiClient};
use async_trait::async_trait;
use cdnlog_config::{CdnConfig, CloudCredentials, HttpConfig};
use cdnlog_core::{Domain, LogWindow, PipelineError, Result};
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub const CDN_SERVICE: &str = "cdn";
pub const CDN_API_VERSION: &str = "2018-06-06";

/// Source of domains and log archive URLs
#[async_trait]
pub trait CdnProvider: Send + Sync {
    /// Every domain in the account
    async fn list_domains(&self) -> Result<Vec<Domain>>;

    /// Archive URLs for `domain` covering `window`, in provider order
    async fn list_log_urls(&self, domain: &Domain, window: &LogWindow) -> Result<Vec<String>>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainsRequest {
    offset: u32,
    limit: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainsResponse {
    #[serde(default)]
    domains: Vec<BriefDomain>,
    #[serde(default)]
    total_number: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BriefDomain {
    domain: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainLogsRequest<'a> {
    domain: &'a str,
    start_time: String,
    end_time: String,
    offset: u32,
    limit: u32,
    area: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DescribeDomainLogsResponse {
    #[serde(default)]
    domain_logs: Vec<DomainLog>,
    #[serde(default)]
    total_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DomainLog {
    log_path: String,
}

/// CDN provider backed by the DescribeDomains / DescribeCdnDomainLogs API
#[derive(Debug, Clone)]
pub struct TencentCdn {
    client: CloudApiClient,
    area: String,
    page_size: u32,
    log_page_size: u32,
    api_offset: FixedOffset,
}

impl TencentCdn {
    pub fn new(config: &CdnConfig, credentials: CloudCredentials, http: &HttpConfig) -> Result<Self> {
        let client = CloudApiClient::new(
            &config.endpoint,
            CDN_SERVICE,
            CDN_API_VERSION,
            None,
            credentials,
            http,
        )
        .map_err(|e| PipelineError::config_invalid(e.to_string()))?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: CloudApiClient, config: &CdnConfig) -> Result<Self> {
        let api_offset = config
            .api_utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                PipelineError::config_invalid(format!(
                    "cdn.api_utc_offset_hours out of range: {}",
                    config.api_utc_offset_hours
                ))
            })?;

        Ok(Self {
            client,
            area: config.area.clone(),
            page_size: config.page_size.max(1),
            log_page_size: config.log_page_size.max(1),
            api_offset,
        })
    }

    /// Wall-clock time in the zone the API interprets StartTime/EndTime in
    fn api_time(&self, instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&self.api_offset)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }
}

fn upstream(err: ApiError) -> PipelineError {
    PipelineError::upstream_unavailable(err.to_string())
}

#[async_trait]
impl CdnProvider for TencentCdn {
    async fn list_domains(&self) -> Result<Vec<Domain>> {
        let mut hosts = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: DescribeDomainsResponse = self
                .client
                .call(
                    "DescribeDomains",
                    &DescribeDomainsRequest {
                        offset,
                        limit: self.page_size,
                    },
                )
                .await
                .map_err(upstream)?;

            let fetched = page.domains.len() as u32;
            debug!(offset, fetched, total = page.total_number, "Listed domain page");
            hosts.extend(page.domains.into_iter().map(|d| d.domain));

            offset += fetched;
            if fetched == 0 || offset >= page.total_number {
                break;
            }
        }

        let domains = Domain::normalize_list(hosts);
        info!(count = domains.len(), "Discovered CDN domains");
        Ok(domains)
    }

    async fn list_log_urls(&self, domain: &Domain, window: &LogWindow) -> Result<Vec<String>> {
        let start_time = self.api_time(window.start);
        let end_time = self.api_time(window.end);
        let mut urls = Vec::new();
        let mut offset = 0u32;

        loop {
            let page: DescribeDomainLogsResponse = self
                .client
                .call(
                    "DescribeCdnDomainLogs",
                    &DescribeDomainLogsRequest {
                        domain: &domain.host,
                        start_time: start_time.clone(),
                        end_time: end_time.clone(),
                        offset,
                        limit: self.log_page_size,
                        area: &self.area,
                    },
                )
                .await
                .map_err(|e| {
                    PipelineError::upstream_unavailable(format!("{}: {}", domain.host, e))
                })?;

            let fetched = page.domain_logs.len() as u32;
            urls.extend(page.domain_logs.into_iter().map(|log| log.log_path));

            offset += fetched;
            if fetched == 0 || offset >= page.total_count {
                break;
            }
        }

        debug!(host = %domain.host, count = urls.len(), "Listed log archives");
        Ok(urls)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn cdn(offset_hours: i32) -> TencentCdn {
        let config = CdnConfig {
            api_utc_offset_hours: offset_hours,
            ..CdnConfig::default()
        };
        TencentCdn::new(
            &config,
            CloudCredentials::new("id", "key", None),
            &HttpConfig::default(),
        )
        .unwrap()
    }

    #[test]
    fn formats_window_bounds_in_api_zone() {
        let instant = Utc.with_ymd_and_hms(2024, 3, 15, 1, 0, 0).unwrap();
        assert_eq!(cdn(8).api_time(instant), "2024-03-15 09:00:00");
        assert_eq!(cdn(0).api_time(instant), "2024-03-15 01:00:00");
    }

    #[test]
    fn rejects_out_of_range_offsets() {
        for hours in [25, -25, 596_524, i32::MAX, i32::MIN] {
            let config = CdnConfig {
                api_utc_offset_hours: hours,
                ..CdnConfig::default()
            };
            let err = match TencentCdn::new(
                &config,
                CloudCredentials::new("id", "key", None),
                &HttpConfig::default(),
            ) {
                Ok(_) => panic!("offset {} accepted", hours),
                Err(err) => err,
            };
            assert_eq!(err.code(), cdnlog_core::ErrorCode::E001ConfigInvalid);
        }
    }

    #[test]
    fn log_request_uses_provider_field_names() {
        let request = DescribeDomainLogsRequest {
            domain: "a.example",
            start_time: "2024-03-15 09:00:00".to_string(),
            end_time: "2024-03-15 10:00:00".to_string(),
            offset: 0,
            limit: 1000,
            area: "mainland",
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["Domain"], "a.example");
        assert_eq!(value["StartTime"], "2024-03-15 09:00:00");
        assert_eq!(value["Area"], "mainland");
        assert_eq!(value["Limit"], 1000);
    }
}
