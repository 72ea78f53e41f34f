// Configuration validation
//
// Validates that required fields are present and values are sensible.
// Every failure maps to ConfigInvalid so callers can stop before doing any work.

use crate::*;
use cdnlog_core::{PipelineError, Result};
use tracing::warn;

const MAX_WINDOW_LENGTH_SECS: u64 = 7 * 24 * 3600;
const MAX_STABILIZATION_DELAY_SECS: u64 = 30 * 24 * 3600;
/// Smallest part size S3-compatible stores accept for non-final parts
const MIN_MULTIPART_CHUNK_BYTES: usize = 5 * 1024 * 1024;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_destination_config(&config.destination)?;
    validate_window_config(&config.window)?;
    validate_execution_config(config)?;
    validate_cdn_config(&config.cdn)?;
    validate_http_config(&config.http)?;
    Ok(())
}

fn invalid(message: impl Into<String>) -> PipelineError {
    PipelineError::config_invalid(message)
}

fn validate_destination_config(config: &DestinationConfig) -> Result<()> {
    match config.backend {
        StorageBackend::S3 => {
            if config.bucket.trim().is_empty() {
                return Err(invalid("destination.bucket is required"));
            }
            if config.region.trim().is_empty() {
                return Err(invalid("destination.region is required"));
            }
            if config.access_key_id.is_some() != config.secret_access_key.is_some() {
                return Err(invalid(
                    "destination.access_key_id and destination.secret_access_key must be set together",
                ));
            }
        }
        StorageBackend::Fs => {
            let missing = config
                .fs_root
                .as_deref()
                .map(|root| root.trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(invalid("destination.fs_root is required for the fs backend"));
            }
        }
    }

    // Surfaces template errors (unknown placeholder, missing {filename}) up front
    config.key_deriver()?;
    Ok(())
}

fn validate_window_config(config: &WindowConfig) -> Result<()> {
    if config.length_secs == 0 {
        return Err(invalid("window.length_secs must be greater than 0"));
    }
    if config.length_secs > MAX_WINDOW_LENGTH_SECS {
        return Err(invalid(format!(
            "window.length_secs must not exceed {} (7 days)",
            MAX_WINDOW_LENGTH_SECS
        )));
    }
    if config.stabilization_delay_secs > MAX_STABILIZATION_DELAY_SECS {
        return Err(invalid(format!(
            "window.stabilization_delay_secs must not exceed {} (30 days)",
            MAX_STABILIZATION_DELAY_SECS
        )));
    }
    if config.stabilization_delay_secs == 0 {
        warn!("window.stabilization_delay_secs is 0; archives may still be incomplete when fetched");
    }
    Ok(())
}

fn validate_execution_config(config: &RuntimeConfig) -> Result<()> {
    let execution = &config.execution;
    if execution.chunk_bytes == 0 {
        return Err(invalid("execution.chunk_bytes must be greater than 0"));
    }
    if execution.chunk_bytes < MIN_MULTIPART_CHUNK_BYTES {
        warn!(
            chunk_bytes = execution.chunk_bytes,
            "execution.chunk_bytes is below 5 MiB; S3-compatible stores reject smaller non-final parts"
        );
    }

    if execution.mode == ExecutionMode::Fanout {
        let function_missing = execution
            .worker_function
            .as_deref()
            .map(|f| f.trim().is_empty())
            .unwrap_or(true);
        if function_missing {
            return Err(invalid(
                "execution.worker_function is required in fanout mode",
            ));
        }
        if config.credentials.is_none() {
            return Err(invalid(
                "fanout mode requires cloud credentials (TENCENTCLOUD_SECRETID/TENCENTCLOUD_SECRETKEY)",
            ));
        }
        if config.worker_region().trim().is_empty() {
            return Err(invalid(
                "execution.worker_region or destination.region is required in fanout mode",
            ));
        }
    }
    Ok(())
}

fn validate_cdn_config(config: &CdnConfig) -> Result<()> {
    if config.page_size == 0 {
        return Err(invalid("cdn.page_size must be greater than 0"));
    }
    if config.log_page_size == 0 {
        return Err(invalid("cdn.log_page_size must be greater than 0"));
    }
    if !(-12..=14).contains(&config.api_utc_offset_hours) {
        return Err(invalid("cdn.api_utc_offset_hours must be within -12..=14"));
    }
    if config.endpoint.trim().is_empty() {
        return Err(invalid("cdn.endpoint is required"));
    }
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<()> {
    if config.timeout_secs == 0 {
        return Err(invalid("http.timeout_secs must be greater than 0"));
    }
    if config.connect_timeout_secs == 0 {
        return Err(invalid("http.connect_timeout_secs must be greater than 0"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdnlog_core::ErrorCode;

    fn valid_config() -> RuntimeConfig {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.destination.bucket = "logs-1250000000".to_string();
        config.destination.region = "ap-guangzhou".to_string();
        config
    }

    #[test]
    fn accepts_minimal_config() {
        assert!(validate_config(&valid_config()).is_ok());
    }

    #[test]
    fn missing_bucket_is_config_invalid() {
        let mut config = valid_config();
        config.destination.bucket.clear();
        let err = validate_config(&config).unwrap_err();
        assert_eq!(err.code(), ErrorCode::E001ConfigInvalid);
        assert!(err.to_string().contains("destination.bucket"));
    }

    #[test]
    fn rejects_zero_durations_and_chunks() {
        let mut config = valid_config();
        config.window.length_secs = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.execution.chunk_bytes = 0;
        assert!(validate_config(&config).is_err());

        let mut config = valid_config();
        config.http.timeout_secs = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn rejects_bad_key_template() {
        let mut config = valid_config();
        config.destination.key_template = "/{prefix}/{nope}/{filename}".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn fanout_requires_function_and_credentials() {
        let mut config = valid_config();
        config.execution.mode = ExecutionMode::Fanout;
        assert!(validate_config(&config).is_err());

        config.execution.worker_function = Some("cdnlog-worker".to_string());
        assert!(validate_config(&config).is_err());

        config.credentials = Some(CloudCredentials::new("id", "key", None));
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn fs_backend_needs_root_not_bucket() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.destination.backend = StorageBackend::Fs;
        assert!(validate_config(&config).is_err());

        config.destination.fs_root = Some("/var/lib/cdnlog".to_string());
        assert!(validate_config(&config).is_ok());
    }
}
