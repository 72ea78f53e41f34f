// cdnlog-config - Unified configuration for the dispatcher, the worker and the CLI
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from CDNLOG_CONFIG env var
// 3. Config file contents from CDNLOG_CONFIG_CONTENT env var
// 4. Default config file locations (./cdnlog.toml, ./.cdnlog.toml)
// 5. Platform-specific defaults (lowest priority)

use anyhow::{Context, Result};
use cdnlog_core::{
    ExecutionMode, KeyDeriver, WindowSpec, DEFAULT_KEY_TEMPLATE, DEFAULT_PREFIX,
    DEFAULT_STABILIZATION_DELAY_SECS, DEFAULT_WINDOW_LENGTH_SECS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

mod credentials;
mod env_overrides;
mod platform;
mod sources;
mod validation;

pub use credentials::CloudCredentials;
pub use env_overrides::{EnvSource, ENV_PREFIX};
pub use platform::{Platform, PlatformDefaults};
pub use sources::load_layered;

/// Default multipart chunk size (10 MiB)
pub const DEFAULT_CHUNK_BYTES: usize = 10 * 1024 * 1024;

/// Main runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Hosts to harvest; empty means every domain in the CDN account
    #[serde(default)]
    pub hosts: Vec<String>,

    #[serde(default)]
    pub destination: DestinationConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub execution: ExecutionConfig,

    #[serde(default)]
    pub cdn: CdnConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub log: LogConfig,

    /// Cloud API credentials supplied by the host environment
    #[serde(skip)]
    pub credentials: Option<CloudCredentials>,

    #[serde(skip)]
    pub platform: Platform,
}

/// Destination bucket configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DestinationConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    #[serde(default)]
    pub bucket: String,

    #[serde(default)]
    pub region: String,

    #[serde(default = "default_key_template")]
    pub key_template: String,

    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Custom S3-compatible endpoint (COS, MinIO, ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default)]
    pub force_path_style: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class: Option<String>,

    /// Root directory for the filesystem backend
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs_root: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,

    /// Sign store requests with the platform's cloud credentials when no
    /// static destination keys are configured
    #[serde(default)]
    pub use_cloud_credentials: bool,
}

fn default_key_template() -> String {
    DEFAULT_KEY_TEMPLATE.to_string()
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: String::new(),
            region: String::new(),
            key_template: default_key_template(),
            prefix: default_prefix(),
            endpoint: None,
            force_path_style: false,
            storage_class: None,
            fs_root: None,
            access_key_id: None,
            secret_access_key: None,
            session_token: None,
            use_cloud_credentials: false,
        }
    }
}

impl DestinationConfig {
    /// Compile the key template and prefix into a deriver
    pub fn key_deriver(&self) -> cdnlog_core::Result<KeyDeriver> {
        KeyDeriver::new(&self.key_template, &self.prefix)
    }

    /// Static destination credentials, if both halves are configured
    pub fn static_credentials(&self) -> Option<CloudCredentials> {
        match (&self.access_key_id, &self.secret_access_key) {
            (Some(id), Some(key)) if !id.is_empty() && !key.is_empty() => Some(
                CloudCredentials::new(id.clone(), key.clone(), self.session_token.clone()),
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible object store
    #[default]
    S3,
    /// Operator-owned filesystem root
    Fs,
}

impl std::fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageBackend::S3 => write!(f, "s3"),
            StorageBackend::Fs => write!(f, "fs"),
        }
    }
}

impl std::str::FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "s3" | "aws" | "cos" => Ok(StorageBackend::S3),
            "fs" | "filesystem" => Ok(StorageBackend::Fs),
            _ => anyhow::bail!("Unsupported storage backend: {}. Supported: s3, fs", s),
        }
    }
}

/// Log discovery window configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub length_secs: u64,
    pub stabilization_delay_secs: u64,
    pub align: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            length_secs: DEFAULT_WINDOW_LENGTH_SECS,
            stabilization_delay_secs: DEFAULT_STABILIZATION_DELAY_SECS,
            align: false,
        }
    }
}

impl WindowConfig {
    pub fn spec(&self) -> WindowSpec {
        WindowSpec::from_secs(self.length_secs, self.stabilization_delay_secs, self.align)
    }
}

/// Dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    #[serde(default)]
    pub mode: ExecutionMode,

    #[serde(default = "default_chunk_bytes")]
    pub chunk_bytes: usize,

    /// Function invoked per work item in fanout mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_function: Option<String>,

    #[serde(default = "default_worker_namespace")]
    pub worker_namespace: String,

    #[serde(default = "default_worker_qualifier")]
    pub worker_qualifier: String,

    /// Region of the worker function; defaults to the destination region
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worker_region: Option<String>,

    /// Function invoke API endpoint
    #[serde(default = "default_invoke_endpoint")]
    pub invoke_endpoint: String,
}

fn default_chunk_bytes() -> usize {
    DEFAULT_CHUNK_BYTES
}

fn default_worker_namespace() -> String {
    "default".to_string()
}

fn default_worker_qualifier() -> String {
    "$LATEST".to_string()
}

fn default_invoke_endpoint() -> String {
    "https://scf.tencentcloudapi.com".to_string()
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Inline,
            chunk_bytes: default_chunk_bytes(),
            worker_function: None,
            worker_namespace: default_worker_namespace(),
            worker_qualifier: default_worker_qualifier(),
            worker_region: None,
            invoke_endpoint: default_invoke_endpoint(),
        }
    }
}

/// CDN provider API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CdnConfig {
    pub endpoint: String,
    /// Log area: mainland, overseas or global
    pub area: String,
    pub page_size: u32,
    pub log_page_size: u32,
    /// UTC offset in which the provider interprets StartTime/EndTime
    pub api_utc_offset_hours: i32,
}

impl Default for CdnConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://cdn.tencentcloudapi.com".to_string(),
            area: "mainland".to_string(),
            page_size: 100,
            log_page_size: 1000,
            api_utc_offset_hours: 8,
        }
    }
}

/// Deadlines applied to every upstream HTTP call
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    /// Defaults per platform when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<LogFormat>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        let platform = Platform::detect();
        sources::load_config(platform)
    }

    /// Load configuration for a specific platform (useful for testing)
    pub fn load_for_platform(platform: Platform) -> Result<Self> {
        sources::load_config(platform)
    }

    /// Load configuration starting from an explicit file (CLI --config)
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    pub fn from_platform_defaults(platform: Platform) -> Self {
        Self {
            hosts: Vec::new(),
            destination: DestinationConfig::default(),
            window: WindowConfig::default(),
            execution: ExecutionConfig::default(),
            cdn: CdnConfig::default(),
            http: HttpConfig::default(),
            log: LogConfig::default(),
            credentials: None,
            platform,
        }
    }

    /// Merge another config into this one (used for TOML layering).
    pub fn merge(&mut self, other: RuntimeConfig) {
        self.hosts = other.hosts;
        self.destination = other.destination;
        self.window = other.window;
        self.execution = other.execution;
        self.cdn = other.cdn;
        self.http = other.http;
        self.log = other.log;

        if other.credentials.is_some() {
            self.credentials = other.credentials;
        }
    }

    /// Apply environment overrides from a custom source
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Build a configuration for the given platform using inline config content
    /// plus overrides supplied by an `EnvSource`.
    pub fn load_for_platform_with_env<E: EnvSource>(
        platform: Platform,
        inline_config: Option<&str>,
        env: &E,
    ) -> Result<Self> {
        let mut config = RuntimeConfig::from_platform_defaults(platform);

        if let Some(inline) = inline_config {
            let file_config: RuntimeConfig =
                toml::from_str(inline).context("Failed to parse inline config content")?;
            config.merge(file_config);
        }

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> cdnlog_core::Result<()> {
        validation::validate_config(self)
    }

    /// Effective log format (explicit setting, else the platform default)
    pub fn log_format(&self) -> LogFormat {
        self.log
            .format
            .unwrap_or_else(|| self.platform.defaults().log_format)
    }

    /// Region used for worker invocations
    pub fn worker_region(&self) -> &str {
        self.execution
            .worker_region
            .as_deref()
            .unwrap_or(&self.destination.region)
    }

    /// Copy with every secret replaced, for display
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let mask = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some("***".to_string());
            }
        };
        mask(&mut copy.destination.secret_access_key);
        mask(&mut copy.destination.session_token);
        copy
    }

    /// Render as TOML (secrets redacted)
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(&self.redacted()).context("Failed to render configuration")
    }
}
