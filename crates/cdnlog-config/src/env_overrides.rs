use super::{CloudCredentials, LogFormat, RuntimeConfig, StorageBackend};
use anyhow::{anyhow, Context, Result};
use cdnlog_core::ExecutionMode;

pub const ENV_PREFIX: &str = "CDNLOG_";

/// Abstraction over environment-variable lookups so tests and embedding
/// runtimes can supply their own source of overrides.
pub trait EnvSource {
    fn get(&self, key: &str) -> Option<String>;

    /// Get an environment variable WITHOUT the CDNLOG_ prefix
    /// Used for platform-injected variables (TENCENTCLOUD_SECRETID, etc.)
    fn get_raw(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Hosts allow-list (comma separated)
    if let Some(hosts) = get_env_string(env, "HOSTS")? {
        config.hosts = hosts
            .split(',')
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .collect();
    }

    // Destination
    if let Some(backend) = get_env_string(env, "BACKEND")? {
        config.destination.backend = backend
            .parse::<StorageBackend>()
            .context("Invalid CDNLOG_BACKEND value")?;
    }
    if let Some(bucket) = get_env_string(env, "BUCKET")? {
        config.destination.bucket = bucket;
    }
    if let Some(region) = get_env_string(env, "REGION")? {
        config.destination.region = region;
    }
    if let Some(endpoint) = get_env_string(env, "ENDPOINT")? {
        config.destination.endpoint = Some(endpoint);
    }
    if let Some(val) = get_env_bool(env, "FORCE_PATH_STYLE")? {
        config.destination.force_path_style = val;
    }
    if let Some(class) = get_env_string(env, "STORAGE_CLASS")? {
        config.destination.storage_class = Some(class);
    }
    if let Some(root) = get_env_string(env, "FS_ROOT")? {
        config.destination.fs_root = Some(root);
    }
    if let Some(template) = get_env_string(env, "KEY_TEMPLATE")? {
        config.destination.key_template = template;
    }
    if let Some(prefix) = get_env_string(env, "PREFIX")? {
        config.destination.prefix = prefix;
    }
    if let Some(id) = get_env_string(env, "DESTINATION_ACCESS_KEY_ID")? {
        config.destination.access_key_id = Some(id);
    }
    if let Some(key) = get_env_string(env, "DESTINATION_SECRET_ACCESS_KEY")? {
        config.destination.secret_access_key = Some(key);
    }
    if let Some(token) = get_env_string(env, "DESTINATION_SESSION_TOKEN")? {
        config.destination.session_token = Some(token);
    }
    if let Some(val) = get_env_bool(env, "USE_CLOUD_CREDENTIALS")? {
        config.destination.use_cloud_credentials = val;
    }

    // Window
    if let Some(val) = get_env_u64(env, "WINDOW_LENGTH_SECS")? {
        config.window.length_secs = val;
    }
    if let Some(val) = get_env_u64(env, "STABILIZATION_DELAY_SECS")? {
        config.window.stabilization_delay_secs = val;
    }
    if let Some(val) = get_env_bool(env, "WINDOW_ALIGN")? {
        config.window.align = val;
    }

    // Execution
    if let Some(mode) = get_env_string(env, "MODE")? {
        config.execution.mode = mode
            .parse::<ExecutionMode>()
            .context("Invalid CDNLOG_MODE value")?;
    }
    if let Some(val) = get_env_usize(env, "CHUNK_BYTES")? {
        config.execution.chunk_bytes = val;
    }
    if let Some(function) = get_env_string(env, "WORKER_FUNCTION")? {
        config.execution.worker_function = Some(function);
    }
    if let Some(namespace) = get_env_string(env, "WORKER_NAMESPACE")? {
        config.execution.worker_namespace = namespace;
    }
    if let Some(qualifier) = get_env_string(env, "WORKER_QUALIFIER")? {
        config.execution.worker_qualifier = qualifier;
    }
    if let Some(region) = get_env_string(env, "WORKER_REGION")? {
        config.execution.worker_region = Some(region);
    }
    if let Some(endpoint) = get_env_string(env, "INVOKE_ENDPOINT")? {
        config.execution.invoke_endpoint = endpoint;
    }

    // CDN provider
    if let Some(endpoint) = get_env_string(env, "CDN_ENDPOINT")? {
        config.cdn.endpoint = endpoint;
    }
    if let Some(area) = get_env_string(env, "CDN_AREA")? {
        config.cdn.area = area;
    }
    if let Some(offset) = get_env_i32(env, "CDN_UTC_OFFSET_HOURS")? {
        config.cdn.api_utc_offset_hours = offset;
    }

    // HTTP deadlines
    if let Some(val) = get_env_u64(env, "HTTP_TIMEOUT_SECS")? {
        config.http.timeout_secs = val;
    }
    if let Some(val) = get_env_u64(env, "HTTP_CONNECT_TIMEOUT_SECS")? {
        config.http.connect_timeout_secs = val;
    }

    // Logging
    if let Some(level) = get_env_string(env, "LOG_LEVEL")? {
        config.log.level = level;
    }
    if let Some(format) = get_env_string(env, "LOG_FORMAT")? {
        let parsed = match format.to_lowercase().as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Text,
        };
        config.log.format = Some(parsed);
    }

    // Platform-injected credentials (without CDNLOG_ prefix)
    let secret_id = get_raw_env_string(env, "TENCENTCLOUD_SECRETID")?;
    let secret_key = get_raw_env_string(env, "TENCENTCLOUD_SECRETKEY")?;
    if let (Some(id), Some(key)) = (secret_id, secret_key) {
        if !id.is_empty() && !key.is_empty() {
            let token = get_raw_env_string(env, "TENCENTCLOUD_SESSIONTOKEN")?;
            config.credentials = Some(CloudCredentials::new(id, key, token));
        }
    }

    Ok(())
}

fn get_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get(key))
}

/// Get a raw environment variable without the CDNLOG_ prefix
fn get_raw_env_string<E: EnvSource>(env: &E, key: &str) -> Result<Option<String>> {
    Ok(env.get_raw(key))
}

fn get_env_usize<E: EnvSource>(env: &E, key: &str) -> Result<Option<usize>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<usize>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_u64<E: EnvSource>(env: &E, key: &str) -> Result<Option<u64>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<u64>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_i32<E: EnvSource>(env: &E, key: &str) -> Result<Option<i32>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<i32>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

fn get_env_bool<E: EnvSource>(env: &E, key: &str) -> Result<Option<bool>> {
    match get_env_string(env, key)? {
        Some(val) => {
            let parsed = match val.trim().to_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" => false,
                other => {
                    return Err(anyhow!(
                        "Failed to parse {}{} (expected bool): {}",
                        ENV_PREFIX,
                        key,
                        other
                    ))
                }
            };
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}
