// Configuration source loading.
//
// Priority order:
// 1. Environment variables (CDNLOG_* prefix, plus TENCENTCLOUD_* credentials)
// 2. Config file path from CDNLOG_CONFIG
// 3. Inline config content from CDNLOG_CONFIG_CONTENT
// 4. Default config files (./cdnlog.toml, ./.cdnlog.toml)
// 5. Platform defaults (based on auto-detected Platform)

use crate::env_overrides::{self, EnvSource, ENV_PREFIX};
use crate::platform::Platform;
use crate::*;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_PATHS: [&str; 2] = ["./cdnlog.toml", "./.cdnlog.toml"];

/// Load configuration for the detected platform using native environment/file access.
pub fn load_config(platform: Platform) -> Result<RuntimeConfig> {
    let config = load_layered(platform, None)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let config = load_layered(Platform::detect(), Some(path.as_ref()))?;
    config.validate()?;
    Ok(config)
}

/// Layer defaults, file and environment without validating.
///
/// Used by commands that only need a subset of the settings (key preview,
/// window preview, config dump).
pub fn load_layered(platform: Platform, path: Option<&Path>) -> Result<RuntimeConfig> {
    let mut config = RuntimeConfig::from_platform_defaults(platform);

    let file_config = match path {
        Some(path) => Some(read_config_file(path)?),
        None => load_from_file()?,
    };
    if let Some(file_config) = file_config {
        config.merge(file_config);
    }

    let env_source = StdEnvSource;
    env_overrides::apply_env_overrides(&mut config, &env_source)?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var("CDNLOG_CONFIG") {
        return read_config_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var("CDNLOG_CONFIG_CONTENT") {
        let config: RuntimeConfig = toml::from_str(&content)
            .context("Failed to parse inline config from CDNLOG_CONFIG_CONTENT")?;
        return Ok(Some(config));
    }

    for path in DEFAULT_CONFIG_PATHS {
        let path = Path::new(path);
        if path.exists() {
            tracing::debug!(path = %path.display(), "Using default config file");
            return read_config_file(path).map(Some);
        }
    }

    Ok(None)
}

fn read_config_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

pub(crate) struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }

    fn get_raw(&self, key: &str) -> Option<String> {
        env::var(key).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_explicit_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
            hosts = ["a.example"]

            [destination]
            backend = "fs"
            bucket = "archive"
            region = "local"
            fs_root = "/tmp/cdnlog"

            [window]
            align = true
            "#
        )
        .unwrap();

        let config = read_config_file(file.path()).unwrap();
        assert_eq!(config.hosts, vec!["a.example"]);
        assert_eq!(config.destination.backend, StorageBackend::Fs);
        assert!(config.window.align);
        assert_eq!(config.window.length_secs, 3600);
    }

    #[test]
    fn unparseable_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "hosts = [").unwrap();

        let err = read_config_file(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse config file"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = read_config_file(Path::new("/nonexistent/cdnlog.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
