// Store initialization from the runtime configuration

use crate::{ArchiveStore, OpendalStore, S3Store, S3StoreOptions};
use anyhow::{Context, Result};
use cdnlog_config::{RuntimeConfig, StorageBackend};
use std::sync::Arc;
use tracing::info;

/// Build the configured destination store
pub async fn init_store(config: &RuntimeConfig) -> Result<Arc<dyn ArchiveStore>> {
    let destination = &config.destination;

    let store: Arc<dyn ArchiveStore> = match destination.backend {
        StorageBackend::Fs => {
            let root = destination
                .fs_root
                .as_deref()
                .context("destination.fs_root is required for the fs backend")?;
            info!(root, bucket = %destination.bucket, "Using filesystem store");
            Arc::new(
                OpendalStore::fs(root, &destination.bucket)
                    .context("Failed to initialize filesystem store")?,
            )
        }
        StorageBackend::S3 => {
            let credentials = destination.static_credentials().or_else(|| {
                if destination.use_cloud_credentials {
                    config.credentials.clone()
                } else {
                    None
                }
            });

            info!(
                bucket = %destination.bucket,
                region = %destination.region,
                endpoint = destination.endpoint.as_deref().unwrap_or("default"),
                static_credentials = credentials.is_some(),
                "Using S3-compatible store"
            );

            let options = S3StoreOptions {
                bucket: destination.bucket.clone(),
                region: destination.region.clone(),
                endpoint: destination.endpoint.clone(),
                force_path_style: destination.force_path_style,
                storage_class: destination.storage_class.clone(),
                credentials,
            };
            Arc::new(
                S3Store::connect(options)
                    .await
                    .context("Failed to initialize S3 store")?,
            )
        }
    };

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdnlog_config::Platform;

    #[tokio::test]
    async fn builds_fs_store_from_config() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.destination.backend = StorageBackend::Fs;
        config.destination.bucket = "logs".to_string();
        config.destination.fs_root = Some(dir.path().to_string_lossy().into_owned());

        let store = init_store(&config).await?;
        assert_eq!(store.name(), "fs");
        assert!(!store.exists("/cdnlog/a.example/20240315/01-a.example.gz").await?);
        Ok(())
    }

    #[tokio::test]
    async fn fs_backend_without_root_fails() {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.destination.backend = StorageBackend::Fs;
        assert!(init_store(&config).await.is_err());
    }
}
