// Wiring from a validated RuntimeConfig

use crate::dispatcher::{Dispatcher, Handoff};
use crate::source::HttpArchiveSource;
use crate::worker::Worker;
use anyhow::{Context, Result};
use cdnlog_config::RuntimeConfig;
use cdnlog_core::ExecutionMode;
use cdnlog_upstream::{ScfInvoker, TencentCdn};
use std::sync::Arc;

/// Worker backed by the configured store and an HTTP archive source
pub async fn build_worker(config: &RuntimeConfig) -> Result<Worker> {
    let store = cdnlog_storage::init_store(config).await?;
    let source = HttpArchiveSource::new(&config.http)?;
    let deriver = config.destination.key_deriver()?;
    Ok(Worker::new(
        store,
        Arc::new(source),
        deriver,
        config.execution.chunk_bytes,
    ))
}

/// Dispatcher for the configured execution mode
pub async fn build_dispatcher(config: &RuntimeConfig) -> Result<Dispatcher> {
    assemble_dispatcher(config, None).await
}

/// Dispatcher that hands inline work to an existing worker instead of
/// building a second store client
pub async fn build_dispatcher_with_worker(
    config: &RuntimeConfig,
    worker: Worker,
) -> Result<Dispatcher> {
    assemble_dispatcher(config, Some(worker)).await
}

async fn assemble_dispatcher(
    config: &RuntimeConfig,
    worker: Option<Worker>,
) -> Result<Dispatcher> {
    let credentials = config.credentials.clone().context(
        "Cloud API credentials are required to list CDN logs (TENCENTCLOUD_SECRETID/TENCENTCLOUD_SECRETKEY)",
    )?;

    let cdn = TencentCdn::new(&config.cdn, credentials.clone(), &config.http)?;

    let handoff = match config.execution.mode {
        ExecutionMode::Inline => match worker {
            Some(worker) => Handoff::Inline(worker),
            None => Handoff::Inline(build_worker(config).await?),
        },
        ExecutionMode::Fanout => {
            let invoker = ScfInvoker::new(
                &config.execution,
                config.worker_region(),
                credentials,
                &config.http,
            )?;
            Handoff::Fanout(Arc::new(invoker))
        }
    };

    Ok(Dispatcher::new(
        Arc::new(cdn),
        &config.hosts,
        config.destination.key_deriver()?,
        config.window.spec(),
        handoff,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use cdnlog_config::{CloudCredentials, Platform, StorageBackend};

    fn fs_config(root: &std::path::Path) -> RuntimeConfig {
        let mut config = RuntimeConfig::from_platform_defaults(Platform::Local);
        config.destination.backend = StorageBackend::Fs;
        config.destination.bucket = "logs".to_string();
        config.destination.fs_root = Some(root.to_string_lossy().into_owned());
        config
    }

    #[tokio::test]
    async fn dispatcher_requires_credentials() {
        let dir = tempfile::tempdir().unwrap();
        let config = fs_config(dir.path());
        let err = match build_dispatcher(&config).await {
            Ok(_) => panic!("expected missing credentials"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("credentials"));
    }

    #[tokio::test]
    async fn builds_inline_and_fanout_dispatchers() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fs_config(dir.path());
        config.hosts = vec!["b.example".to_string(), "a.example".to_string()];
        config.credentials = Some(CloudCredentials::new("id", "key", None));

        let inline = build_dispatcher(&config).await.unwrap();
        assert_eq!(inline.mode(), ExecutionMode::Inline);

        config.execution.mode = ExecutionMode::Fanout;
        config.execution.worker_function = Some("cdnlog-worker".to_string());
        config.destination.region = "ap-guangzhou".to_string();
        let fanout = build_dispatcher(&config).await.unwrap();
        assert_eq!(fanout.mode(), ExecutionMode::Fanout);
    }

    #[tokio::test]
    async fn inline_dispatcher_reuses_supplied_worker() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = fs_config(dir.path());
        config.credentials = Some(CloudCredentials::new("id", "key", None));
        let worker = build_worker(&config).await.unwrap();

        // No second store is built, so an unusable store config no longer matters
        config.destination.fs_root = None;
        assert!(build_dispatcher(&config).await.is_err());

        let dispatcher = build_dispatcher_with_worker(&config, worker).await.unwrap();
        assert_eq!(dispatcher.mode(), ExecutionMode::Inline);
    }
}
