// Dispatcher: one harvesting run
//
// Computes the window, resolves hosts, lists each host's archives and hands
// every URL to a worker (inline) or to a separate invocation (fanout).
// Per-host and per-URL failures are recorded in the summary; the run itself
// only becomes a failure when host discovery fails.

use crate::invoker::WorkerInvoker;
use crate::worker::Worker;
use cdnlog_core::{
    redact_url, DispatchSummary, Domain, ExecutionMode, KeyDeriver, LogWindow, PipelineError,
    WindowSpec, WorkItem,
};
use cdnlog_upstream::CdnProvider;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Where work items go
#[derive(Clone)]
pub enum Handoff {
    Inline(Worker),
    Fanout(Arc<dyn WorkerInvoker>),
}

impl Handoff {
    pub fn mode(&self) -> ExecutionMode {
        match self {
            Handoff::Inline(_) => ExecutionMode::Inline,
            Handoff::Fanout(_) => ExecutionMode::Fanout,
        }
    }
}

#[derive(Clone)]
pub struct Dispatcher {
    cdn: Arc<dyn CdnProvider>,
    hosts: Vec<Domain>,
    deriver: KeyDeriver,
    window: WindowSpec,
    handoff: Handoff,
}

impl Dispatcher {
    /// `hosts` is the configured allow-list; empty means discover every domain
    pub fn new<I, S>(
        cdn: Arc<dyn CdnProvider>,
        hosts: I,
        deriver: KeyDeriver,
        window: WindowSpec,
        handoff: Handoff,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            cdn,
            hosts: Domain::normalize_list(hosts),
            deriver,
            window,
            handoff,
        }
    }

    pub fn mode(&self) -> ExecutionMode {
        self.handoff.mode()
    }

    pub fn window_at(&self, now: DateTime<Utc>) -> LogWindow {
        self.window.window_at(now)
    }

    pub async fn run(&self) -> DispatchSummary {
        self.run_at(Utc::now()).await
    }

    pub async fn run_at(&self, now: DateTime<Utc>) -> DispatchSummary {
        let window = self.window.window_at(now);
        let mut summary = DispatchSummary::new(self.mode(), &window);
        info!(mode = %self.mode(), window = %window, "Starting dispatch run");

        let hosts = match self.resolve_hosts().await {
            Ok(hosts) => hosts,
            Err(err) => {
                error!(error = %err, "Host discovery failed; nothing dispatched");
                summary.abort(&err);
                return summary.finish();
            }
        };

        for host in &hosts {
            // A host whose listing fails counts as visited with zero URLs
            summary.hosts_processed += 1;
            let urls = match self.cdn.list_log_urls(host, &window).await {
                Ok(urls) => urls,
                Err(err) => {
                    warn!(host = %host, error = %err, "Failed to list log archives");
                    summary.hosts_failed += 1;
                    continue;
                }
            };

            for url in &urls {
                self.dispatch_url(host, url, &mut summary).await;
            }
        }

        let summary = summary.finish();
        info!(
            status = ?summary.status,
            hosts_processed = summary.hosts_processed,
            hosts_failed = summary.hosts_failed,
            dispatched_urls = summary.dispatched_urls,
            malformed_urls = summary.malformed_urls,
            uploaded = summary.uploaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "Dispatch run finished"
        );
        summary
    }

    async fn resolve_hosts(&self) -> Result<Vec<Domain>, PipelineError> {
        if !self.hosts.is_empty() {
            return Ok(self.hosts.clone());
        }
        let discovered = self.cdn.list_domains().await?;
        Ok(Domain::normalize_list(discovered.into_iter().map(|d| d.host)))
    }

    async fn dispatch_url(&self, host: &Domain, url: &str, summary: &mut DispatchSummary) {
        let key = match self.deriver.derive(url) {
            Ok(key) => key,
            Err(err) => {
                warn!(host = %host, url = %redact_url(url), error = %err, "Skipping malformed log URL");
                summary.malformed_urls += 1;
                return;
            }
        };
        let item = WorkItem::new(url, key);

        match &self.handoff {
            Handoff::Inline(worker) => {
                summary.dispatched_urls += 1;
                let outcome = worker.process_item(&item).await;
                summary.record(&outcome);
            }
            Handoff::Fanout(invoker) => match invoker.invoke(&item).await {
                Ok(()) => summary.dispatched_urls += 1,
                Err(err) => {
                    warn!(host = %host, url = %redact_url(url), key = %item.key, error = %err, "Worker invocation failed");
                    summary.failed += 1;
                }
            },
        }
    }
}
