// Serverless runtime adapter
//
// A single function handles the hourly timer (dispatcher) and fanned-out work
// items (worker). Both return a JSON result object; per-URL and per-host
// failures are reported in that object rather than as invocation errors, so
// the platform does not retry and the next tick picks the work up again.
//
// On SCF the invocation loop talks to the SCF runtime API (`scf`); everywhere
// else lambda_runtime drives it.

use cdnlog_config::{Platform, RuntimeConfig};
use cdnlog_pipeline::{Dispatcher, Worker};
use lambda_runtime::{service_fn, Error, LambdaEvent};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

mod event;
pub mod scf;

pub use event::{InvocationEvent, TimerEvent};
pub use scf::ScfRuntime;

pub struct FunctionState {
    worker: Worker,
    /// Absent when the function is deployed as a worker without CDN access
    dispatcher: Option<Dispatcher>,
}

impl FunctionState {
    pub fn new(worker: Worker, dispatcher: Option<Dispatcher>) -> Self {
        Self { worker, dispatcher }
    }

    pub async fn from_config(config: &RuntimeConfig) -> anyhow::Result<Self> {
        let worker = cdnlog_pipeline::build_worker(config).await?;
        let built = cdnlog_pipeline::build_dispatcher_with_worker(config, worker.clone()).await;
        let dispatcher = match built {
            Ok(dispatcher) => Some(dispatcher),
            Err(err) => {
                warn!(error = %err, "Dispatcher unavailable; timer events will be rejected");
                None
            }
        };
        Ok(Self::new(worker, dispatcher))
    }
}

/// Route one invocation to the worker or the dispatcher
pub async fn handle_event(event: InvocationEvent, state: &FunctionState) -> Value {
    match event {
        InvocationEvent::Work(item) => {
            let outcome = state.worker.process_item(&item).await;
            serde_json::to_value(&outcome).unwrap_or_else(|e| json!({"error": e.to_string()}))
        }
        InvocationEvent::Timer(timer) => {
            info!(
                trigger = timer.trigger_name.as_deref().unwrap_or("unknown"),
                time = timer.time.as_deref().unwrap_or_default(),
                "Timer tick"
            );
            run_dispatcher(state).await
        }
        InvocationEvent::Other(_) => run_dispatcher(state).await,
    }
}

async fn run_dispatcher(state: &FunctionState) -> Value {
    match &state.dispatcher {
        Some(dispatcher) => {
            let summary = dispatcher.run().await;
            serde_json::to_value(&summary).unwrap_or_else(|e| json!({"error": e.to_string()}))
        }
        None => json!({
            "status": "failure",
            "error_code": "E001",
            "error": "dispatcher is not configured for this function"
        }),
    }
}

async fn handle_request(event: LambdaEvent<InvocationEvent>, state: Arc<FunctionState>) -> Result<Value, Error> {
    let (payload, context) = event.into_parts();
    info!(request_id = %context.request_id, "Handling invocation");
    Ok(handle_event(payload, &state).await)
}

/// Serverless runtime entry point
pub async fn run() -> Result<(), Error> {
    let config = RuntimeConfig::load()?;
    cdnlog_pipeline::init_tracing(&config);
    info!(
        platform = %config.platform,
        mode = %config.execution.mode,
        bucket = %config.destination.bucket,
        "Starting cdnlog function"
    );

    let state = Arc::new(FunctionState::from_config(&config).await?);

    if config.platform == Platform::Scf {
        ScfRuntime::from_env()?.serve(&state).await?;
        return Ok(());
    }

    lambda_runtime::run(service_fn(move |event: LambdaEvent<InvocationEvent>| {
        let state = state.clone();
        async move { handle_request(event, state).await }
    }))
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cdnlog_core::{
        Domain, KeyDeriver, LogWindow, PipelineError, Result, WindowSpec, WorkItem,
    };
    use cdnlog_pipeline::{ArchiveSource, Handoff};
    use cdnlog_storage::{ArchiveStream, OpendalStore};
    use cdnlog_upstream::CdnProvider;

    struct NoArchives;

    #[async_trait]
    impl ArchiveSource for NoArchives {
        async fn open(&self, url: &str) -> Result<ArchiveStream> {
            Err(PipelineError::archive_fetch(url, "HTTP 404"))
        }
    }

    struct EmptyAccount;

    #[async_trait]
    impl CdnProvider for EmptyAccount {
        async fn list_domains(&self) -> Result<Vec<Domain>> {
            Ok(Vec::new())
        }

        async fn list_log_urls(&self, _: &Domain, _: &LogWindow) -> Result<Vec<String>> {
            Ok(Vec::new())
        }
    }

    pub(crate) fn state(with_dispatcher: bool) -> (FunctionState, OpendalStore) {
        let operator = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let store = OpendalStore::new(operator);
        let worker = Worker::new(
            Arc::new(store.clone()),
            Arc::new(NoArchives),
            KeyDeriver::default(),
            1024,
        );
        let dispatcher = with_dispatcher.then(|| {
            Dispatcher::new(
                Arc::new(EmptyAccount),
                Vec::<String>::new(),
                KeyDeriver::default(),
                WindowSpec::default(),
                Handoff::Inline(worker.clone()),
            )
        });
        (FunctionState::new(worker, dispatcher), store)
    }

    #[tokio::test]
    async fn work_item_returns_worker_outcome() {
        let (state, store) = state(false);
        store
            .operator()
            .write("cdnlog/a.example/20240315/01-a.example.gz", b"gz".to_vec())
            .await
            .unwrap();

        let item = WorkItem::new("https://cdn/log/20240315/01/01-a.example.gz", "");
        let result = handle_event(InvocationEvent::Work(item), &state).await;

        assert_eq!(result["status"], "skip");
        assert_eq!(result["key"], "/cdnlog/a.example/20240315/01-a.example.gz");
    }

    #[tokio::test]
    async fn failed_work_item_reports_error_code() {
        let (state, _store) = state(false);
        let item = WorkItem::new("https://cdn/log/20240315/01/01-a.example.gz", "");

        let result = handle_event(InvocationEvent::Work(item), &state).await;

        assert_eq!(result["status"], "failure");
        assert_eq!(result["error_code"], "E006");
    }

    #[tokio::test]
    async fn timer_tick_returns_summary() {
        let (state, _store) = state(true);

        let result = handle_event(InvocationEvent::Timer(TimerEvent::default()), &state).await;

        assert_eq!(result["status"], "success");
        assert_eq!(result["hosts_processed"], 0);
        assert_eq!(result["dispatched_urls"], 0);
    }

    #[tokio::test]
    async fn tick_without_dispatcher_is_rejected() {
        let (state, _store) = state(false);

        let result = handle_event(InvocationEvent::Other(Value::Null), &state).await;

        assert_eq!(result["status"], "failure");
        assert_eq!(result["error_code"], "E001");
    }
}
