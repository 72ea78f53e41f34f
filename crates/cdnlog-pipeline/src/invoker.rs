// Fan-out hand-off: one asynchronous worker invocation per work item

use async_trait::async_trait;
use cdnlog_core::{Result, WorkItem};
use cdnlog_upstream::ScfInvoker;

#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    /// Queue `item` for a separate worker; returns once the platform accepted it
    async fn invoke(&self, item: &WorkItem) -> Result<()>;
}

#[async_trait]
impl WorkerInvoker for ScfInvoker {
    async fn invoke(&self, item: &WorkItem) -> Result<()> {
        self.invoke_async(item).await.map(|_| ())
    }
}
