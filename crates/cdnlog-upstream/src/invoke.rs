// Serverless function invoker for fan-out mode
//
// Each WorkItem becomes one asynchronous (`InvocationType=Event`) invocation
// of the worker function; its JSON is passed as the event body.

use crate::client::CloudApiClient;
use cdnlog_config::{CloudCredentials, ExecutionConfig, HttpConfig};
use cdnlog_core::{redact_url, PipelineError, Result, WorkItem};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const SCF_SERVICE: &str = "scf";
pub const SCF_API_VERSION: &str = "2018-04-16";

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct InvokeRequest<'a> {
    function_name: &'a str,
    invocation_type: &'static str,
    client_context: String,
    namespace: &'a str,
    qualifier: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InvokeResponse {
    #[serde(default)]
    request_id: String,
}

#[derive(Debug, Clone)]
pub struct ScfInvoker {
    client: CloudApiClient,
    function: String,
    namespace: String,
    qualifier: String,
}

impl ScfInvoker {
    pub fn new(
        execution: &ExecutionConfig,
        region: &str,
        credentials: CloudCredentials,
        http: &HttpConfig,
    ) -> Result<Self> {
        let function = execution
            .worker_function
            .clone()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| {
                PipelineError::config_invalid("execution.worker_function is required in fanout mode")
            })?;

        let client = CloudApiClient::new(
            &execution.invoke_endpoint,
            SCF_SERVICE,
            SCF_API_VERSION,
            Some(region.to_string()),
            credentials,
            http,
        )
        .map_err(|e| PipelineError::config_invalid(e.to_string()))?;

        Ok(Self::with_client(
            client,
            function,
            execution.worker_namespace.clone(),
            execution.worker_qualifier.clone(),
        ))
    }

    pub fn with_client(
        client: CloudApiClient,
        function: impl Into<String>,
        namespace: impl Into<String>,
        qualifier: impl Into<String>,
    ) -> Self {
        Self {
            client,
            function: function.into(),
            namespace: namespace.into(),
            qualifier: qualifier.into(),
        }
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    /// Fire-and-forget invocation; returns the platform request id
    pub async fn invoke_async(&self, item: &WorkItem) -> Result<String> {
        let client_context = serde_json::to_string(item)
            .map_err(|e| PipelineError::invoke_failed(format!("failed to encode work item: {}", e)))?;

        let response: InvokeResponse = self
            .client
            .call(
                "Invoke",
                &InvokeRequest {
                    function_name: &self.function,
                    invocation_type: "Event",
                    client_context,
                    namespace: &self.namespace,
                    qualifier: &self.qualifier,
                },
            )
            .await
            .map_err(|e| {
                PipelineError::invoke_failed(format!(
                    "{} for {}: {}",
                    self.function,
                    redact_url(&item.url),
                    e
                ))
            })?;

        debug!(
            function = %self.function,
            url = %redact_url(&item.url),
            request_id = %response.request_id,
            "Invoked worker"
        );
        Ok(response.request_id)
    }
}
