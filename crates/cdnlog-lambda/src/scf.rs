// SCF custom runtime loop
//
// The platform starts `bootstrap` with SCF_RUNTIME_API and
// SCF_RUNTIME_API_PORT set. The function reports readiness once, then
// long-polls for invocations and posts each result back. Only undecodable
// payloads go to the error endpoint; pipeline failures are part of the result
// object like on Lambda.

use crate::{handle_event, FunctionState, InvocationEvent};
use anyhow::{bail, Context, Result};
use std::time::Duration;
use tracing::{info, warn};
use url::Url;

pub const RUNTIME_API_ENV: &str = "SCF_RUNTIME_API";
pub const RUNTIME_API_PORT_ENV: &str = "SCF_RUNTIME_API_PORT";

const READY_PATH: &str = "runtime/init/ready";
const NEXT_PATH: &str = "runtime/invocation/next";
const RESPONSE_PATH: &str = "runtime/invocation/response";
const ERROR_PATH: &str = "runtime/invocation/error";

/// Client for the SCF runtime API
#[derive(Debug, Clone)]
pub struct ScfRuntime {
    client: reqwest::Client,
    base: Url,
}

impl ScfRuntime {
    pub fn new(base: Url) -> Result<Self> {
        // `next` blocks until an invocation arrives, so only connecting is bounded
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to create runtime API client")?;
        Ok(Self { client, base })
    }

    pub fn from_env() -> Result<Self> {
        let host = std::env::var(RUNTIME_API_ENV)
            .with_context(|| format!("{} is not set", RUNTIME_API_ENV))?;
        let port = std::env::var(RUNTIME_API_PORT_ENV)
            .with_context(|| format!("{} is not set", RUNTIME_API_PORT_ENV))?;
        let base = Url::parse(&format!("http://{}:{}/", host, port))
            .with_context(|| format!("Invalid runtime API address {}:{}", host, port))?;
        Self::new(base)
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base
            .join(path)
            .with_context(|| format!("Invalid runtime API path {}", path))
    }

    async fn post(&self, path: &str, body: String) -> Result<()> {
        let response = self
            .client
            .post(self.endpoint(path)?)
            .body(body)
            .send()
            .await
            .with_context(|| format!("POST /{} failed", path))?;

        let status = response.status();
        if !status.is_success() {
            bail!("POST /{} returned HTTP {}", path, status);
        }
        Ok(())
    }

    /// Tell the platform that initialization finished
    pub async fn ready(&self) -> Result<()> {
        self.post(READY_PATH, " ".to_string()).await
    }

    /// Wait for one invocation, handle it and post the result
    pub async fn serve_one(&self, state: &FunctionState) -> Result<()> {
        let response = self
            .client
            .get(self.endpoint(NEXT_PATH)?)
            .send()
            .await
            .context("Failed to poll for the next invocation")?;

        let status = response.status();
        if !status.is_success() {
            bail!("GET /{} returned HTTP {}", NEXT_PATH, status);
        }

        let request_id = response
            .headers()
            .get("request_id")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();
        let body = response
            .bytes()
            .await
            .context("Failed to read invocation payload")?;

        let event: InvocationEvent = match serde_json::from_slice(&body) {
            Ok(event) => event,
            Err(err) => {
                warn!(request_id = %request_id, error = %err, "Undecodable invocation payload");
                return self
                    .post(ERROR_PATH, format!("invalid event payload: {}", err))
                    .await;
            }
        };

        info!(request_id = %request_id, "Handling invocation");
        let result = handle_event(event, state).await;
        self.post(RESPONSE_PATH, result.to_string()).await
    }

    /// Report readiness, then serve invocations until the runtime API fails
    pub async fn serve(&self, state: &FunctionState) -> Result<()> {
        self.ready().await?;
        loop {
            self.serve_one(state).await?;
        }
    }
}
