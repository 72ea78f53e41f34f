// Signed JSON client for the cloud API
//
// One `CloudApiClient` targets one service endpoint (CDN, SCF). Calls are
// `POST /` with the action and version in `X-TC-*` headers; responses wrap
// either the payload or an `Error { Code, Message }` in a `Response` object.

use crate::tc3::{self, SigningRequest};
use cdnlog_config::{CloudCredentials, HttpConfig};
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

/// Failures talking to the cloud API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid endpoint '{endpoint}': {reason}")]
    Endpoint { endpoint: String, reason: String },

    #[error("{action} request failed: {message}")]
    Transport { action: String, message: String },

    #[error("{action} returned HTTP {status}: {body}")]
    Status {
        action: String,
        status: u16,
        body: String,
    },

    #[error("{action} failed with {code}: {message} (request id {request_id})")]
    Api {
        action: String,
        code: String,
        message: String,
        request_id: String,
    },

    #[error("{action} response could not be decoded: {message}")]
    Decode { action: String, message: String },
}

impl ApiError {
    /// Provider error code, when the API answered with one
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Api { code, .. } => Some(code),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Response")]
    response: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(rename = "Code")]
    code: String,
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Clone)]
pub struct CloudApiClient {
    http: reqwest::Client,
    endpoint: Url,
    host: String,
    service: String,
    version: String,
    region: Option<String>,
    credentials: CloudCredentials,
}

impl std::fmt::Debug for CloudApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudApiClient")
            .field("endpoint", &self.endpoint.as_str())
            .field("service", &self.service)
            .field("version", &self.version)
            .field("region", &self.region)
            .finish()
    }
}

impl CloudApiClient {
    pub fn new(
        endpoint: &str,
        service: impl Into<String>,
        version: impl Into<String>,
        region: Option<String>,
        credentials: CloudCredentials,
        http: &HttpConfig,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .timeout(http.timeout())
            .connect_timeout(http.connect_timeout())
            .build()
            .map_err(|e| ApiError::Endpoint {
                endpoint: endpoint.to_string(),
                reason: format!("failed to create HTTP client: {}", e),
            })?;
        Self::with_client(client, endpoint, service, version, region, credentials)
    }

    pub fn with_client(
        http: reqwest::Client,
        endpoint: &str,
        service: impl Into<String>,
        version: impl Into<String>,
        region: Option<String>,
        credentials: CloudCredentials,
    ) -> Result<Self, ApiError> {
        let invalid = |reason: &str| ApiError::Endpoint {
            endpoint: endpoint.to_string(),
            reason: reason.to_string(),
        };

        let url = Url::parse(endpoint).map_err(|e| invalid(&e.to_string()))?;
        let host_name = url.host_str().ok_or_else(|| invalid("missing host"))?;
        // Matches the Host header reqwest derives from the URL
        let host = match url.port() {
            Some(port) => format!("{}:{}", host_name, port),
            None => host_name.to_string(),
        };

        Ok(Self {
            http,
            endpoint: url,
            host,
            service: service.into(),
            version: version.into(),
            region: region.filter(|r| !r.is_empty()),
            credentials,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Invoke `action` with `request` as the JSON payload and decode the
    /// `Response` object into `T`.
    pub async fn call<Req, T>(&self, action: &str, request: &Req) -> Result<T, ApiError>
    where
        Req: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let payload = serde_json::to_vec(request).map_err(|e| ApiError::Decode {
            action: action.to_string(),
            message: format!("failed to encode request: {}", e),
        })?;

        let timestamp = Utc::now();
        let authorization = tc3::authorization(
            &self.credentials.secret_id,
            &self.credentials.secret_key,
            &SigningRequest {
                service: &self.service,
                host: &self.host,
                payload: &payload,
                timestamp,
            },
        );

        let mut builder = self
            .http
            .post(self.endpoint.clone())
            .header("Content-Type", tc3::CONTENT_TYPE)
            .header("Authorization", authorization)
            .header("X-TC-Action", action)
            .header("X-TC-Timestamp", timestamp.timestamp().to_string())
            .header("X-TC-Version", &self.version);
        if let Some(region) = &self.region {
            builder = builder.header("X-TC-Region", region);
        }
        if let Some(token) = &self.credentials.token {
            builder = builder.header("X-TC-Token", token);
        }

        debug!(service = %self.service, action, "Calling cloud API");
        let response = builder
            .body(payload)
            .send()
            .await
            .map_err(|e| ApiError::Transport {
                action: action.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| ApiError::Transport {
            action: action.to_string(),
            message: e.to_string(),
        })?;

        if !status.is_success() {
            return Err(ApiError::Status {
                action: action.to_string(),
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).chars().take(512).collect(),
            });
        }

        decode_response(action, &body)
    }
}

fn decode_response<T: DeserializeOwned>(action: &str, body: &[u8]) -> Result<T, ApiError> {
    let decode_err = |message: String| ApiError::Decode {
        action: action.to_string(),
        message,
    };

    let envelope: Envelope = serde_json::from_slice(body).map_err(|e| decode_err(e.to_string()))?;

    if let Some(error) = envelope.response.get("Error") {
        let error: ErrorBody =
            serde_json::from_value(error.clone()).map_err(|e| decode_err(e.to_string()))?;
        let request_id = envelope
            .response
            .get("RequestId")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        return Err(ApiError::Api {
            action: action.to_string(),
            code: error.code,
            message: error.message,
            request_id,
        });
    }

    serde_json::from_value(envelope.response).map_err(|e| decode_err(e.to_string()))
}
