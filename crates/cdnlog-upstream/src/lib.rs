// cdnlog-upstream - Adapters to the cloud provider's APIs
//
// - `CloudApiClient`: TC3-HMAC-SHA256 signed JSON calls over reqwest
// - `CdnProvider` / `TencentCdn`: domain discovery and log archive listing
// - `ScfInvoker`: asynchronous worker invocation for fan-out mode

pub mod cdn;
pub mod client;
pub mod invoke;
pub mod tc3;

pub use cdn::{CdnProvider, TencentCdn};
pub use client::{ApiError, CloudApiClient};
pub use invoke::ScfInvoker;
