// cdnlog-core - Pure building blocks for the CDN log archiver
//
// Nothing in this crate performs I/O:
// - window: the [start, end) interval harvested by each dispatcher run
// - key: parsing archive URLs and rendering destination keys
// - work: hosts, work items and execution modes shared by dispatcher and worker
// - outcome: per-URL results and per-run summaries
// - error: error kinds with stable codes

pub mod error;
pub mod key;
pub mod outcome;
pub mod window;
pub mod work;

pub use error::{ErrorCode, PipelineError, Result};
pub use key::{normalize_prefix, KeyDeriver, LogArchive, DEFAULT_KEY_TEMPLATE, DEFAULT_PREFIX};
pub use outcome::{DispatchSummary, RunStatus, WorkerOutcome, WorkerStatus};
pub use window::{
    LogWindow, WindowSpec, DEFAULT_STABILIZATION_DELAY_SECS, DEFAULT_WINDOW_LENGTH_SECS,
};
pub use work::{redact_url, Domain, ExecutionMode, WorkItem};
