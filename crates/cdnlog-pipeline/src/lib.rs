// cdnlog-pipeline - The two deployable roles
//
// - `Dispatcher`: periodic run that discovers archives and hands them out
// - `Worker`: lands one archive with HEAD-before-upload and multipart streaming
//
// `build_worker` / `build_dispatcher` wire both from a `RuntimeConfig`;
// `init_tracing` installs the log subscriber for either binary.

mod dispatcher;
mod init;
mod invoker;
mod source;
mod telemetry;
mod worker;

pub use dispatcher::{Dispatcher, Handoff};
pub use init::{build_dispatcher, build_dispatcher_with_worker, build_worker};
pub use invoker::WorkerInvoker;
pub use source::{ArchiveSource, HttpArchiveSource};
pub use telemetry::init_tracing;
pub use worker::Worker;
