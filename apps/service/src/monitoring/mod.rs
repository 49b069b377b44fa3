/// Check execution engine
///
/// This module is responsible for:
/// - Probing monitored URLs with retry and backoff
/// - Evaluating TLS certificates
/// - Diffing results against the history ledger and emitting alert events
/// - Selecting due monitors and fanning checks out to workers
pub mod cert;
pub mod gate;
pub mod pipeline;
pub mod probe;
pub mod scheduler;
pub mod transition;
pub mod types;

pub use pipeline::CheckExecutor;
pub use scheduler::{CheckDispatcher, CheckSummary, DispatchOptions};
