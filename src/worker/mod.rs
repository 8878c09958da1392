//! Task polling and execution runtime
//!
//! One supervisor loop per task type polls the server for as many tasks as
//! there are free slots and hands each task to its own execution unit.
//! `TaskRunner` is the handle used to start, resize, pause and stop workers.

mod barrier;
mod execution;
mod handler;
mod poll;
mod runner;
mod state;
mod supervisor;
mod update;

use std::sync::Arc;

use crate::client::TaskClient;
use crate::metrics::Metrics;

pub use barrier::{guarded, panic_message};
pub use execution::execute_task;
pub use handler::*;
pub use poll::fetch_batch;
pub use runner::*;
pub use state::*;
pub use update::*;

/// Everything a supervisor loop and its execution units share
pub struct RuntimeContext {
    /// Server connection, shared read-only
    pub client: Arc<dyn TaskClient>,

    /// Counters and timings
    pub metrics: Arc<Metrics>,

    /// Result submission retry policy
    pub retry: RetryPolicy,

    /// Identity reported with polls and results
    pub worker_id: String,

    /// Upper bound on one batch poll
    pub max_poll_batch: usize,
}
