//! Task runner
//!
//! Worker-side runtime for a workflow orchestration server. For every
//! registered task type it polls the server for work, runs the task handler
//! with bounded concurrency and reports each result back, retrying failed
//! submissions.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use taskrunner::{HttpClientConfig, HttpTaskClient, RunnerOptions, Task, TaskOutput, TaskRunner};
//!
//! # async fn run() -> taskrunner::Result<()> {
//! let client = HttpTaskClient::new(HttpClientConfig::default())?;
//! let runner = TaskRunner::new(Arc::new(client), RunnerOptions::default());
//!
//! runner.start_worker(
//!     "resize_image",
//!     |task: Task| async move { Ok::<_, anyhow::Error>(TaskOutput::from(task.input_value())) },
//!     4,
//!     Duration::from_millis(200),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod types;
pub mod version;
pub mod worker;

pub use client::{HttpClientConfig, HttpTaskClient, PollRequest, TaskClient};
pub use config::RunnerConfig;
pub use error::{Error, Result};
pub use metrics::{Counter, Metrics, Timing};
pub use types::{Payload, Task, TaskRefUpdate, TaskResult, TaskResultStatus, TaskStatus};
pub use worker::{
    terminal, JsonHandler, LoopState, NonRetryableError, RetryPolicy, RunnerOptions, SharedHandler,
    TaskHandler, TaskOutput, TaskRunner, WorkerSettings, WorkerStatus,
};
