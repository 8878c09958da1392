//! Orchestration server communication
//!
//! The runtime needs three calls from the server:
//! - Batch poll: fetch up to N tasks of a type
//! - Update: submit the result of one task
//! - Update by reference: address a task by workflow and reference name
//!
//! `TaskClient` is the seam; `HttpTaskClient` speaks the HTTP+JSON API.

mod http;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{Task, TaskRefUpdate, TaskResult};

pub use http::*;

/// Parameters of one batch poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    /// Task type to poll
    pub task_type: String,

    /// Routing domain, `None` polls the default partition
    pub domain: Option<String>,

    /// Identity reported to the server
    pub worker_id: String,

    /// Maximum number of tasks wanted (at least 1)
    pub count: usize,

    /// Long-poll timeout
    pub timeout: Duration,
}

/// Calls the runtime makes against the orchestration server
#[async_trait]
pub trait TaskClient: Send + Sync {
    /// Fetch up to `request.count` tasks. An empty vector means no work is
    /// available and is not an error.
    async fn batch_poll(&self, request: &PollRequest) -> Result<Vec<Task>>;

    /// Submit the result of one task
    async fn update_task(&self, result: &TaskResult) -> Result<()>;

    /// Update a task addressed by workflow instance and reference name
    async fn update_task_by_ref_name(&self, update: &TaskRefUpdate, worker_id: &str) -> Result<()>;
}
