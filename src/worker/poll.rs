//! Batch fetch adapter
//!
//! Wraps `TaskClient::batch_poll` with timing and error counting. An empty
//! batch is a normal outcome; only transport or server failures are errors.

use std::time::Instant;

use tracing::{debug, warn};

use crate::client::{PollRequest, TaskClient};
use crate::error::Result;
use crate::metrics::{Counter, Metrics, Timing};
use crate::types::Task;

/// Fetch up to `request.count` tasks, recording metrics either way
pub async fn fetch_batch(
    client: &dyn TaskClient,
    metrics: &Metrics,
    request: &PollRequest,
) -> Result<Vec<Task>> {
    let task_type = request.task_type.as_str();
    metrics.incr(Counter::Polls, task_type);

    let started = Instant::now();
    let outcome = client.batch_poll(request).await;
    metrics.record(Timing::Poll, task_type, started.elapsed());

    match outcome {
        Ok(tasks) => {
            if !tasks.is_empty() {
                metrics.add(Counter::TasksReceived, task_type, tasks.len() as u64);
                debug!(
                    task_type,
                    requested = request.count,
                    received = tasks.len(),
                    "Polled tasks"
                );
            }
            Ok(tasks)
        }
        Err(e) => {
            metrics.incr(Counter::PollErrors, task_type);
            warn!(
                task_type,
                domain = request.domain.as_deref().unwrap_or(""),
                error = %e,
                "Batch poll failed"
            );
            Err(e)
        }
    }
}
