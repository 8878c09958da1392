//! Per task type supervisor loop
//!
//! Sizes each batch poll to the free slots of its record and spawns one
//! execution unit per task received. A failed or panicking fetch is counted
//! and retried after the poll interval. The loop never cancels running units:
//! once capacity drops to zero it stops polling, waits for `busy` to reach
//! zero and then exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::PollRequest;
use crate::metrics::Counter;

use super::barrier::guarded;
use super::execution::execute_task;
use super::poll::fetch_batch;
use super::state::{Plan, WorkerRecord};
use super::RuntimeContext;

/// Shortest wait when no slot is free, the loop is draining or a fetch failed
const MIN_IDLE: Duration = Duration::from_millis(10);

/// Spawn the loop for `record`. The caller must have won `claim_loop`.
pub fn spawn_supervisor(ctx: Arc<RuntimeContext>, record: Arc<WorkerRecord>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let task_type = record.task_type().to_string();
        let outcome = guarded("supervisor", &task_type, &ctx.metrics, supervise(&ctx, &record)).await;

        if outcome.is_err() {
            // Units already spawned still hold slots; `Stopped` means drained
            record.wait_idle(MIN_IDLE).await;
            record.mark_stopped();
            warn!(task_type = %task_type, capacity = record.capacity(), "Supervisor loop ended abnormally");
        }
    })
}

async fn supervise(ctx: &Arc<RuntimeContext>, record: &Arc<WorkerRecord>) {
    let task_type = record.task_type();
    info!(task_type, worker_id = %ctx.worker_id, "Supervisor loop started");

    loop {
        match record.plan(ctx.max_poll_batch) {
            Plan::Exit => break,
            Plan::Paused { interval } => record.idle(interval).await,
            Plan::Full { interval } => record.idle(interval.max(MIN_IDLE)).await,
            Plan::Drain { interval } => {
                debug!(task_type, busy = record.busy(), "Waiting for in-flight tasks");
                record.idle(interval.max(MIN_IDLE)).await;
            }
            Plan::Poll {
                count,
                domain,
                timeout,
                interval,
            } => {
                let request = PollRequest {
                    task_type: task_type.to_string(),
                    domain,
                    worker_id: ctx.worker_id.clone(),
                    count,
                    timeout,
                };

                let fetch = fetch_batch(ctx.client.as_ref(), &ctx.metrics, &request);
                match guarded("poll", task_type, &ctx.metrics, fetch).await {
                    Ok(Ok(tasks)) if tasks.is_empty() => record.idle(interval).await,
                    Ok(Ok(tasks)) => {
                        if tasks.len() > count {
                            warn!(task_type, requested = count, received = tasks.len(), "Server returned more tasks than requested");
                        }
                        for task in tasks {
                            let slot = record.acquire();
                            tokio::spawn(execute_task(Arc::clone(ctx), task, slot));
                        }
                    }
                    Ok(Err(_)) => record.idle(interval.max(MIN_IDLE)).await,
                    Err(_) => {
                        // A panicking client counts as a failed fetch
                        ctx.metrics.incr(Counter::PollErrors, task_type);
                        record.idle(interval.max(MIN_IDLE)).await;
                    }
                }
            }
        }
    }

    info!(task_type, "Supervisor loop stopped");
}
