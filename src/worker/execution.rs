//! Execution unit
//!
//! Runs the handler for one task, turns its outcome into a `TaskResult`,
//! submits it and gives the busy slot back. The slot is released when the
//! unit ends, whatever happened along the way.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, warn};

use crate::metrics::{Counter, Timing};
use crate::types::{Task, TaskResult};

use super::barrier::guarded;
use super::handler::is_non_retryable;
use super::state::BusySlot;
use super::update::submit_with_retry;
use super::RuntimeContext;

/// Execute `task` while holding `slot`
pub async fn execute_task(ctx: Arc<RuntimeContext>, task: Task, slot: BusySlot) {
    let record = Arc::clone(slot.record());
    let task_type = record.task_type();

    let unit = async {
        let result = run_handler(&ctx, task_type, &record.handler(), &task).await;
        submit(&ctx, task_type, result).await;
    };

    if let Err(e) = guarded("execution", task_type, &ctx.metrics, unit).await {
        debug!(task_id = %task.task_id, task_type, error = %e, "Execution unit ended early");
    }
    drop(slot);
}

async fn run_handler(
    ctx: &RuntimeContext,
    task_type: &str,
    handler: &super::SharedHandler,
    task: &Task,
) -> TaskResult {
    let metrics = &ctx.metrics;
    metrics.incr(Counter::Executions, task_type);

    debug!(task_id = %task.task_id, task_type, workflow_id = %task.workflow_instance_id, "Executing task");

    let started = Instant::now();
    let outcome = guarded("execute", task_type, metrics, handler.execute(task.clone())).await;
    metrics.record(Timing::Execute, task_type, started.elapsed());

    match outcome {
        Ok(Ok(output)) => output.into_result(task),
        Ok(Err(err)) => {
            metrics.incr(Counter::ExecutionErrors, task_type);
            let reason = format!("{:#}", err);
            let terminal = is_non_retryable(&err);
            warn!(
                task_id = %task.task_id,
                task_type,
                terminal,
                error = %reason,
                "Task handler failed"
            );
            if terminal {
                TaskResult::failed_terminal(task, reason)
            } else {
                TaskResult::failed(task, reason)
            }
        }
        Err(panicked) => {
            metrics.incr(Counter::ExecutionErrors, task_type);
            TaskResult::failed(task, panicked.to_string())
        }
    }
}

async fn submit(ctx: &RuntimeContext, task_type: &str, mut result: TaskResult) {
    if result.worker_id.is_none() {
        result.worker_id = Some(ctx.worker_id.clone());
    }

    match submit_with_retry(ctx.client.as_ref(), &ctx.metrics, ctx.retry, task_type, &result).await {
        Ok(()) => {
            debug!(task_id = %result.task_id, task_type, status = %result.status, "Task finished");
        }
        Err(e) => {
            error!(
                task_id = %result.task_id,
                task_type,
                status = %result.status,
                error = %e.format_for_log(),
                "Giving up on task result"
            );
        }
    }
}
