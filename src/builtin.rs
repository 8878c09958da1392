//! Built-in handlers available to `[[tasks]]` entries
//!
//! Useful for smoke-testing a server deployment without writing code:
//! - `echo`: returns the task input as output
//! - `noop`: completes with no output
//! - `sleep`: waits `duration_ms` from the input, then completes
//! - `fail`: fails terminally with the input `reason`

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use taskrunner::{terminal, SharedHandler, Task, TaskOutput};

/// Names accepted by `lookup`
pub const NAMES: &[&str] = &["echo", "noop", "sleep", "fail"];

/// Longest wait the `sleep` handler honours
const MAX_SLEEP: Duration = Duration::from_secs(3600);

/// Handler registered under `name`
pub fn lookup(name: &str) -> Option<SharedHandler> {
    let handler: SharedHandler = match name.trim() {
        "echo" => Arc::new(echo),
        "noop" => Arc::new(noop),
        "sleep" => Arc::new(sleep),
        "fail" => Arc::new(fail),
        _ => return None,
    };
    Some(handler)
}

async fn echo(task: Task) -> anyhow::Result<TaskOutput> {
    Ok(TaskOutput::from(task.input_data))
}

async fn noop(_task: Task) -> anyhow::Result<TaskOutput> {
    Ok(TaskOutput::empty())
}

async fn sleep(task: Task) -> anyhow::Result<TaskOutput> {
    let millis = task
        .input("duration_ms")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let duration = Duration::from_millis(millis).min(MAX_SLEEP);

    tokio::time::sleep(duration).await;
    Ok(TaskOutput::from(serde_json::json!({ "slept_ms": duration.as_millis() as u64 })))
}

async fn fail(task: Task) -> anyhow::Result<TaskOutput> {
    let reason = task
        .input("reason")
        .and_then(Value::as_str)
        .unwrap_or("failed by the fail handler");
    Err(terminal(reason))
}
