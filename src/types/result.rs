//! Task result definitions
//!
//! Values sent back to the server once a task has been executed.

use std::fmt;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::task::{Payload, Task};

/// Outcome reported for an executed task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskResultStatus {
    /// Still running; the server re-offers the task after `callbackAfterSeconds`
    InProgress,
    /// Finished successfully
    Completed,
    /// Failed; the server may retry according to the task definition
    Failed,
    /// Failed and must not be retried
    FailedWithTerminalError,
}

impl TaskResultStatus {
    /// Whether this status ends the task on the server
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TaskResultStatus::InProgress)
    }

    /// Wire name, also used in update-by-reference paths
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskResultStatus::InProgress => "IN_PROGRESS",
            TaskResultStatus::Completed => "COMPLETED",
            TaskResultStatus::Failed => "FAILED",
            TaskResultStatus::FailedWithTerminalError => "FAILED_WITH_TERMINAL_ERROR",
        }
    }
}

impl fmt::Display for TaskResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution log line attached to a result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskExecLog {
    pub log: String,
    pub task_id: String,
    /// Epoch milliseconds
    pub created_time: i64,
}

/// Result of executing one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,

    pub workflow_instance_id: String,

    pub status: TaskResultStatus,

    #[serde(default)]
    pub output_data: Payload,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason_for_incompletion: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<TaskExecLog>,

    #[serde(default)]
    pub callback_after_seconds: u64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

impl TaskResult {
    /// Empty `IN_PROGRESS` result bound to a task
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.task_id.clone(),
            workflow_instance_id: task.workflow_instance_id.clone(),
            status: TaskResultStatus::InProgress,
            output_data: Payload::new(),
            reason_for_incompletion: None,
            logs: Vec::new(),
            callback_after_seconds: 0,
            worker_id: None,
        }
    }

    /// Successful result carrying `output`
    pub fn completed(task: &Task, output: Payload) -> Self {
        Self {
            status: TaskResultStatus::Completed,
            output_data: output,
            ..Self::for_task(task)
        }
    }

    /// Retryable failure
    pub fn failed(task: &Task, reason: impl Into<String>) -> Self {
        Self {
            status: TaskResultStatus::Failed,
            reason_for_incompletion: Some(reason.into()),
            ..Self::for_task(task)
        }
    }

    /// Failure the server must not retry
    pub fn failed_terminal(task: &Task, reason: impl Into<String>) -> Self {
        Self {
            status: TaskResultStatus::FailedWithTerminalError,
            reason_for_incompletion: Some(reason.into()),
            ..Self::for_task(task)
        }
    }

    /// Ask the server to hand the task back after `callback_after_seconds`
    pub fn in_progress(task: &Task, callback_after_seconds: u64) -> Self {
        Self {
            callback_after_seconds,
            ..Self::for_task(task)
        }
    }

    /// Builder: set one output entry
    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.output_data.insert(key.into(), value);
        self
    }

    /// Append an execution log line stamped with the current time
    pub fn log(&mut self, message: impl Into<String>) {
        self.logs.push(TaskExecLog {
            log: message.into(),
            task_id: self.task_id.clone(),
            created_time: Utc::now().timestamp_millis(),
        });
    }
}

/// Update addressed by workflow instance and task reference name
/// instead of task id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRefUpdate {
    pub workflow_instance_id: String,
    pub task_reference_name: String,
    pub status: TaskResultStatus,
    #[serde(default)]
    pub output_data: Payload,
}

impl TaskRefUpdate {
    pub fn new(
        workflow_instance_id: impl Into<String>,
        task_reference_name: impl Into<String>,
        status: TaskResultStatus,
    ) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            task_reference_name: task_reference_name.into(),
            status,
            output_data: Payload::new(),
        }
    }

    /// Builder: set one output entry
    pub fn with_output(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.output_data.insert(key.into(), value);
        self
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
