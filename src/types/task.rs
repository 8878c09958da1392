//! Task definitions
//!
//! A `Task` is the unit of work handed out by the orchestration server.
//! The runner never mutates one after it has been received.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Free-form JSON object used for task input and output payloads
pub type Payload = HashMap<String, serde_json::Value>;

// ─────────────────────────────────────────────────────────────────
// Task Status
// ─────────────────────────────────────────────────────────────────

/// Status of a task as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Scheduled,
    InProgress,
    Canceled,
    Failed,
    FailedWithTerminalError,
    Completed,
    CompletedWithErrors,
    TimedOut,
    Skipped,
}

impl Default for TaskStatus {
    fn default() -> Self {
        TaskStatus::Scheduled
    }
}

// ─────────────────────────────────────────────────────────────────
// Task
// ─────────────────────────────────────────────────────────────────

/// A task polled from the server
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Task {
    /// Server-assigned task identifier
    pub task_id: String,

    /// Logical queue the task was polled from
    pub task_type: String,

    /// Current status on the server
    pub status: TaskStatus,

    /// Input payload supplied by the workflow
    pub input_data: Payload,

    /// Reference name of the task inside its workflow definition
    pub reference_task_name: String,

    /// Workflow instance this task belongs to
    pub workflow_instance_id: String,

    /// Workflow definition name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_type: Option<String>,

    /// Correlation id of the workflow instance
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,

    /// Domain the task was routed through
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Number of times the server retried this task
    pub retry_count: u32,

    /// Number of times this task has been polled
    pub poll_count: u32,

    /// Position of the task within the workflow
    pub seq: u32,

    /// Seconds the server waits for a response before requeueing
    pub response_timeout_seconds: u64,

    /// Seconds after which an IN_PROGRESS task becomes pollable again
    pub callback_after_seconds: u64,

    /// Worker that polled the task, if the server recorded one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub worker_id: Option<String>,
}

impl Task {
    /// Create a task with the given id and type
    pub fn new(task_id: impl Into<String>, task_type: impl Into<String>) -> Self {
        Self {
            task_id: task_id.into(),
            task_type: task_type.into(),
            status: TaskStatus::InProgress,
            ..Default::default()
        }
    }

    /// Builder: attach the owning workflow instance
    pub fn with_workflow(mut self, workflow_instance_id: impl Into<String>) -> Self {
        self.workflow_instance_id = workflow_instance_id.into();
        self
    }

    /// Builder: set one input entry
    pub fn with_input(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.input_data.insert(key.into(), value);
        self
    }

    /// Look up an input value
    pub fn input(&self, key: &str) -> Option<&serde_json::Value> {
        self.input_data.get(key)
    }

    /// Input payload as a single JSON object
    pub fn input_value(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.input_data
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.task_type, self.task_id)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_task_deserializes_server_json() {
        let raw = json!({
            "taskId": "t-1",
            "taskType": "encode",
            "status": "IN_PROGRESS",
            "inputData": { "file": "a.mp4" },
            "referenceTaskName": "encode_ref",
            "workflowInstanceId": "wf-1",
            "correlationId": "c-9",
            "retryCount": 2,
            "pollCount": 1,
            "someFieldWeDoNotModel": true
        });

        let task: Task = serde_json::from_value(raw).unwrap();
        assert_eq!(task.task_id, "t-1");
        assert_eq!(task.task_type, "encode");
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.input("file"), Some(&json!("a.mp4")));
        assert_eq!(task.correlation_id.as_deref(), Some("c-9"));
        assert_eq!(task.retry_count, 2);
        assert!(task.domain.is_none());
    }

    #[test]
    fn test_task_builder_and_display() {
        let task = Task::new("t-2", "resize")
            .with_workflow("wf-2")
            .with_input("width", json!(640));

        assert_eq!(task.to_string(), "resize:t-2");
        assert_eq!(task.workflow_instance_id, "wf-2");
        assert_eq!(task.input_value(), json!({ "width": 640 }));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&TaskStatus::FailedWithTerminalError).unwrap(),
            "\"FAILED_WITH_TERMINAL_ERROR\""
        );
    }
}
