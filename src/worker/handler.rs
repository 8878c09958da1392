//! Task handler interface
//!
//! A handler receives the raw `Task` and returns a `TaskOutput`. Plain async
//! closures are handlers; `JsonHandler` adds typed input/output on top.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::types::{Payload, Task, TaskResult};

/// Shared, type-erased handler as stored in the worker registry
pub type SharedHandler = Arc<dyn TaskHandler>;

/// User callback bound to a task type
#[async_trait]
pub trait TaskHandler: Send + Sync + 'static {
    /// Execute one task. Errors become `FAILED` results, or
    /// `FAILED_WITH_TERMINAL_ERROR` when they carry a `NonRetryableError`.
    async fn execute(&self, task: Task) -> anyhow::Result<TaskOutput>;
}

#[async_trait]
impl<F, Fut> TaskHandler for F
where
    F: Fn(Task) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<TaskOutput>> + Send + 'static,
{
    async fn execute(&self, task: Task) -> anyhow::Result<TaskOutput> {
        (self)(task).await
    }
}

// ─────────────────────────────────────────────────────────────────
// Handler Output
// ─────────────────────────────────────────────────────────────────

/// What a handler produced
#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutput {
    /// Plain value, reported as `COMPLETED`
    Value(Value),
    /// Fully formed result, submitted as is
    Result(TaskResult),
}

impl TaskOutput {
    /// Completed with no output
    pub fn empty() -> Self {
        TaskOutput::Value(Value::Null)
    }

    /// Convert into the result submitted for `task`.
    ///
    /// Objects become `outputData` directly, `null` becomes empty output,
    /// anything else is stored under `"result"`.
    pub fn into_result(self, task: &Task) -> TaskResult {
        match self {
            TaskOutput::Result(result) => result,
            TaskOutput::Value(Value::Object(map)) => {
                TaskResult::completed(task, map.into_iter().collect())
            }
            TaskOutput::Value(Value::Null) => TaskResult::completed(task, Payload::new()),
            TaskOutput::Value(other) => {
                TaskResult::completed(task, Payload::new()).with_output("result", other)
            }
        }
    }
}

impl From<Value> for TaskOutput {
    fn from(value: Value) -> Self {
        TaskOutput::Value(value)
    }
}

impl From<TaskResult> for TaskOutput {
    fn from(result: TaskResult) -> Self {
        TaskOutput::Result(result)
    }
}

impl From<Payload> for TaskOutput {
    fn from(payload: Payload) -> Self {
        TaskOutput::Value(Value::Object(payload.into_iter().collect()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Non-Retryable Errors
// ─────────────────────────────────────────────────────────────────

/// Marks a handler failure the server must not retry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NonRetryableError(String);

impl NonRetryableError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NonRetryableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for NonRetryableError {}

/// Shorthand for returning a terminal failure from a handler
pub fn terminal(message: impl Into<String>) -> anyhow::Error {
    anyhow::Error::new(NonRetryableError::new(message))
}

/// Whether any error in the chain is a `NonRetryableError`
pub fn is_non_retryable(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| cause.is::<NonRetryableError>())
}

// ─────────────────────────────────────────────────────────────────
// Typed JSON Handler
// ─────────────────────────────────────────────────────────────────

/// Handler decoding `inputData` into `I` and encoding `O` as output
pub struct JsonHandler<I, O, F> {
    func: F,
    _marker: PhantomData<fn(I) -> O>,
}

impl<I, O, F> JsonHandler<I, O, F> {
    pub fn new(func: F) -> Self {
        Self {
            func,
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<I, O, F, Fut> TaskHandler for JsonHandler<I, O, F>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    F: Fn(I) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<O>> + Send + 'static,
{
    async fn execute(&self, task: Task) -> anyhow::Result<TaskOutput> {
        let input: I = serde_json::from_value(task.input_value()).map_err(|e| {
            terminal(format!("invalid input for task type {}: {}", task.task_type, e))
        })?;

        let output = (self.func)(input).await?;
        Ok(TaskOutput::Value(serde_json::to_value(output)?))
    }
}
