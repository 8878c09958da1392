//! Shared test infrastructure
//!
//! `MockTaskClient` stands in for the orchestration server: polls are served
//! from a scripted queue and every submitted result is recorded.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use taskrunner::{Error, PollRequest, Result, Task, TaskClient, TaskRefUpdate, TaskResult};

/// One scripted answer to a batch poll
pub enum PollResponse {
    Tasks(Vec<Task>),
    Fail(u16),
    Panic,
}

#[derive(Default)]
struct MockState {
    responses: VecDeque<PollResponse>,
    polls: Vec<PollRequest>,
    results: Vec<TaskResult>,
    ref_updates: Vec<(TaskRefUpdate, String)>,
    failing_updates: usize,
    update_attempts: usize,
}

/// Scripted in-memory server
#[derive(Default)]
pub struct MockTaskClient {
    state: Mutex<MockState>,
}

impl MockTaskClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue tasks for the next poll
    pub fn push_tasks(&self, tasks: Vec<Task>) {
        self.state.lock().responses.push_back(PollResponse::Tasks(tasks));
    }

    /// Make the next poll fail with `status`
    pub fn push_poll_error(&self, status: u16) {
        self.state.lock().responses.push_back(PollResponse::Fail(status));
    }

    /// Make the next poll panic inside the client
    pub fn push_poll_panic(&self) {
        self.state.lock().responses.push_back(PollResponse::Panic);
    }

    /// Reject the next `n` result submissions
    pub fn fail_updates(&self, n: usize) {
        self.state.lock().failing_updates = n;
    }

    pub fn poll_count(&self) -> usize {
        self.state.lock().polls.len()
    }

    pub fn polls(&self) -> Vec<PollRequest> {
        self.state.lock().polls.clone()
    }

    pub fn last_poll(&self) -> Option<PollRequest> {
        self.state.lock().polls.last().cloned()
    }

    pub fn results(&self) -> Vec<TaskResult> {
        self.state.lock().results.clone()
    }

    pub fn update_attempts(&self) -> usize {
        self.state.lock().update_attempts
    }

    pub fn ref_updates(&self) -> Vec<(TaskRefUpdate, String)> {
        self.state.lock().ref_updates.clone()
    }
}

#[async_trait]
impl TaskClient for MockTaskClient {
    async fn batch_poll(&self, request: &PollRequest) -> Result<Vec<Task>> {
        let response = {
            let mut state = self.state.lock();
            state.polls.push(request.clone());
            state.responses.pop_front()
        };

        match response {
            Some(PollResponse::Tasks(mut tasks)) => {
                tasks.truncate(request.count);
                Ok(tasks)
            }
            Some(PollResponse::Fail(status)) => Err(Error::server_response(status, "scripted failure")),
            Some(PollResponse::Panic) => panic!("scripted poll panic"),
            None => Ok(Vec::new()),
        }
    }

    async fn update_task(&self, result: &TaskResult) -> Result<()> {
        let mut state = self.state.lock();
        state.update_attempts += 1;
        if state.failing_updates > 0 {
            state.failing_updates -= 1;
            return Err(Error::server_response(503, "unavailable"));
        }
        state.results.push(result.clone());
        Ok(())
    }

    async fn update_task_by_ref_name(&self, update: &TaskRefUpdate, worker_id: &str) -> Result<()> {
        self.state
            .lock()
            .ref_updates
            .push((update.clone(), worker_id.to_string()));
        Ok(())
    }
}

/// `count` tasks of `task_type` with ids `<prefix>-0..count`
pub fn tasks(task_type: &str, prefix: &str, count: usize) -> Vec<Task> {
    (0..count)
        .map(|i| Task::new(format!("{}-{}", prefix, i), task_type).with_workflow("wf-1"))
        .collect()
}

/// Poll `check` every few milliseconds until it holds or `limit` passes
pub async fn eventually<F>(limit: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Run `fut` with a timeout, panicking if it does not finish
pub async fn within<F: Future>(limit: Duration, fut: F) -> F::Output {
    tokio::time::timeout(limit, fut)
        .await
        .expect("operation did not finish in time")
}
