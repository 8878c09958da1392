//! Runtime facade
//!
//! `TaskRunner` is the only way to change worker state from outside the
//! runtime. Steady-state failures never surface here; only registration
//! and lookup problems are returned as errors.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tracing::{debug, info};

use crate::client::TaskClient;
use crate::config::default_worker_id;
use crate::error::{Error, Result};
use crate::metrics::Metrics;
use crate::types::TaskRefUpdate;

use super::handler::{SharedHandler, TaskHandler};
use super::state::{LoopState, WorkerRecord, WorkerRegistry, WorkerSettings, WorkerStatus};
use super::supervisor::spawn_supervisor;
use super::update::RetryPolicy;
use super::RuntimeContext;

// ─────────────────────────────────────────────────────────────────
// Runner Options
// ─────────────────────────────────────────────────────────────────

/// Process-wide runner settings
#[derive(Debug, Clone)]
pub struct RunnerOptions {
    /// Identity reported to the server
    pub worker_id: String,

    /// Poll interval for workers started without one
    pub poll_interval: Duration,

    /// Long-poll timeout for every worker unless overridden
    pub poll_timeout: Duration,

    /// Largest batch requested in one poll
    pub max_poll_batch: usize,

    /// Largest capacity allowed for one task type
    pub max_capacity: usize,

    /// Result submission retry policy
    pub retry: RetryPolicy,
}

impl Default for RunnerOptions {
    fn default() -> Self {
        Self {
            worker_id: default_worker_id(),
            poll_interval: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(100),
            max_poll_batch: 100,
            max_capacity: 1000,
            retry: RetryPolicy::default(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Task Runner
// ─────────────────────────────────────────────────────────────────

struct Inner {
    ctx: Arc<RuntimeContext>,
    registry: WorkerRegistry,
    options: RunnerOptions,
}

/// Handle for starting, resizing and stopping workers. Cheap to clone.
///
/// Starting a worker spawns onto the current Tokio runtime, so the mutating
/// methods must be called from inside one.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

impl TaskRunner {
    /// Create a runner talking to the server through `client`
    pub fn new(client: Arc<dyn TaskClient>, options: RunnerOptions) -> Self {
        let ctx = Arc::new(RuntimeContext {
            client,
            metrics: Arc::new(Metrics::new()),
            retry: options.retry,
            worker_id: options.worker_id.clone(),
            max_poll_batch: options.max_poll_batch.max(1),
        });

        Self {
            inner: Arc::new(Inner {
                ctx,
                registry: WorkerRegistry::new(),
                options,
            }),
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.inner.ctx.worker_id
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.inner.ctx.metrics)
    }

    pub fn options(&self) -> &RunnerOptions {
        &self.inner.options
    }

    // ─────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────

    /// Add `capacity` workers for `task_type` using the default poll timeout
    pub fn start_worker<H: TaskHandler>(
        &self,
        task_type: &str,
        handler: H,
        capacity: usize,
        poll_interval: Duration,
    ) -> Result<()> {
        self.start_worker_with_domain(task_type, handler, capacity, poll_interval, None)
    }

    /// Same as `start_worker`, restricted to a routing domain
    pub fn start_worker_with_domain<H: TaskHandler>(
        &self,
        task_type: &str,
        handler: H,
        capacity: usize,
        poll_interval: Duration,
        domain: Option<&str>,
    ) -> Result<()> {
        let settings = WorkerSettings {
            poll_interval,
            poll_timeout: self.inner.options.poll_timeout,
            domain: domain.map(str::to_string),
            paused: false,
        };
        self.start_worker_with_settings(task_type, Arc::new(handler), capacity, settings)
    }

    /// Register `handler` for `task_type` and add `capacity` to it.
    ///
    /// Capacity is additive across calls. The latest handler and settings
    /// replace earlier ones. A supervisor loop is spawned if none is running.
    pub fn start_worker_with_settings(
        &self,
        task_type: &str,
        handler: SharedHandler,
        capacity: usize,
        settings: WorkerSettings,
    ) -> Result<()> {
        let task_type = validate_task_type(task_type)?;
        if capacity == 0 {
            return Err(Error::invalid_capacity(task_type, capacity, "must be at least 1"));
        }

        let max = self.inner.options.max_capacity;
        if capacity > max {
            return Err(Error::invalid_capacity(
                task_type,
                capacity,
                format!("exceeds the maximum of {}", max),
            ));
        }

        let (record, created) = self.inner.registry.get_or_insert_with(task_type, || {
            WorkerRecord::new(task_type, Arc::clone(&handler), settings.clone())
        });

        // Nothing changes on a rejected registration
        let total = record.register(capacity, max, handler, settings).ok_or_else(|| {
            Error::invalid_capacity(
                task_type,
                record.capacity().saturating_add(capacity),
                format!("exceeds the maximum of {}", max),
            )
        })?;

        info!(
            task_type,
            capacity = total,
            created,
            poll_interval_ms = record.poll_interval().as_millis() as u64,
            domain = record.domain().as_deref().unwrap_or(""),
            "Worker started"
        );

        self.ensure_loop(&record);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Capacity
    // ─────────────────────────────────────────────────────────────

    /// Set the capacity of a task type; zero stops its loop after draining
    pub fn set_capacity(&self, task_type: &str, capacity: usize) -> Result<()> {
        let record = self.record(task_type)?;
        let max = self.inner.options.max_capacity;
        if capacity > max {
            return Err(Error::invalid_capacity(
                task_type,
                capacity,
                format!("exceeds the maximum of {}", max),
            ));
        }

        let previous = record.set_capacity(capacity);
        info!(task_type, from = previous, to = capacity, "Capacity changed");
        self.ensure_loop(&record);
        Ok(())
    }

    /// Add `n` to the capacity of a task type
    pub fn increase_capacity(&self, task_type: &str, n: usize) -> Result<()> {
        let record = self.record(task_type)?;
        let max = self.inner.options.max_capacity;
        let capacity = record.increase_capacity(n, max).ok_or_else(|| {
            Error::invalid_capacity(
                task_type,
                record.capacity().saturating_add(n),
                format!("exceeds the maximum of {}", max),
            )
        })?;

        info!(task_type, capacity, "Capacity increased");
        self.ensure_loop(&record);
        Ok(())
    }

    /// Subtract `n` from the capacity of a task type, clamped at zero
    pub fn decrease_capacity(&self, task_type: &str, n: usize) -> Result<()> {
        let record = self.record(task_type)?;
        let capacity = record.decrease_capacity(n);
        info!(task_type, capacity, "Capacity decreased");
        Ok(())
    }

    /// Remove `n` workers from a task type
    pub fn remove_worker(&self, task_type: &str, n: usize) -> Result<()> {
        self.decrease_capacity(task_type, n)
    }

    // ─────────────────────────────────────────────────────────────
    // Live Settings
    // ─────────────────────────────────────────────────────────────

    /// Stop polling for a task type; in-flight tasks keep running
    pub fn pause(&self, task_type: &str) -> Result<()> {
        self.record(task_type)?.set_paused(true);
        info!(task_type, "Worker paused");
        Ok(())
    }

    pub fn resume(&self, task_type: &str) -> Result<()> {
        self.record(task_type)?.set_paused(false);
        info!(task_type, "Worker resumed");
        Ok(())
    }

    pub fn set_poll_interval(&self, task_type: &str, interval: Duration) -> Result<()> {
        self.record(task_type)?.set_poll_interval(interval);
        debug!(task_type, interval_ms = interval.as_millis() as u64, "Poll interval changed");
        Ok(())
    }

    pub fn set_poll_timeout(&self, task_type: &str, timeout: Duration) -> Result<()> {
        self.record(task_type)?.set_poll_timeout(timeout);
        debug!(task_type, timeout_ms = timeout.as_millis() as u64, "Poll timeout changed");
        Ok(())
    }

    /// Change the routing domain; `None` or an empty string clears it
    pub fn set_domain(&self, task_type: &str, domain: Option<&str>) -> Result<()> {
        self.record(task_type)?.set_domain(domain.map(str::to_string));
        debug!(task_type, domain = domain.unwrap_or(""), "Domain changed");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Getters
    // ─────────────────────────────────────────────────────────────

    pub fn capacity(&self, task_type: &str) -> usize {
        self.get(task_type).map(|r| r.capacity()).unwrap_or(0)
    }

    pub fn busy(&self, task_type: &str) -> usize {
        self.get(task_type).map(|r| r.busy()).unwrap_or(0)
    }

    pub fn available(&self, task_type: &str) -> usize {
        self.get(task_type).map(|r| r.available()).unwrap_or(0)
    }

    pub fn poll_interval(&self, task_type: &str) -> Option<Duration> {
        self.get(task_type).map(|r| r.poll_interval())
    }

    pub fn poll_timeout(&self, task_type: &str) -> Option<Duration> {
        self.get(task_type).map(|r| r.poll_timeout())
    }

    pub fn domain(&self, task_type: &str) -> Option<String> {
        self.get(task_type).and_then(|r| r.domain())
    }

    pub fn is_paused(&self, task_type: &str) -> bool {
        self.get(task_type).map(|r| r.is_paused()).unwrap_or(false)
    }

    pub fn loop_state(&self, task_type: &str) -> LoopState {
        self.get(task_type)
            .map(|r| r.loop_state())
            .unwrap_or(LoopState::Stopped)
    }

    pub fn status(&self, task_type: &str) -> Option<WorkerStatus> {
        self.get(task_type).map(|r| r.status())
    }

    /// Every task type ever registered, sorted
    pub fn task_types(&self) -> Vec<String> {
        self.inner.registry.task_types()
    }

    // ─────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────

    /// Set capacity to zero and wait until the loop has drained and stopped
    pub async fn shutdown(&self, task_type: &str) -> Result<()> {
        let record = self.record(task_type)?;
        record.set_capacity(0);
        info!(task_type, busy = record.busy(), "Shutting down worker");

        record.wait_stopped().await;
        info!(task_type, "Worker stopped");
        Ok(())
    }

    /// Set every task type's capacity to zero without waiting
    pub fn shutdown_all(&self) {
        for record in self.inner.registry.records() {
            record.set_capacity(0);
        }
        info!(workers = self.inner.registry.len(), "Shutting down all workers");
    }

    /// Wait until every registered loop has stopped. No timeout of its own.
    pub async fn wait_all(&self) {
        let records = self.inner.registry.records();
        join_all(records.iter().map(|r| r.wait_stopped())).await;
        debug!("All supervisor loops stopped");
    }

    // ─────────────────────────────────────────────────────────────
    // Direct Updates
    // ─────────────────────────────────────────────────────────────

    /// Update a task by workflow instance and reference name
    pub async fn update_task_by_ref_name(&self, update: &TaskRefUpdate) -> Result<()> {
        self.inner
            .ctx
            .client
            .update_task_by_ref_name(update, &self.inner.ctx.worker_id)
            .await
    }

    // ─────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────

    /// Records are keyed by the trimmed task type
    fn get(&self, task_type: &str) -> Option<Arc<WorkerRecord>> {
        self.inner.registry.get(task_type.trim())
    }

    fn record(&self, task_type: &str) -> Result<Arc<WorkerRecord>> {
        self.get(task_type)
            .ok_or_else(|| Error::WorkerNotFound(task_type.to_string()))
    }

    fn ensure_loop(&self, record: &Arc<WorkerRecord>) {
        if record.claim_loop() {
            spawn_supervisor(Arc::clone(&self.inner.ctx), Arc::clone(record));
        }
    }
}

fn validate_task_type(task_type: &str) -> Result<&str> {
    let trimmed = task_type.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidTaskType(task_type.to_string()));
    }
    Ok(trimmed)
}
