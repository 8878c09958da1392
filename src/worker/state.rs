//! Worker state registry
//!
//! One `WorkerRecord` per task type, each guarded by its own lock so that
//! task types never contend with each other. Records are created on first
//! registration and kept for the life of the process.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::{Mutex, RwLock};
use tokio::sync::{watch, Notify};
use tracing::debug;

use super::handler::SharedHandler;

// ─────────────────────────────────────────────────────────────────
// Loop State
// ─────────────────────────────────────────────────────────────────

/// Lifecycle of the supervisor loop for one task type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    /// No loop running
    Stopped,
    /// Loop is polling and dispatching
    Running,
    /// Capacity reached zero; waiting for in-flight tasks to finish
    Stopping,
}

impl fmt::Display for LoopState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopState::Stopped => write!(f, "stopped"),
            LoopState::Running => write!(f, "running"),
            LoopState::Stopping => write!(f, "stopping"),
        }
    }
}

/// What the supervisor loop should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Fetch up to `count` tasks
    Poll {
        count: usize,
        domain: Option<String>,
        timeout: Duration,
        interval: Duration,
    },
    /// Paused: skip fetching for one interval
    Paused { interval: Duration },
    /// No free slot: wait for one to be released
    Full { interval: Duration },
    /// Capacity is zero, in-flight tasks remain
    Drain { interval: Duration },
    /// Capacity is zero and nothing is in flight; the loop is now stopped
    Exit,
}

// ─────────────────────────────────────────────────────────────────
// Worker Record
// ─────────────────────────────────────────────────────────────────

/// Per task type tunables supplied at registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerSettings {
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub domain: Option<String>,
    /// Initial pause state; only applied when the record is created
    pub paused: bool,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            poll_timeout: Duration::from_millis(100),
            domain: None,
            paused: false,
        }
    }
}

/// Point-in-time copy of a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerStatus {
    pub task_type: String,
    pub capacity: usize,
    pub busy: usize,
    pub poll_interval: Duration,
    pub poll_timeout: Duration,
    pub domain: Option<String>,
    pub paused: bool,
    pub loop_state: LoopState,
}

struct RecordState {
    capacity: usize,
    busy: usize,
    poll_interval: Duration,
    poll_timeout: Duration,
    domain: Option<String>,
    paused: bool,
    loop_state: LoopState,
    handler: SharedHandler,
}

/// Shared state for one task type
pub struct WorkerRecord {
    task_type: String,
    state: Mutex<RecordState>,
    wake: Notify,
    loop_tx: watch::Sender<LoopState>,
}

impl WorkerRecord {
    /// Create a record with zero capacity and no loop
    pub fn new(task_type: impl Into<String>, handler: SharedHandler, settings: WorkerSettings) -> Self {
        let (loop_tx, _) = watch::channel(LoopState::Stopped);
        Self {
            task_type: task_type.into(),
            state: Mutex::new(RecordState {
                capacity: 0,
                busy: 0,
                poll_interval: settings.poll_interval,
                poll_timeout: settings.poll_timeout,
                domain: settings.domain.filter(|d| !d.is_empty()),
                paused: settings.paused,
                loop_state: LoopState::Stopped,
                handler,
            }),
            wake: Notify::new(),
            loop_tx,
        }
    }

    pub fn task_type(&self) -> &str {
        &self.task_type
    }

    // ─────────────────────────────────────────────────────────────
    // Capacity
    // ─────────────────────────────────────────────────────────────

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Set capacity, returning the previous value
    pub fn set_capacity(&self, capacity: usize) -> usize {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.capacity, capacity)
        };
        self.wake();
        previous
    }

    /// Add `n` to capacity unless the result would exceed `limit`.
    /// Returns the new capacity, or `None` if the limit was hit.
    pub fn increase_capacity(&self, n: usize, limit: usize) -> Option<usize> {
        let capacity = {
            let mut state = self.state.lock();
            let next = state.capacity.checked_add(n).filter(|c| *c <= limit)?;
            state.capacity = next;
            next
        };
        self.wake();
        Some(capacity)
    }

    /// Add `n` to capacity and apply `handler` and `settings` in one step.
    ///
    /// Returns `None` without touching the record when the new capacity would
    /// exceed `limit`. The pause flag is left as it is.
    pub fn register(
        &self,
        n: usize,
        limit: usize,
        handler: SharedHandler,
        settings: WorkerSettings,
    ) -> Option<usize> {
        let capacity = {
            let mut state = self.state.lock();
            let next = state.capacity.checked_add(n).filter(|c| *c <= limit)?;
            state.capacity = next;
            state.handler = handler;
            state.poll_interval = settings.poll_interval;
            state.poll_timeout = settings.poll_timeout;
            state.domain = settings.domain.filter(|d| !d.is_empty());
            next
        };
        self.wake();
        Some(capacity)
    }

    /// Subtract `n` from capacity, clamped at zero; returns the new value
    pub fn decrease_capacity(&self, n: usize) -> usize {
        let capacity = {
            let mut state = self.state.lock();
            state.capacity = state.capacity.saturating_sub(n);
            state.capacity
        };
        self.wake();
        capacity
    }

    pub fn busy(&self) -> usize {
        self.state.lock().busy
    }

    /// Free slots, `capacity - busy` clamped at zero
    pub fn available(&self) -> usize {
        let state = self.state.lock();
        state.capacity.saturating_sub(state.busy)
    }

    /// Take one busy slot; it is released when the guard drops
    pub fn acquire(self: &Arc<Self>) -> BusySlot {
        self.state.lock().busy += 1;
        BusySlot {
            record: Arc::clone(self),
        }
    }

    fn release(&self) {
        {
            let mut state = self.state.lock();
            state.busy = state.busy.saturating_sub(1);
        }
        self.wake();
    }

    // ─────────────────────────────────────────────────────────────
    // Tunables
    // ─────────────────────────────────────────────────────────────

    pub fn poll_interval(&self) -> Duration {
        self.state.lock().poll_interval
    }

    pub fn set_poll_interval(&self, interval: Duration) {
        self.state.lock().poll_interval = interval;
        self.wake();
    }

    pub fn poll_timeout(&self) -> Duration {
        self.state.lock().poll_timeout
    }

    pub fn set_poll_timeout(&self, timeout: Duration) {
        self.state.lock().poll_timeout = timeout;
    }

    pub fn domain(&self) -> Option<String> {
        self.state.lock().domain.clone()
    }

    pub fn set_domain(&self, domain: Option<String>) {
        self.state.lock().domain = domain.filter(|d| !d.is_empty());
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().paused
    }

    pub fn set_paused(&self, paused: bool) {
        self.state.lock().paused = paused;
        self.wake();
    }

    pub fn handler(&self) -> SharedHandler {
        Arc::clone(&self.state.lock().handler)
    }

    pub fn status(&self) -> WorkerStatus {
        let state = self.state.lock();
        WorkerStatus {
            task_type: self.task_type.clone(),
            capacity: state.capacity,
            busy: state.busy,
            poll_interval: state.poll_interval,
            poll_timeout: state.poll_timeout,
            domain: state.domain.clone(),
            paused: state.paused,
            loop_state: state.loop_state,
        }
    }

    // ─────────────────────────────────────────────────────────────
    // Loop Lifecycle
    // ─────────────────────────────────────────────────────────────

    pub fn loop_state(&self) -> LoopState {
        self.state.lock().loop_state
    }

    /// Claim the right to spawn a loop. True when no loop is running and
    /// capacity is positive; the record is then marked `Running`.
    pub fn claim_loop(&self) -> bool {
        let mut state = self.state.lock();
        if state.loop_state != LoopState::Stopped || state.capacity == 0 {
            return false;
        }
        self.transition(&mut state, LoopState::Running);
        true
    }

    /// Decide the next supervisor step from a consistent view of the record.
    ///
    /// Handles the `Running -> Stopping -> Stopped` transitions; `Exit` is only
    /// returned after the record has been marked `Stopped`.
    pub fn plan(&self, max_batch: usize) -> Plan {
        let mut state = self.state.lock();
        let interval = state.poll_interval;

        if state.capacity == 0 {
            if state.busy == 0 {
                self.transition(&mut state, LoopState::Stopped);
                return Plan::Exit;
            }
            self.transition(&mut state, LoopState::Stopping);
            return Plan::Drain { interval };
        }

        self.transition(&mut state, LoopState::Running);

        if state.paused {
            return Plan::Paused { interval };
        }

        let available = state.capacity.saturating_sub(state.busy);
        if available == 0 {
            return Plan::Full { interval };
        }

        Plan::Poll {
            count: available.min(max_batch.max(1)),
            domain: state.domain.clone(),
            timeout: state.poll_timeout,
            interval,
        }
    }

    /// Force the record to `Stopped`; used when a loop ends abnormally
    pub fn mark_stopped(&self) {
        let mut state = self.state.lock();
        self.transition(&mut state, LoopState::Stopped);
    }

    fn transition(&self, state: &mut RecordState, next: LoopState) {
        if state.loop_state != next {
            debug!(task_type = %self.task_type, from = %state.loop_state, to = %next, "Loop state changed");
            state.loop_state = next;
            self.loop_tx.send_replace(next);
        }
    }

    /// Wait until no execution unit holds a slot, checking every `tick`
    pub async fn wait_idle(&self, tick: Duration) {
        while self.busy() > 0 {
            self.idle(tick).await;
        }
    }

    /// Wait until the loop reaches `Stopped`
    pub async fn wait_stopped(&self) {
        let mut rx = self.loop_tx.subscribe();
        // Sender lives as long as self, so this only errors on drop
        let _ = rx.wait_for(|state| *state == LoopState::Stopped).await;
    }

    // ─────────────────────────────────────────────────────────────
    // Wakeups
    // ─────────────────────────────────────────────────────────────

    /// Wake the supervisor loop early
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    /// Sleep for `interval` or until woken
    pub async fn idle(&self, interval: Duration) {
        if interval.is_zero() {
            tokio::task::yield_now().await;
            return;
        }
        let _ = tokio::time::timeout(interval, self.wake.notified()).await;
    }
}

/// Busy slot held by an execution unit; decrements `busy` on drop
pub struct BusySlot {
    record: Arc<WorkerRecord>,
}

impl BusySlot {
    pub fn record(&self) -> &Arc<WorkerRecord> {
        &self.record
    }
}

impl Drop for BusySlot {
    fn drop(&mut self) {
        self.record.release();
    }
}

// ─────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────

/// All worker records, keyed by task type
#[derive(Default)]
pub struct WorkerRegistry {
    records: RwLock<HashMap<String, Arc<WorkerRecord>>>,
}

impl WorkerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, task_type: &str) -> Option<Arc<WorkerRecord>> {
        self.records.read().get(task_type).cloned()
    }

    /// Return the record for `task_type`, creating it with `make` if absent.
    /// The flag is true when the record was created.
    pub fn get_or_insert_with<F>(&self, task_type: &str, make: F) -> (Arc<WorkerRecord>, bool)
    where
        F: FnOnce() -> WorkerRecord,
    {
        if let Some(record) = self.get(task_type) {
            return (record, false);
        }

        let mut records = self.records.write();
        if let Some(record) = records.get(task_type) {
            return (Arc::clone(record), false);
        }
        let record = Arc::new(make());
        records.insert(task_type.to_string(), Arc::clone(&record));
        (record, true)
    }

    /// Registered task types, sorted
    pub fn task_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self.records.read().keys().cloned().collect();
        types.sort();
        types
    }

    pub fn records(&self) -> Vec<Arc<WorkerRecord>> {
        self.records.read().values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}
