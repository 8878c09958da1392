//! In-process runtime metrics
//!
//! Counters and timings keyed by task type. The runner only ever writes
//! here; nothing in the control flow reads these values back.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use parking_lot::RwLock;
use tracing::trace;

/// Counted events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Batch poll requests issued
    Polls,
    /// Batch poll requests that failed
    PollErrors,
    /// Tasks received from polls
    TasksReceived,
    /// Handler invocations
    Executions,
    /// Handler invocations that returned an error or panicked
    ExecutionErrors,
    /// Individual failed update attempts
    UpdateErrors,
    /// Results abandoned after all update attempts failed
    UpdateFailures,
    /// Panics contained by the fault barrier
    Panics,
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Counter::Polls => "polls",
            Counter::PollErrors => "poll_errors",
            Counter::TasksReceived => "tasks_received",
            Counter::Executions => "executions",
            Counter::ExecutionErrors => "execution_errors",
            Counter::UpdateErrors => "update_errors",
            Counter::UpdateFailures => "update_failures",
            Counter::Panics => "panics",
        };
        f.write_str(name)
    }
}

/// Timed operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Timing {
    Poll,
    Execute,
    Update,
}

/// Accumulated durations for one timing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimingStats {
    pub count: u64,
    pub total: Duration,
    pub max: Duration,
}

impl TimingStats {
    /// Mean duration, zero when nothing was recorded
    pub fn mean(&self) -> Duration {
        if self.count == 0 {
            return Duration::ZERO;
        }
        let nanos = self.total.as_nanos() / u128::from(self.count);
        Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
    }
}

/// Metrics registry shared by every loop and execution unit
#[derive(Default)]
pub struct Metrics {
    counters: RwLock<HashMap<(Counter, String), u64>>,
    timings: RwLock<HashMap<(Timing, String), TimingStats>>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Increment a counter by one
    pub fn incr(&self, counter: Counter, task_type: &str) {
        self.add(counter, task_type, 1);
    }

    /// Increment a counter by `n`
    pub fn add(&self, counter: Counter, task_type: &str, n: u64) {
        let mut counters = self.counters.write();
        let value = counters.entry((counter, task_type.to_string())).or_insert(0);
        *value += n;
        trace!(metric = %counter, task_type, value = *value, "Counter updated");
    }

    /// Record one duration sample
    pub fn record(&self, timing: Timing, task_type: &str, elapsed: Duration) {
        let mut timings = self.timings.write();
        let stats = timings.entry((timing, task_type.to_string())).or_default();
        stats.count += 1;
        stats.total += elapsed;
        stats.max = stats.max.max(elapsed);
    }

    /// Current value of a counter
    pub fn counter(&self, counter: Counter, task_type: &str) -> u64 {
        self.counters
            .read()
            .get(&(counter, task_type.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Accumulated stats for a timing
    pub fn timing(&self, timing: Timing, task_type: &str) -> TimingStats {
        self.timings
            .read()
            .get(&(timing, task_type.to_string()))
            .copied()
            .unwrap_or_default()
    }

    /// Sum of a counter across all task types
    pub fn total(&self, counter: Counter) -> u64 {
        self.counters
            .read()
            .iter()
            .filter(|((c, _), _)| *c == counter)
            .map(|(_, v)| *v)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_task_type() {
        let metrics = Metrics::new();
        metrics.incr(Counter::Polls, "a");
        metrics.incr(Counter::Polls, "a");
        metrics.add(Counter::Polls, "b", 5);

        assert_eq!(metrics.counter(Counter::Polls, "a"), 2);
        assert_eq!(metrics.counter(Counter::Polls, "b"), 5);
        assert_eq!(metrics.counter(Counter::PollErrors, "a"), 0);
        assert_eq!(metrics.total(Counter::Polls), 7);
    }

    #[test]
    fn test_timings_accumulate() {
        let metrics = Metrics::new();
        metrics.record(Timing::Execute, "a", Duration::from_millis(10));
        metrics.record(Timing::Execute, "a", Duration::from_millis(30));

        let stats = metrics.timing(Timing::Execute, "a");
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total, Duration::from_millis(40));
        assert_eq!(stats.max, Duration::from_millis(30));
        assert_eq!(stats.mean(), Duration::from_millis(20));
        assert_eq!(metrics.timing(Timing::Poll, "a").mean(), Duration::ZERO);
    }

    #[test]
    fn test_mean_with_count_beyond_u32() {
        let count = u64::from(u32::MAX) + 1;
        let stats = TimingStats {
            count,
            total: Duration::from_nanos(count * 3),
            max: Duration::from_nanos(10),
        };
        assert_eq!(stats.mean(), Duration::from_nanos(3));
    }
}
