//! Named, accumulating wall-clock timers.

use quanta::{Clock, Instant};
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone, Copy, Default)]
struct TimerEntry {
    started: Option<Instant>,
    cumulative: Duration,
}

/// A set of timers keyed by name.
///
/// Each timer accumulates the time between `start` and `stop` across any number of
/// cycles, until `finish` hands the total back and forgets the timer.
#[derive(Debug, Clone)]
pub struct TimerSet {
    clock: Clock,
    timers: HashMap<String, TimerEntry>,
}

impl Default for TimerSet {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerSet {
    pub fn new() -> Self {
        Self::with_clock(Clock::new())
    }

    pub fn with_clock(clock: Clock) -> Self {
        Self {
            clock,
            timers: HashMap::new(),
        }
    }

    /// Starts `name`. Restarting a running timer moves its start point.
    pub fn start(&mut self, name: &str) {
        let now = self.clock.now();
        self.timers.entry(name.to_string()).or_default().started = Some(now);
    }

    /// Stops `name` and returns its cumulative time so far. `None` if it is not running.
    pub fn stop(&mut self, name: &str) -> Option<Duration> {
        let now = self.clock.now();
        let entry = self.timers.get_mut(name)?;
        let started = entry.started.take()?;
        entry.cumulative += now.duration_since(started);
        Some(entry.cumulative)
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.timers
            .get(name)
            .is_some_and(|entry| entry.started.is_some())
    }

    /// Cumulative time of the completed start/stop cycles of `name`.
    pub fn elapsed(&self, name: &str) -> Option<Duration> {
        self.timers.get(name).map(|entry| entry.cumulative)
    }

    /// Removes `name` and returns its cumulative time. A cycle still running is
    /// not included.
    pub fn finish(&mut self, name: &str) -> Option<Duration> {
        self.timers.remove(name).map(|entry| entry.cumulative)
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}
