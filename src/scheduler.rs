//! Discrete-event scheduler (simulation clock).
//!
//! The scheduler is the single source of time in the simulator: logical time
//! advances only through explicit scheduling primitives. Tasks are plain
//! values (the engine uses a closed enum) kept on a timestamp-ordered
//! min-heap; there are no coroutines, a suspended task is simply a value
//! rescheduled at its resume time.
//!
//! # Ordering
//!
//! Entries are ordered by `(time, class, seq)`:
//! - `time` ascending (`f64::total_cmp`),
//! - [`TaskClass::Connectivity`] before [`TaskClass::Normal`], so neighbor-set
//!   updates triggered by a contact-plan boundary at time T are applied
//!   before any generator or logger task scheduled at the same T,
//! - `seq`, a monotone registration counter, giving FIFO order for ties
//!   within a class. This ordering is what makes runs reproducible.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use thiserror::Error;

use crate::types::SimTime;

/// Scheduling in the past is an invariant violation, not a recoverable state.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ClockError {
    #[error("cannot schedule at {requested} before current time {now}")]
    ScheduleInPast { requested: SimTime, now: SimTime },

    #[error("cannot schedule at non-finite or negative time {0}")]
    InvalidTime(SimTime),
}

/// Priority class of a scheduled task at equal timestamps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TaskClass {
    /// Connectivity updates (contact-plan boundaries, neighbor scans).
    Connectivity,
    /// Everything else (generators, loggers, TTL scans).
    Normal,
}

struct Entry<T> {
    time: SimTime,
    class: TaskClass,
    seq: u64,
    task: T,
}

impl<T> PartialEq for Entry<T> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<T> Eq for Entry<T> {}

impl<T> PartialOrd for Entry<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Entry<T> {
    // Reversed so the BinaryHeap pops the earliest entry first.
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .time
            .total_cmp(&self.time)
            .then_with(|| other.class.cmp(&self.class))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// A timestamp-ordered scheduler over an arbitrary task type.
///
/// # Example
///
/// ```rust
/// use dtnsim::scheduler::{Scheduler, TaskClass};
///
/// let mut sched: Scheduler<&str> = Scheduler::new();
/// sched.schedule_at(5.0, TaskClass::Normal, "later").unwrap();
/// sched.schedule_at(1.0, TaskClass::Normal, "first").unwrap();
///
/// let (t, task) = sched.pop_due(10.0).unwrap();
/// assert_eq!((t, task), (1.0, "first"));
/// assert_eq!(sched.now(), 1.0);
/// ```
pub struct Scheduler<T> {
    queue: BinaryHeap<Entry<T>>,
    now: SimTime,
    seq: u64,
}

impl<T> Scheduler<T> {
    /// Creates an empty scheduler at time 0.
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            now: 0.0,
            seq: 0,
        }
    }

    /// Returns the current simulation time.
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Returns the number of pending tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true when no tasks are pending.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Schedules `task` at absolute time `time`.
    ///
    /// Scheduling strictly before the current time is a [`ClockError`]; it
    /// indicates a scheduler bug in the caller, never a routine condition.
    pub fn schedule_at(&mut self, time: SimTime, class: TaskClass, task: T) -> Result<(), ClockError> {
        if !time.is_finite() || time < 0.0 {
            return Err(ClockError::InvalidTime(time));
        }
        if time < self.now {
            return Err(ClockError::ScheduleInPast {
                requested: time,
                now: self.now,
            });
        }
        let seq = self.seq;
        self.seq += 1;
        self.queue.push(Entry {
            time,
            class,
            seq,
            task,
        });
        Ok(())
    }

    /// Schedules `task` after a delay ("suspend for D" = resume at now + D).
    pub fn schedule_in(&mut self, delay: SimTime, class: TaskClass, task: T) -> Result<(), ClockError> {
        self.schedule_at(self.now + delay, class, task)
    }

    /// Returns the timestamp of the next pending task, if any.
    pub fn next_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|e| e.time)
    }

    /// Pops the next task with timestamp `<= limit` and advances the clock
    /// to it. Returns `None` when the next task (if any) lies beyond `limit`;
    /// the clock is not advanced in that case.
    pub fn pop_due(&mut self, limit: SimTime) -> Option<(SimTime, T)> {
        match self.queue.peek() {
            Some(e) if e.time <= limit => {
                let e = self.queue.pop().expect("peeked entry");
                self.now = e.time;
                Some((e.time, e.task))
            }
            _ => None,
        }
    }

    /// Advances the clock to `t` without running anything.
    ///
    /// Used by the run loop at the end of a slice; moving backwards is a
    /// no-op since time is never rewound.
    pub fn advance_to(&mut self, t: SimTime) {
        if t > self.now {
            self.now = t;
        }
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pops_in_time_order() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_at(30.0, TaskClass::Normal, 3).unwrap();
        s.schedule_at(10.0, TaskClass::Normal, 1).unwrap();
        s.schedule_at(20.0, TaskClass::Normal, 2).unwrap();

        assert_eq!(s.pop_due(100.0), Some((10.0, 1)));
        assert_eq!(s.pop_due(100.0), Some((20.0, 2)));
        assert_eq!(s.pop_due(100.0), Some((30.0, 3)));
        assert_eq!(s.pop_due(100.0), None);
    }

    #[test]
    fn test_fifo_at_equal_timestamps() {
        let mut s: Scheduler<&str> = Scheduler::new();
        s.schedule_at(5.0, TaskClass::Normal, "a").unwrap();
        s.schedule_at(5.0, TaskClass::Normal, "b").unwrap();
        s.schedule_at(5.0, TaskClass::Normal, "c").unwrap();

        assert_eq!(s.pop_due(5.0).unwrap().1, "a");
        assert_eq!(s.pop_due(5.0).unwrap().1, "b");
        assert_eq!(s.pop_due(5.0).unwrap().1, "c");
    }

    #[test]
    fn test_connectivity_runs_before_normal_at_same_instant() {
        let mut s: Scheduler<&str> = Scheduler::new();
        s.schedule_at(5.0, TaskClass::Normal, "generator").unwrap();
        s.schedule_at(5.0, TaskClass::Connectivity, "boundary").unwrap();

        // Registered later, but connectivity class wins the tie.
        assert_eq!(s.pop_due(5.0).unwrap().1, "boundary");
        assert_eq!(s.pop_due(5.0).unwrap().1, "generator");
    }

    #[test]
    fn test_pop_due_respects_limit() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_at(10.0, TaskClass::Normal, 1).unwrap();

        assert_eq!(s.pop_due(9.9), None);
        assert_eq!(s.now(), 0.0);
        assert_eq!(s.pop_due(10.0), Some((10.0, 1)));
        assert_eq!(s.now(), 10.0);
    }

    #[test]
    fn test_schedule_in_past_is_clock_error() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_at(10.0, TaskClass::Normal, 1).unwrap();
        s.pop_due(10.0).unwrap();

        let err = s.schedule_at(5.0, TaskClass::Normal, 2).unwrap_err();
        assert_eq!(
            err,
            ClockError::ScheduleInPast {
                requested: 5.0,
                now: 10.0
            }
        );
    }

    #[test]
    fn test_invalid_times_rejected() {
        let mut s: Scheduler<u32> = Scheduler::new();
        assert!(s.schedule_at(f64::NAN, TaskClass::Normal, 1).is_err());
        assert!(s.schedule_at(f64::INFINITY, TaskClass::Normal, 1).is_err());
        assert!(s.schedule_at(-1.0, TaskClass::Normal, 1).is_err());
    }

    #[test]
    fn test_schedule_in_is_relative_to_now() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.schedule_at(10.0, TaskClass::Normal, 1).unwrap();
        s.pop_due(10.0).unwrap();
        s.schedule_in(2.5, TaskClass::Normal, 2).unwrap();

        assert_eq!(s.next_time(), Some(12.5));
    }

    #[test]
    fn test_advance_to_never_rewinds() {
        let mut s: Scheduler<u32> = Scheduler::new();
        s.advance_to(50.0);
        s.advance_to(20.0);
        assert_eq!(s.now(), 50.0);
    }
}
