//! Time-ordered event list
//!
//! Pending events are kept in a `BTreeMap` keyed by `(time, sequence)`.
//! The sequence number is handed out at insertion, so events scheduled for
//! the same instant run in the order they were scheduled. Nothing else
//! reorders simultaneous events: components that need "drop before start"
//! get it by scheduling the drop first.
//!
//! # Example
//!
//! ```rust
//! use queueing_simulator_core_rs::core::event_list::EventList;
//!
//! let mut events = EventList::new(0.0);
//! events.schedule(2.0, "late").unwrap();
//! events.schedule(1.0, "first").unwrap();
//! events.schedule(1.0, "second").unwrap();
//!
//! let order: Vec<_> = std::iter::from_fn(|| events.pop_next())
//!     .map(|(_, _, e)| e)
//!     .collect();
//! assert_eq!(order, vec!["first", "second", "late"]);
//! assert_eq!(events.now(), 2.0);
//! ```

use crate::core::error::SimError;
use crate::core::time::{check_time, Time};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

static NEXT_LIST: AtomicU64 = AtomicU64::new(0);

/// Ordering key of a pending event, doubling as its cancellation handle
#[derive(Debug, Clone, Copy)]
pub struct EventHandle {
    time: Time,
    sequence: u64,
    /// List that issued the handle
    list: u64,
}

impl EventHandle {
    /// Scheduled time of the event
    pub fn time(&self) -> Time {
        self.time
    }

    /// Insertion sequence number (tie-breaker among equal times)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl PartialEq for EventHandle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventHandle {}

impl PartialOrd for EventHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.sequence.cmp(&other.sequence))
            .then(self.list.cmp(&other.list))
    }
}

/// Pending events plus the current simulated time
///
/// # Invariants
///
/// 1. `now` never decreases between resets
/// 2. Every pending event has `time >= now`
/// 3. Events with equal time pop in insertion order
#[derive(Debug)]
pub struct EventList<E> {
    pending: BTreeMap<EventHandle, E>,
    now: Time,
    next_sequence: u64,
    id: u64,
}

impl<E> EventList<E> {
    /// Create an empty list whose clock reads `start_time`
    pub fn new(start_time: Time) -> Self {
        Self {
            pending: BTreeMap::new(),
            now: start_time,
            next_sequence: 0,
            id: NEXT_LIST.fetch_add(1, AtomicOrdering::Relaxed),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> Time {
        self.now
    }

    /// Number of pending events
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True when nothing is pending
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Time of the earliest pending event
    pub fn peek_time(&self) -> Option<Time> {
        self.pending.keys().next().map(|handle| handle.time)
    }

    /// Schedule `event` at `time`
    ///
    /// # Errors
    /// - `IllegalArgument` if `time` is NaN
    /// - `PastTime` if `time` is before the current time
    pub fn schedule(&mut self, time: Time, event: E) -> Result<EventHandle, SimError> {
        let time = check_time(time)?;
        if time < self.now {
            return Err(SimError::PastTime {
                time,
                now: self.now,
            });
        }
        let handle = EventHandle {
            time,
            sequence: self.next_sequence,
            list: self.id,
        };
        self.next_sequence += 1;
        self.pending.insert(handle, event);
        Ok(handle)
    }

    /// Remove a pending event
    ///
    /// Returns `false` if the event already ran, was cancelled before, or
    /// belongs to another list.
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.pending.remove(&handle).is_some()
    }

    /// True if the event behind `handle` has not run yet
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.pending.contains_key(&handle)
    }

    /// Pop the earliest event and advance the clock to its time
    pub fn pop_next(&mut self) -> Option<(Time, EventHandle, E)> {
        let (handle, event) = self.pending.pop_first()?;
        debug_assert!(handle.time >= self.now, "event list went back in time");
        self.now = handle.time;
        Some((handle.time, handle, event))
    }

    /// Drop every pending event and set the clock to `time`
    ///
    /// Entity notification is the owner's job; see
    /// [`Simulation::reset`](crate::orchestrator::Simulation::reset).
    pub fn reset(&mut self, time: Time) -> Result<(), SimError> {
        let time = check_time(time)?;
        self.pending.clear();
        self.now = time;
        self.next_sequence = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_in_past_fails() {
        let mut events: EventList<u32> = EventList::new(5.0);
        assert_eq!(
            events.schedule(4.0, 1),
            Err(SimError::PastTime {
                time: 4.0,
                now: 5.0
            })
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_schedule_nan_fails() {
        let mut events: EventList<u32> = EventList::new(0.0);
        assert!(matches!(
            events.schedule(f64::NAN, 1),
            Err(SimError::IllegalArgument(_))
        ));
    }

    #[test]
    fn test_cancel_is_consistent_after_execution() {
        let mut events = EventList::new(0.0);
        let handle = events.schedule(1.0, 'a').unwrap();
        assert!(events.is_pending(handle));
        events.pop_next();
        assert!(!events.cancel(handle));
        assert!(!events.cancel(handle));
    }

    #[test]
    fn test_handle_of_another_list_cancels_nothing() {
        let mut mine = EventList::new(0.0);
        let mut other = EventList::new(0.0);
        let ours = mine.schedule(1.0, 'a').unwrap();
        let theirs = other.schedule(1.0, 'b').unwrap();
        assert_eq!((ours.time(), ours.sequence()), (theirs.time(), theirs.sequence()));
        assert!(!mine.is_pending(theirs));
        assert!(!mine.cancel(theirs));
        assert_eq!(mine.len(), 1);
        assert!(other.is_pending(theirs));
    }

    #[test]
    fn test_same_time_event_appended_after_pending_ones() {
        let mut events = EventList::new(0.0);
        events.schedule(1.0, 'a').unwrap();
        events.schedule(1.0, 'b').unwrap();
        let (t, _, first) = events.pop_next().unwrap();
        assert_eq!(first, 'a');
        // scheduled "during" the action of 'a', at the current time
        events.schedule(t, 'c').unwrap();
        assert_eq!(events.pop_next().unwrap().2, 'b');
        assert_eq!(events.pop_next().unwrap().2, 'c');
    }

    #[test]
    fn test_infinite_times_order_last() {
        let mut events = EventList::new(f64::NEG_INFINITY);
        events.schedule(f64::INFINITY, 'z').unwrap();
        events.schedule(f64::NEG_INFINITY, 'a').unwrap();
        events.schedule(0.0, 'm').unwrap();
        assert_eq!(events.pop_next().unwrap().2, 'a');
        assert_eq!(events.pop_next().unwrap().2, 'm');
        assert_eq!(events.pop_next().unwrap().2, 'z');
        assert_eq!(events.now(), f64::INFINITY);
    }

    #[test]
    fn test_reset_clears_and_rewinds() {
        let mut events = EventList::new(0.0);
        events.schedule(3.0, 1).unwrap();
        events.pop_next();
        events.schedule(7.0, 2).unwrap();
        events.reset(1.0).unwrap();
        assert!(events.is_empty());
        assert_eq!(events.now(), 1.0);
        let handle = events.schedule(1.0, 3).unwrap();
        assert_eq!(handle.sequence(), 0);
    }
}
