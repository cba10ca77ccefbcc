//! Simulated time
//!
//! The engine runs on a continuous, real-valued clock. Time is an `f64`
//! so that `-inf` (the "before anything happened" reset time) and `+inf`
//! (events that happen at the end of all time) are representable.
//!
//! NaN is never a valid time; every public entry point rejects it.

use crate::core::error::SimError;
use std::num::NonZeroUsize;

/// A point on the simulated time axis.
pub type Time = f64;

/// Reject NaN times before they reach any ordered structure.
///
/// # Example
/// ```
/// use queueing_simulator_core_rs::core::time::check_time;
///
/// assert!(check_time(1.5).is_ok());
/// assert!(check_time(f64::INFINITY).is_ok());
/// assert!(check_time(f64::NAN).is_err());
/// ```
pub fn check_time(time: Time) -> Result<Time, SimError> {
    if time.is_nan() {
        return Err(SimError::IllegalArgument("time must not be NaN".to_string()));
    }
    Ok(time)
}

/// Counts state transitions happening at a single simulated instant
///
/// A composite that feeds a job back into itself with zero service time
/// never lets the clock advance. The guard turns that into an
/// [`SimError::InstantLivelock`] instead of a hang.
///
/// # Example
/// ```
/// use queueing_simulator_core_rs::core::time::InstantGuard;
/// use std::num::NonZeroUsize;
///
/// let mut guard = InstantGuard::new(NonZeroUsize::new(2).unwrap());
/// assert!(guard.record(1.0).is_ok());
/// assert!(guard.record(1.0).is_ok());
/// assert!(guard.record(1.0).is_err()); // third transition at t=1
/// assert!(guard.record(2.0).is_ok()); // clock moved, counter restarts
/// ```
#[derive(Debug, Clone)]
pub struct InstantGuard {
    /// Instant the counter refers to
    time: Time,
    /// Transitions recorded at `time`
    count: usize,
    /// Maximum transitions allowed at one instant
    limit: NonZeroUsize,
}

impl InstantGuard {
    /// Create a guard allowing at most `limit` transitions per instant
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            time: f64::NEG_INFINITY,
            count: 0,
            limit,
        }
    }

    /// Record one transition at `time`
    pub fn record(&mut self, time: Time) -> Result<(), SimError> {
        if time != self.time {
            self.time = time;
            self.count = 0;
        }
        self.count += 1;
        if self.count > self.limit.get() {
            return Err(SimError::InstantLivelock {
                time,
                limit: self.limit.get(),
            });
        }
        Ok(())
    }

    /// Forget all recorded transitions
    pub fn clear(&mut self) {
        self.time = f64::NEG_INFINITY;
        self.count = 0;
    }

    /// Maximum transitions allowed at one instant
    pub fn limit(&self) -> usize {
        self.limit.get()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn limited(limit: usize) -> InstantGuard {
        InstantGuard::new(NonZeroUsize::new(limit).unwrap())
    }

    #[test]
    fn test_guard_clear_restarts_count() {
        let mut guard = limited(1);
        guard.record(3.0).unwrap();
        guard.clear();
        assert!(guard.record(3.0).is_ok());
    }

    #[test]
    fn test_guard_counts_infinite_instant() {
        let mut guard = limited(1);
        guard.record(f64::INFINITY).unwrap();
        assert!(matches!(
            guard.record(f64::INFINITY),
            Err(SimError::InstantLivelock { limit: 1, .. })
        ));
    }
}
