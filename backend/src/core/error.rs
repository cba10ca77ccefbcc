//! Error taxonomy
//!
//! Two classes of failure exist:
//! - **IllegalArgument**: the caller handed in something malformed (unknown
//!   entity, negative credits, a job that is already visiting another queue).
//!   Validated before any state is touched.
//! - **IllegalState**: an invariant of the model broke (starting a job that is
//!   not waiting, scheduling into the past, a zero-time feedback loop).
//!
//! Neither is retried. Once an error escapes an executing action the
//! simulation refuses further work until it is reset.

use crate::core::time::Time;
use thiserror::Error;

/// Which of the two error classes a [`SimError`] belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input, rejected before mutation
    IllegalArgument,
    /// Broken invariant; the model can no longer be trusted
    IllegalState,
}

/// Errors raised by the simulation engine
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("illegal argument: {0}")]
    IllegalArgument(String),

    #[error("illegal state: {0}")]
    IllegalState(String),

    #[error("cannot schedule at {time}: current time is {now}")]
    PastTime { time: Time, now: Time },

    #[error("more than {limit} transitions at time {time}")]
    InstantLivelock { time: Time, limit: usize },

    #[error("simulation aborted earlier ({0}); reset required")]
    Poisoned(Box<SimError>),

    #[error("invalid scenario configuration: {0}")]
    Config(String),
}

impl SimError {
    /// Map this error onto the two-class taxonomy
    pub fn class(&self) -> ErrorClass {
        match self {
            SimError::IllegalArgument(_) | SimError::Config(_) => ErrorClass::IllegalArgument,
            SimError::IllegalState(_)
            | SimError::PastTime { .. }
            | SimError::InstantLivelock { .. }
            | SimError::Poisoned(_) => ErrorClass::IllegalState,
        }
    }

    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        SimError::IllegalArgument(msg.into())
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        SimError::IllegalState(msg.into())
    }
}
