//! Queueing networks
//!
//! A composite queue presents several sub-queues as one queue. Three
//! pluggable pieces define a network:
//!
//! - a [`QueueSelector`] routes a job through the sub-queues
//!   (`select_first` on admission, `select_next` after each sub-queue exit,
//!   `None` meaning "leave the network")
//! - a [`DelegateJobFactory`] creates the shadow job that actually visits the
//!   sub-queues on behalf of a real job
//! - a [`StartModel`] decides when the composite's own start happens
//!
//! The lifecycle wiring lives in
//! [`Simulation::add_composite`](crate::orchestrator::Simulation::add_composite);
//! this module only holds the policies and the delegate bookkeeping.
//!
//! # Critical Invariants
//!
//! 1. **One delegate per real job**: `real → delegate` is a bijection for
//!    the duration of the visit
//! 2. **Delegates stay inside**: no listener outside the composite sees a
//!    real job at a sub-queue, or a delegate at the composite

use crate::core::time::Time;
use crate::models::job::{Job, JobId};
use crate::models::queue::QueueId;
use serde::{Deserialize, Serialize};
use std::fmt;

pub(crate) mod composite;
mod selectors;

pub use selectors::{
    CompressedTandemSelector, FeedbackMode, FeedbackSelector, ParallelMode, ParallelSelector,
    TandemSelector,
};

/// When the composite's own start happens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartModel {
    /// The composite starts a job on admission, before any sub-queue visit
    /// (subject to the composite's server-access credits)
    Local,
    /// Exactly one sub-queue; the composite starts when the delegate starts
    /// there, and the composite's credits are relayed to the sub-queue
    Encapsulator,
    /// Exactly two sub-queues, wait and serve. The wait queue only orders
    /// jobs (auto-revocation upon start); all service happens at the serve
    /// queue. The composite starts when the delegate starts at the wait queue
    CompressedTandem2,
}

impl StartModel {
    /// Required number of sub-queues, if fixed
    pub fn arity(self) -> Option<usize> {
        match self {
            StartModel::Local => None,
            StartModel::Encapsulator => Some(1),
            StartModel::CompressedTandem2 => Some(2),
        }
    }
}

/// Routing policy of a network
///
/// `job` is always the *real* job; selectors never see delegates.
pub trait QueueSelector: fmt::Debug {
    /// Sub-queue a newly admitted job visits first, or `None` to leave
    /// immediately
    fn select_first(&mut self, time: Time, job: JobId) -> Option<QueueId>;

    /// Sub-queue to visit after leaving `previous`, or `None` to leave
    fn select_next(&mut self, time: Time, job: JobId, previous: QueueId) -> Option<QueueId>;

    /// The job left the network (any outcome); drop per-job state
    fn forget(&mut self, _job: JobId) {}

    /// Drop all routing state
    fn reset(&mut self) {}
}

/// Creates the shadow job a composite sends through its sub-queues
///
/// The returned job's explicit per-queue service times take precedence; for
/// any queue without one, the engine falls back to the real job's
/// requirements, looked up when the sub-queue grants service.
pub trait DelegateJobFactory: fmt::Debug {
    fn create(&mut self, time: Time, real: &Job, composite: QueueId) -> Job;
}

/// Delegates with no service times of their own
///
/// # Example
///
/// ```
/// use queueing_simulator_core_rs::network::{DefaultDelegateJobFactory, DelegateJobFactory};
/// use queueing_simulator_core_rs::Job;
/// # use queueing_simulator_core_rs::orchestrator::Simulation;
/// # use queueing_simulator_core_rs::discipline::Sink;
/// # let mut sim = Simulation::default();
/// # let composite = sim.add_queue("c", Box::new(Sink));
///
/// let real = Job::new("order").with_service_time(3.0);
/// let delegate = DefaultDelegateJobFactory.create(0.0, &real, composite);
/// assert_eq!(delegate.name(), "order@queue#0");
/// ```
#[derive(Debug, Clone, Default)]
pub struct DefaultDelegateJobFactory;

impl DelegateJobFactory for DefaultDelegateJobFactory {
    fn create(&mut self, _time: Time, real: &Job, composite: QueueId) -> Job {
        Job::new(format!("{}@{}", real.name(), composite))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arity() {
        assert_eq!(StartModel::Local.arity(), None);
        assert_eq!(StartModel::Encapsulator.arity(), Some(1));
        assert_eq!(StartModel::CompressedTandem2.arity(), Some(2));
    }

    #[test]
    fn test_default_factory_has_no_service_times() {
        let real = Job::new("r").with_queue_service_time(QueueId(1, 0), 2.0);
        let delegate = DefaultDelegateJobFactory.create(0.0, &real, QueueId(0, 0));
        assert_eq!(delegate.explicit_service_time(QueueId(1, 0)), None);
        assert_eq!(delegate.name(), "r@queue#0");
    }
}
