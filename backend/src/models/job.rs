//! Job model
//!
//! A job is a unit of work travelling through queues. At any moment it
//! visits at most one queue; the visited queue sets and clears
//! `current_queue` on arrival and on every terminal transition.
//!
//! Service requirements are an explicit table: a default requested service
//! time plus per-queue overrides. A queue looks the value up exactly once
//! per visit, when it grants service.
//!
//! Delegate jobs are the shadows a composite queue sends through its
//! sub-queues. They live in their own id space so that a replay after reset
//! reproduces the same delegate identities.

use crate::core::error::SimError;
use crate::core::time::Time;
use crate::models::queue::QueueId;
use std::collections::BTreeMap;
use std::fmt;

const DELEGATE_FLAG: u64 = 1 << 63;

/// Identity of a job within one simulation
///
/// Like [`QueueId`], tagged with the simulation that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(u64, u64);

impl JobId {
    pub(crate) fn real(owner: u64, index: usize) -> Self {
        JobId(index as u64, owner)
    }

    pub(crate) fn delegate(owner: u64, serial: u64) -> Self {
        JobId(serial | DELEGATE_FLAG, owner)
    }

    pub(crate) fn owner(&self) -> u64 {
        self.1
    }

    /// True for shadow jobs owned by a composite queue
    pub fn is_delegate(&self) -> bool {
        self.0 & DELEGATE_FLAG != 0
    }

    /// Position in creation order (within the real or the delegate id space)
    pub fn index(&self) -> usize {
        (self.0 & !DELEGATE_FLAG) as usize
    }

    pub(crate) fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_delegate() {
            write!(f, "delegate#{}", self.index())
        } else {
            write!(f, "job#{}", self.index())
        }
    }
}

/// What kind of job this is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    /// A job created by the user
    Real,
    /// Shadow of `real` while it visits `composite`
    Delegate { real: JobId, composite: QueueId },
}

/// A unit of work
///
/// # Example
/// ```
/// use queueing_simulator_core_rs::Job;
///
/// let job = Job::new("order-7").with_service_time(2.5);
/// assert_eq!(job.name(), "order-7");
/// assert_eq!(job.default_service_time(), 2.5);
/// assert!(job.current_queue().is_none());
/// ```
#[derive(Debug, Clone)]
pub struct Job {
    /// Human-readable name
    name: String,

    /// Real or delegate
    kind: JobKind,

    /// Requested service time at queues without an explicit entry
    default_service_time: Time,

    /// Per-queue requested service times
    service_times: BTreeMap<QueueId, Time>,

    /// Queue currently visited
    current_queue: Option<QueueId>,
}

impl Job {
    /// Create a real job requesting zero service everywhere
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: JobKind::Real,
            default_service_time: 0.0,
            service_times: BTreeMap::new(),
            current_queue: None,
        }
    }

    /// Set the requested service time used at every queue without an override
    ///
    /// `f64::INFINITY` is allowed: the job then never finishes service on
    /// its own.
    pub fn with_service_time(mut self, service_time: Time) -> Self {
        self.default_service_time = service_time;
        self
    }

    /// Override the requested service time at one queue
    pub fn with_queue_service_time(mut self, queue: QueueId, service_time: Time) -> Self {
        self.service_times.insert(queue, service_time);
        self
    }

    /// Name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Real or delegate
    pub fn kind(&self) -> JobKind {
        self.kind
    }

    /// True for shadow jobs owned by a composite queue
    pub fn is_delegate(&self) -> bool {
        matches!(self.kind, JobKind::Delegate { .. })
    }

    /// Queue currently visited, if any
    pub fn current_queue(&self) -> Option<QueueId> {
        self.current_queue
    }

    /// Requested service time at queues without an explicit entry
    pub fn default_service_time(&self) -> Time {
        self.default_service_time
    }

    /// Explicit requested service time at `queue`, if one was given
    pub fn explicit_service_time(&self, queue: QueueId) -> Option<Time> {
        self.service_times.get(&queue).copied()
    }

    /// Queues with an explicit entry in the service-time table
    pub(crate) fn service_time_queues(&self) -> impl Iterator<Item = QueueId> + '_ {
        self.service_times.keys().copied()
    }

    pub(crate) fn into_delegate(mut self, real: JobId, composite: QueueId) -> Self {
        self.kind = JobKind::Delegate { real, composite };
        self.current_queue = None;
        self
    }

    pub(crate) fn set_current_queue(&mut self, queue: Option<QueueId>) {
        self.current_queue = queue;
    }

    /// Reject NaN and negative service times
    pub(crate) fn validate(&self) -> Result<(), SimError> {
        let bad = |t: Time| t.is_nan() || t < 0.0;
        if bad(self.default_service_time) {
            return Err(SimError::argument(format!(
                "job '{}' has invalid service time {}",
                self.name, self.default_service_time
            )));
        }
        if let Some((queue, t)) = self.service_times.iter().find(|(_, t)| bad(**t)) {
            return Err(SimError::argument(format!(
                "job '{}' has invalid service time {} at {}",
                self.name, t, queue
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delegate_ids_do_not_collide_with_real_ids() {
        let real = JobId::real(0, 4);
        let delegate = JobId::delegate(0, 4);
        assert_ne!(real, delegate);
        assert!(!real.is_delegate());
        assert!(delegate.is_delegate());
        assert_eq!(delegate.index(), 4);
        assert_eq!(delegate.to_string(), "delegate#4");
    }

    #[test]
    fn test_per_queue_override() {
        let job = Job::new("j")
            .with_service_time(1.0)
            .with_queue_service_time(QueueId(2, 0), 5.0);
        assert_eq!(job.explicit_service_time(QueueId(2, 0)), Some(5.0));
        assert_eq!(job.explicit_service_time(QueueId(1, 0)), None);
    }

    #[test]
    fn test_validate_rejects_negative_and_nan() {
        assert!(Job::new("ok").with_service_time(f64::INFINITY).validate().is_ok());
        assert!(Job::new("neg").with_service_time(-1.0).validate().is_err());
        assert!(Job::new("nan")
            .with_queue_service_time(QueueId(0, 0), f64::NAN)
            .validate()
            .is_err());
    }

    #[test]
    fn test_into_delegate_links_real_job() {
        let delegate = Job::new("d").into_delegate(JobId::real(0, 1), QueueId(7, 0));
        assert!(delegate.is_delegate());
        assert_eq!(
            delegate.kind(),
            JobKind::Delegate {
                real: JobId::real(0, 1),
                composite: QueueId(7, 0)
            }
        );
    }
}
