//! Entities and the listener protocol
//!
//! Queues and jobs are entities: they are attached to one
//! [`Simulation`](crate::orchestrator::Simulation), get reset with it, and
//! report what happened to them through batched notifications.
//!
//! # Batching
//!
//! While an action runs, every notification is appended to the buffer of the
//! entity it concerns. Nothing reaches a listener until the outermost action
//! returns. At that point each entity hands its complete, ordered buffer to
//! its listeners in one call. A listener therefore never observes a queue
//! halfway through processing an event.

use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::notification::{Notification, NotificationBatch};
use crate::models::queue::QueueId;
use std::fmt;

/// Reference to any entity attached to a simulation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityRef {
    Queue(QueueId),
    Job(JobId),
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityRef::Queue(queue) => write!(f, "{}", queue),
            EntityRef::Job(job) => write!(f, "{}", job),
        }
    }
}

impl From<QueueId> for EntityRef {
    fn from(queue: QueueId) -> Self {
        EntityRef::Queue(queue)
    }
}

impl From<JobId> for EntityRef {
    fn from(job: JobId) -> Self {
        EntityRef::Job(job)
    }
}

/// Observer of flushed notification batches
///
/// Implemented for every `FnMut(&NotificationBatch)` closure, so the common
/// case is simply:
///
/// ```rust
/// use queueing_simulator_core_rs::models::NotificationBatch;
/// use queueing_simulator_core_rs::orchestrator::Simulation;
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let mut sim = Simulation::default();
/// let seen = Rc::new(RefCell::new(0usize));
/// let counter = seen.clone();
/// sim.listen_all(move |batch: &NotificationBatch| {
///     *counter.borrow_mut() += batch.notifications.len();
/// });
/// ```
pub trait Listener {
    /// Receive every notification one entity produced during one action
    fn notify(&mut self, batch: &NotificationBatch);

    /// Called once per simulation reset, before the reset batches are flushed
    fn reset(&mut self, _time: Time) {}
}

impl<F> Listener for F
where
    F: FnMut(&NotificationBatch),
{
    fn notify(&mut self, batch: &NotificationBatch) {
        self(batch)
    }
}

/// Handle returned on listener registration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub(crate) u64);

/// Notifications an entity accumulated during the current action
#[derive(Debug, Clone, Default)]
pub(crate) struct EntityBuffer {
    pub(crate) notifications: Vec<Notification>,
    /// Prefix already handed to the owning composite (sub-queues only)
    pub(crate) relayed: usize,
}

impl EntityBuffer {
    /// Take the notifications the owning composite has not seen yet
    pub(crate) fn take_unrelayed(&mut self) -> Vec<Notification> {
        let fresh = self.notifications[self.relayed..].to_vec();
        self.relayed = self.notifications.len();
        fresh
    }
}
