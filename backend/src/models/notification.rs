//! Notifications and the notification log
//!
//! A notification is a typed record of one observable change: a lifecycle
//! transition of a job at a queue, or a flip of one of the queue's flags.
//! Notifications are grouped per entity and per action into
//! [`NotificationBatch`]es; that is the unit listeners receive.
//!
//! [`NotificationLog`] keeps every flushed batch of a run, in flush order.
//! Two runs driven by the same stimuli produce equal logs, and equal logs
//! produce equal [`fingerprint`](NotificationLog::fingerprint)s.
//!
//! # Example
//!
//! ```rust
//! use queueing_simulator_core_rs::models::NotificationKind;
//!
//! assert!(NotificationKind::Departure.is_job_transition());
//! assert!(!NotificationKind::StartArmed(true).is_job_transition());
//! assert_eq!(NotificationKind::Drop.name(), "drop");
//! ```

use crate::core::time::Time;
use crate::models::entity::EntityRef;
use crate::models::job::JobId;
use crate::models::queue::QueueId;
use sha2::{Digest, Sha256};

/// What changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotificationKind {
    /// Entity was reset
    Reset,
    /// Queue advanced its clock
    Update,
    Arrival,
    Drop,
    Revocation,
    AutoRevocation,
    Start,
    Departure,
    AccessVacationStart,
    AccessVacationEnd,
    OutOfServerAccessCredits,
    RegainedServerAccessCredits,
    /// New value of the start-armed flag
    StartArmed(bool),
    /// New value of the no-wait-armed flag
    NoWaitArmed(bool),
}

impl NotificationKind {
    /// True for transitions concerning one job visit
    ///
    /// These are mirrored into the job's own batch.
    pub fn is_job_transition(self) -> bool {
        matches!(
            self,
            NotificationKind::Arrival
                | NotificationKind::Drop
                | NotificationKind::Revocation
                | NotificationKind::AutoRevocation
                | NotificationKind::Start
                | NotificationKind::Departure
        )
    }

    /// True for the transitions that end a visit
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            NotificationKind::Drop
                | NotificationKind::Revocation
                | NotificationKind::AutoRevocation
                | NotificationKind::Departure
        )
    }

    /// Short stable name
    pub fn name(self) -> &'static str {
        match self {
            NotificationKind::Reset => "reset",
            NotificationKind::Update => "update",
            NotificationKind::Arrival => "arrival",
            NotificationKind::Drop => "drop",
            NotificationKind::Revocation => "revocation",
            NotificationKind::AutoRevocation => "auto_revocation",
            NotificationKind::Start => "start",
            NotificationKind::Departure => "departure",
            NotificationKind::AccessVacationStart => "access_vacation_start",
            NotificationKind::AccessVacationEnd => "access_vacation_end",
            NotificationKind::OutOfServerAccessCredits => "out_of_server_access_credits",
            NotificationKind::RegainedServerAccessCredits => "regained_server_access_credits",
            NotificationKind::StartArmed(_) => "start_armed",
            NotificationKind::NoWaitArmed(_) => "no_wait_armed",
        }
    }

    /// Stable one-byte code used in fingerprints
    pub(crate) fn code(self) -> u8 {
        match self {
            NotificationKind::Reset => 0,
            NotificationKind::Update => 1,
            NotificationKind::Arrival => 2,
            NotificationKind::Drop => 3,
            NotificationKind::Revocation => 4,
            NotificationKind::AutoRevocation => 5,
            NotificationKind::Start => 6,
            NotificationKind::Departure => 7,
            NotificationKind::AccessVacationStart => 8,
            NotificationKind::AccessVacationEnd => 9,
            NotificationKind::OutOfServerAccessCredits => 10,
            NotificationKind::RegainedServerAccessCredits => 11,
            NotificationKind::StartArmed(false) => 12,
            NotificationKind::StartArmed(true) => 13,
            NotificationKind::NoWaitArmed(false) => 14,
            NotificationKind::NoWaitArmed(true) => 15,
        }
    }
}

/// One observable change at a queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Notification {
    /// Simulated time of the change
    pub time: Time,
    pub kind: NotificationKind,
    /// Queue where it happened
    pub queue: QueueId,
    /// Job concerned, for lifecycle transitions
    pub job: Option<JobId>,
}

/// Everything one entity reported during one action, in order
#[derive(Debug, Clone, PartialEq)]
pub struct NotificationBatch {
    pub entity: EntityRef,
    pub notifications: Vec<Notification>,
}

impl NotificationBatch {
    /// Time of the first notification
    pub fn time(&self) -> Option<Time> {
        self.notifications.first().map(|n| n.time)
    }

    /// Notifications of one kind
    pub fn of_kind(&self, kind: NotificationKind) -> impl Iterator<Item = &Notification> {
        self.notifications.iter().filter(move |n| n.kind == kind)
    }

    /// True if any notification has `kind`
    pub fn contains(&self, kind: NotificationKind) -> bool {
        self.notifications.iter().any(|n| n.kind == kind)
    }
}

/// Log of flushed notification batches
#[derive(Debug, Clone, Default)]
pub struct NotificationLog {
    batches: Vec<NotificationBatch>,
}

impl NotificationLog {
    pub fn new() -> Self {
        Self {
            batches: Vec::new(),
        }
    }

    /// Append a flushed batch
    pub fn record(&mut self, batch: NotificationBatch) {
        self.batches.push(batch);
    }

    /// Number of batches
    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    /// All batches in flush order
    pub fn batches(&self) -> &[NotificationBatch] {
        &self.batches
    }

    /// Every notification from queue batches, in flush order
    ///
    /// Job batches only mirror queue notifications, so this is the
    /// complete, duplicate-free stream.
    pub fn queue_notifications(&self) -> impl Iterator<Item = &Notification> {
        self.batches
            .iter()
            .filter(|b| matches!(b.entity, EntityRef::Queue(_)))
            .flat_map(|b| b.notifications.iter())
    }

    /// Notifications that happened at one queue
    pub fn for_queue(&self, queue: QueueId) -> Vec<&Notification> {
        self.queue_notifications()
            .filter(|n| n.queue == queue)
            .collect()
    }

    /// Notifications of one kind across all queues
    pub fn of_kind(&self, kind: NotificationKind) -> Vec<&Notification> {
        self.queue_notifications()
            .filter(|n| n.kind == kind)
            .collect()
    }

    /// Notifications concerning one job across all queues
    pub fn for_job(&self, job: JobId) -> Vec<&Notification> {
        self.queue_notifications()
            .filter(|n| n.job == Some(job))
            .collect()
    }

    pub fn clear(&mut self) {
        self.batches.clear();
    }

    /// Hex SHA-256 over a canonical encoding of every batch
    ///
    /// Times are hashed by bit pattern, so `-inf` and `+inf` are stable.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        for batch in &self.batches {
            match batch.entity {
                EntityRef::Queue(q) => {
                    hasher.update([0u8]);
                    hasher.update((q.index() as u64).to_le_bytes());
                }
                EntityRef::Job(j) => {
                    hasher.update([1u8]);
                    hasher.update(j.raw().to_le_bytes());
                }
            }
            hasher.update((batch.notifications.len() as u64).to_le_bytes());
            for n in &batch.notifications {
                hasher.update(n.time.to_bits().to_le_bytes());
                hasher.update([n.kind.code()]);
                hasher.update((n.queue.index() as u64).to_le_bytes());
                hasher.update(n.job.map_or(u64::MAX, |j| j.raw()).to_le_bytes());
            }
        }
        format!("{:x}", hasher.finalize())
    }
}
