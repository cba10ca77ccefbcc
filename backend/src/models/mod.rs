//! Domain models for the queueing simulator

pub mod entity;
pub mod job;
pub mod notification;
pub mod queue;

// Re-exports
pub use entity::{EntityRef, Listener, ListenerId};
pub use job::{Job, JobId, JobKind};
pub use notification::{Notification, NotificationBatch, NotificationKind, NotificationLog};
pub use queue::{AutoRevocationPolicy, Credits, JobPhase, QueueId, QueueState};
