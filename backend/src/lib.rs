//! Queueing Simulator Core - Rust Engine
//!
//! Discrete-event simulation of queueing networks with deterministic
//! execution.
//!
//! # Architecture
//!
//! - **core**: Time, the event list, errors
//! - **models**: Domain types (Job, QueueState, notifications, listeners)
//! - **discipline**: Single-queue service disciplines (FCFS, LIFO, ...)
//! - **network**: Routing selectors, delegate factories, start models
//! - **orchestrator**: The simulation engine and job/queue state machine
//! - **scenario**: JSON scenario loading
//! - **rng**: Deterministic random number generation
//!
//! # Critical Invariants
//!
//! 1. Simultaneous events run in the order they were scheduled
//! 2. A job visits at most one queue at a time
//! 3. Listeners only ever see complete per-action notification batches
//! 4. All randomness is deterministic (seeded RNG)

// Module declarations
pub mod core;
pub mod discipline;
pub mod models;
pub mod network;
pub mod orchestrator;
pub mod rng;
pub mod scenario;

// Re-exports for convenience
pub use crate::core::error::{ErrorClass, SimError};
pub use crate::core::event_list::{EventHandle, EventList};
pub use crate::core::time::Time;
pub use models::{
    AutoRevocationPolicy, Credits, EntityRef, Job, JobId, JobKind, JobPhase, Listener, ListenerId,
    Notification, NotificationBatch, NotificationKind, NotificationLog, QueueId, QueueState,
};
pub use network::{DelegateJobFactory, QueueSelector, StartModel};
pub use orchestrator::{Simulation, SimulationConfig};
pub use rng::RngManager;
pub use scenario::{Scenario, ScenarioConfig};
