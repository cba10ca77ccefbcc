//! Single-queue service disciplines
//!
//! A discipline decides *which* waiting job starts next and *how long* its
//! service lasts. The lifecycle state machine in the orchestrator decides
//! whether a transition is legal and performs it; the discipline is only
//! consulted through the hook points of [`Discipline`].
//!
//! # Hook points
//!
//! | Hook | When |
//! |------|------|
//! | [`has_server_available`](Discipline::has_server_available) | before every start; also drives the start-armed flag |
//! | [`select_start`](Discipline::select_start) | after arrival, departure, revocation and credit changes |
//! | [`insert_on_start`](Discipline::insert_on_start) | right after a job enters the service area |
//! | [`service_time_for_job`](Discipline::service_time_for_job) | once per visit, at start |
//! | [`remove_job`](Discipline::remove_job) | on every terminal transition |
//! | [`reset`](Discipline::reset) | on simulation reset |
//!
//! # Available disciplines
//!
//! 1. **Fcfs**: first come first served, `c` servers, optional buffer
//! 2. **Lifo**: last come first served (non-preemptive)
//! 3. **RandomOrder**: uniformly random waiting job, seeded
//! 4. **Sink**: never serves; jobs stay until revoked
//! 5. **DropAll**: drops every arrival
//! 6. **Zero**: departs every job at its arrival instant
//! 7. **InfiniteServer**: every job starts on arrival
//! 8. **Gate**: zero service, passage limited by gate-passage credits

use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::queue::QueueState;
use std::fmt;

mod fcfs;
mod gate;
mod lifo;
mod random;
mod simple;

pub use fcfs::Fcfs;
pub use gate::Gate;
pub use lifo::Lifo;
pub use random::RandomOrder;
pub use simple::{DropAll, InfiniteServer, Sink, Zero};

/// Discipline-specific behaviour of an atomic queue
///
/// # Example
///
/// ```rust
/// use queueing_simulator_core_rs::discipline::Discipline;
/// use queueing_simulator_core_rs::models::{JobId, QueueState};
///
/// /// Serves the most recently arrived job, one at a time, twice as fast
/// #[derive(Debug)]
/// struct FastLifo;
///
/// impl Discipline for FastLifo {
///     fn name(&self) -> &'static str {
///         "fast-lifo"
///     }
///
///     fn has_server_available(&self, state: &QueueState) -> bool {
///         state.number_of_jobs_in_service_area() == 0
///     }
///
///     fn select_start(&mut self, state: &QueueState) -> Option<JobId> {
///         state.waiting_jobs().next_back()
///     }
///
///     fn service_time_for_job(&self, _job: JobId, requested: f64) -> f64 {
///         requested / 2.0
///     }
/// }
/// ```
pub trait Discipline: fmt::Debug {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Whether a server could take one more job right now
    fn has_server_available(&self, state: &QueueState) -> bool;

    /// Maximum number of waiting jobs; an arrival beyond it is dropped
    fn buffer_size(&self) -> Option<usize> {
        None
    }

    /// Waiting job to start next, if any
    fn select_start(&mut self, state: &QueueState) -> Option<JobId> {
        state.waiting_jobs().next()
    }

    /// Called after `job` entered the service area
    fn insert_on_start(&mut self, _job: JobId, _time: Time) {}

    /// Service time granted to `job`, given what it requested
    fn service_time_for_job(&self, _job: JobId, requested: Time) -> Time {
        requested
    }

    /// Called when `job` leaves the queue for any reason
    fn remove_job(&mut self, _job: JobId) {}

    /// Drop discipline-local state
    fn reset(&mut self) {}

    /// Gate state, if this discipline is a gate
    fn as_gate(&self) -> Option<&Gate> {
        None
    }

    /// Mutable gate state, for gate-passage credit stimuli
    fn as_gate_mut(&mut self) -> Option<&mut Gate> {
        None
    }
}

/// Server capacity check shared by the multi-server disciplines
pub(crate) fn server_free(servers: Option<usize>, state: &QueueState) -> bool {
    servers.map_or(true, |c| state.number_of_jobs_in_service_area() < c)
}
