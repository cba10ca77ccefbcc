//! Queue state
//!
//! The state every queue carries regardless of its discipline: which jobs
//! are present (in arrival order), which of them are in the service area,
//! and the externally controlled knobs.
//!
//! # Critical Invariants
//!
//! 1. **Service area ⊆ jobs**: a job is present in exactly one phase,
//!    waiting or in service
//! 2. **Credits gate starts**: zero server-access credits means no
//!    waiting → service transition
//! 3. **Vacation drops**: while on access vacation, arrivals never enter
//!    the job set

use crate::core::error::SimError;
use crate::core::event_list::EventHandle;
use crate::core::time::Time;
use crate::models::job::JobId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a queue within one simulation
///
/// Carries the index in creation order and the tag of the simulation that
/// created it; a simulation rejects ids it did not hand out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct QueueId(pub(crate) usize, pub(crate) u64);

impl QueueId {
    /// Position in creation order
    pub fn index(&self) -> usize {
        self.0
    }

    pub(crate) fn owner(&self) -> u64 {
        self.1
    }
}

impl fmt::Display for QueueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "queue#{}", self.0)
    }
}

/// Server-access credits: how many more jobs may start service
///
/// # Example
/// ```
/// use queueing_simulator_core_rs::Credits;
///
/// assert!(Credits::try_from(-1i64).is_err());
/// assert_eq!(Credits::try_from(3i64).unwrap(), Credits::Finite(3));
/// assert!(Credits::Finite(0).is_zero());
/// assert!(!Credits::Infinite.is_zero());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Credits {
    Finite(u64),
    #[default]
    Infinite,
}

impl Credits {
    /// True if no job may start
    pub fn is_zero(self) -> bool {
        self == Credits::Finite(0)
    }

    /// Remaining credits after one start
    ///
    /// Never goes below zero; callers check [`is_zero`](Self::is_zero) first.
    pub(crate) fn consume(self) -> Credits {
        match self {
            Credits::Finite(n) => Credits::Finite(n.saturating_sub(1)),
            Credits::Infinite => Credits::Infinite,
        }
    }
}

impl TryFrom<i64> for Credits {
    type Error = SimError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if value < 0 {
            return Err(SimError::argument(format!(
                "server-access credits must be non-negative, got {}",
                value
            )));
        }
        Ok(Credits::Finite(value as u64))
    }
}

impl From<u64> for Credits {
    fn from(value: u64) -> Self {
        Credits::Finite(value)
    }
}

impl fmt::Display for Credits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credits::Finite(n) => write!(f, "{}", n),
            Credits::Infinite => write!(f, "inf"),
        }
    }
}

/// When a queue revokes jobs on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoRevocationPolicy {
    /// Jobs only leave through departure, drop or explicit revocation
    #[default]
    None,
    /// A job is revoked the moment it starts
    UponStart,
}

/// Phase of a job that is present at a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Waiting,
    InService,
}

/// Bookkeeping for one job visit
#[derive(Debug, Clone)]
pub(crate) struct JobVisit {
    pub(crate) arrival_time: Time,
    pub(crate) phase: JobPhase,
    pub(crate) start_time: Option<Time>,
    /// Pending departure event, cancelled on revocation
    pub(crate) departure: Option<EventHandle>,
}

/// Discipline-independent state of a queue
#[derive(Debug, Clone)]
pub struct QueueState {
    /// Time of the most recent update
    pub(crate) last_update: Time,

    /// Jobs present, in arrival order
    pub(crate) visits: IndexMap<JobId, JobVisit>,

    /// Number of visits in phase `InService`
    pub(crate) in_service: usize,

    pub(crate) access_vacation: bool,
    pub(crate) credits: Credits,
    pub(crate) auto_revocation: AutoRevocationPolicy,

    /// Cached derived flags, recomputed after every operation
    pub(crate) start_armed: bool,
    pub(crate) no_wait_armed: bool,
}

impl QueueState {
    pub(crate) fn new(time: Time) -> Self {
        Self {
            last_update: time,
            visits: IndexMap::new(),
            in_service: 0,
            access_vacation: false,
            credits: Credits::Infinite,
            auto_revocation: AutoRevocationPolicy::None,
            start_armed: false,
            no_wait_armed: false,
        }
    }

    /// Time of the most recent update
    pub fn last_update(&self) -> Time {
        self.last_update
    }

    /// Jobs present, in arrival order
    pub fn jobs(&self) -> impl Iterator<Item = JobId> + '_ {
        self.visits.keys().copied()
    }

    /// Number of jobs present
    pub fn number_of_jobs(&self) -> usize {
        self.visits.len()
    }

    /// True if `job` is present
    pub fn contains(&self, job: JobId) -> bool {
        self.visits.contains_key(&job)
    }

    /// Waiting jobs, in arrival order
    pub fn waiting_jobs(&self) -> impl DoubleEndedIterator<Item = JobId> + '_ {
        self.visits
            .iter()
            .filter(|(_, visit)| visit.phase == JobPhase::Waiting)
            .map(|(job, _)| *job)
    }

    /// Number of waiting jobs
    pub fn number_of_waiting_jobs(&self) -> usize {
        self.visits.len() - self.in_service
    }

    /// Jobs in the service area, in arrival order
    pub fn jobs_in_service_area(&self) -> impl Iterator<Item = JobId> + '_ {
        self.visits
            .iter()
            .filter(|(_, visit)| visit.phase == JobPhase::InService)
            .map(|(job, _)| *job)
    }

    /// Number of jobs in the service area
    pub fn number_of_jobs_in_service_area(&self) -> usize {
        self.in_service
    }

    /// Phase of `job`, or `None` if absent
    pub fn phase(&self, job: JobId) -> Option<JobPhase> {
        self.visits.get(&job).map(|visit| visit.phase)
    }

    /// Arrival time of `job`, or `None` if absent
    pub fn arrival_time(&self, job: JobId) -> Option<Time> {
        self.visits.get(&job).map(|visit| visit.arrival_time)
    }

    /// Start time of `job`, or `None` if absent or still waiting
    pub fn start_time(&self, job: JobId) -> Option<Time> {
        self.visits.get(&job).and_then(|visit| visit.start_time)
    }

    pub fn is_on_access_vacation(&self) -> bool {
        self.access_vacation
    }

    pub fn server_access_credits(&self) -> Credits {
        self.credits
    }

    pub fn auto_revocation(&self) -> AutoRevocationPolicy {
        self.auto_revocation
    }

    /// Whether a free server could take a new job right now
    /// (access vacation and credits aside)
    pub fn is_start_armed(&self) -> bool {
        self.start_armed
    }

    /// Whether a newly arriving job would not have to wait
    pub fn is_no_wait_armed(&self) -> bool {
        self.no_wait_armed
    }

    pub(crate) fn insert_waiting(&mut self, job: JobId, time: Time) {
        self.visits.insert(
            job,
            JobVisit {
                arrival_time: time,
                phase: JobPhase::Waiting,
                start_time: None,
                departure: None,
            },
        );
    }

    /// Move a waiting job into the service area
    pub(crate) fn mark_in_service(&mut self, job: JobId, time: Time) -> Result<(), SimError> {
        match self.visits.get_mut(&job) {
            Some(visit) if visit.phase == JobPhase::Waiting => {
                visit.phase = JobPhase::InService;
                visit.start_time = Some(time);
                self.in_service += 1;
                Ok(())
            }
            Some(_) => Err(SimError::state(format!("{} is already in service", job))),
            None => Err(SimError::state(format!("{} is not present", job))),
        }
    }

    pub(crate) fn set_departure(&mut self, job: JobId, handle: EventHandle) {
        if let Some(visit) = self.visits.get_mut(&job) {
            visit.departure = Some(handle);
        }
    }

    /// Remove a job, keeping arrival order of the rest
    pub(crate) fn remove(&mut self, job: JobId) -> Option<JobVisit> {
        let visit = self.visits.shift_remove(&job)?;
        if visit.phase == JobPhase::InService {
            self.in_service -= 1;
        }
        Some(visit)
    }

    /// Back to an empty queue at `time`; the auto-revocation policy is
    /// configuration and survives
    pub(crate) fn reset(&mut self, time: Time) {
        self.last_update = time;
        self.visits.clear();
        self.in_service = 0;
        self.access_vacation = false;
        self.credits = Credits::Infinite;
    }
}
