//! Simulation engine
//!
//! One [`Simulation`] owns everything: the event list, every queue and job,
//! the delegate jobs of composite queues, and the listeners. Entities refer
//! to each other by id ([`QueueId`], [`JobId`]) and never hold references,
//! so a composite reacting to its sub-queue is just a method call on the
//! simulation.
//!
//! # Actions
//!
//! Every state change happens inside an *action*: a scheduled event being
//! executed, or a stimulus applied directly through the public API. Actions
//! nest (a custom event may call [`Simulation::arrive`]), and only the
//! outermost one completes the cycle:
//!
//! ```text
//! 1. Run the action; every transition appends to its entity's buffer
//! 2. Settle: hand each sub-queue's fresh notifications to its composite,
//!    which may cause more transitions and more notifications; repeat
//!    until no sub-queue has unrelayed notifications
//! 3. Flush: give each dirty entity's buffer to its listeners, one batch
//!    per entity, in the order entities first became dirty
//! ```
//!
//! # Critical Invariants
//!
//! 1. **No partial batches**: listeners only see complete per-action batches
//! 2. **Deterministic order**: same stimuli from the same reset produce the
//!    same notification stream
//! 3. **Poisoning**: after an invariant violation escapes an action, nothing
//!    runs until [`Simulation::reset`]
//!
//! # Example
//!
//! ```rust
//! use queueing_simulator_core_rs::discipline::Fcfs;
//! use queueing_simulator_core_rs::orchestrator::{Simulation, SimulationConfig};
//! use queueing_simulator_core_rs::Job;
//!
//! let mut sim = Simulation::new(SimulationConfig {
//!     record_trace: true,
//!     ..Default::default()
//! })
//! .unwrap();
//! let queue = sim.add_queue("server", Box::new(Fcfs::single_server()));
//! let job = sim.add_job(Job::new("first").with_service_time(2.0)).unwrap();
//!
//! sim.schedule_arrival(1.0, queue, job).unwrap();
//! sim.run().unwrap();
//!
//! assert_eq!(sim.now(), 3.0);
//! assert!(sim.job(job).unwrap().current_queue().is_none());
//! ```

use crate::core::error::{ErrorClass, SimError};
use crate::core::event_list::{EventHandle, EventList};
use crate::core::time::{check_time, InstantGuard, Time};
use crate::discipline::Discipline;
use crate::models::entity::{EntityBuffer, EntityRef, Listener, ListenerId};
use crate::models::job::{Job, JobId};
use crate::models::notification::{
    Notification, NotificationBatch, NotificationKind, NotificationLog,
};
use crate::models::queue::{Credits, QueueId, QueueState};
use crate::network::composite::CompositeState;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Source of simulation tags; zero is never handed out
static NEXT_OWNER: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Configuration
// ============================================================================

const DEFAULT_TRANSITION_LIMIT: NonZeroUsize = match NonZeroUsize::new(1_000_000) {
    Some(limit) => limit,
    None => panic!("default transition limit is zero"),
};

fn default_max_transitions() -> usize {
    DEFAULT_TRANSITION_LIMIT.get()
}

/// Engine configuration
///
/// # Fields
///
/// * `start_time` - Clock reading after construction (`None` = −∞)
/// * `max_transitions_per_instant` - Transitions allowed at one simulated
///   instant before the run fails with `InstantLivelock`
/// * `record_trace` - Keep every flushed batch in a [`NotificationLog`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default)]
    pub start_time: Option<f64>,

    #[serde(default = "default_max_transitions")]
    pub max_transitions_per_instant: usize,

    #[serde(default)]
    pub record_trace: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            start_time: None,
            max_transitions_per_instant: default_max_transitions(),
            record_trace: false,
        }
    }
}

impl SimulationConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), SimError> {
        self.transition_limit()?;
        if matches!(self.start_time, Some(t) if t.is_nan()) {
            return Err(SimError::Config("start_time must not be NaN".to_string()));
        }
        Ok(())
    }

    /// `max_transitions_per_instant`, which must be positive
    pub fn transition_limit(&self) -> Result<NonZeroUsize, SimError> {
        NonZeroUsize::new(self.max_transitions_per_instant).ok_or_else(|| {
            SimError::Config("max_transitions_per_instant must be positive".to_string())
        })
    }

    /// Start time with `None` resolved to −∞
    pub fn start(&self) -> Time {
        self.start_time.unwrap_or(f64::NEG_INFINITY)
    }
}

// ============================================================================
// Internal types
// ============================================================================

/// Custom scheduled action
pub type Action = Box<dyn FnOnce(&mut Simulation, Time) -> Result<(), SimError>>;

/// Everything the event list can hold
pub(crate) enum SimEvent {
    Arrival {
        queue: QueueId,
        job: JobId,
    },
    Revocation {
        queue: QueueId,
        job: JobId,
        interrupt_service: bool,
    },
    AccessVacation {
        queue: QueueId,
        on: bool,
    },
    ServerAccessCredits {
        queue: QueueId,
        credits: Credits,
    },
    GatePassageCredits {
        queue: QueueId,
        credits: Credits,
    },
    Departure {
        queue: QueueId,
        job: JobId,
    },
    Action(Action),
}

impl fmt::Debug for SimEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimEvent::Arrival { queue, job } => write!(f, "Arrival({}, {})", queue, job),
            SimEvent::Revocation {
                queue,
                job,
                interrupt_service,
            } => write!(f, "Revocation({}, {}, {})", queue, job, interrupt_service),
            SimEvent::AccessVacation { queue, on } => write!(f, "AccessVacation({}, {})", queue, on),
            SimEvent::ServerAccessCredits { queue, credits } => {
                write!(f, "ServerAccessCredits({}, {})", queue, credits)
            }
            SimEvent::GatePassageCredits { queue, credits } => {
                write!(f, "GatePassageCredits({}, {})", queue, credits)
            }
            SimEvent::Departure { queue, job } => write!(f, "Departure({}, {})", queue, job),
            SimEvent::Action(_) => write!(f, "Action"),
        }
    }
}

/// Atomic queue with a discipline, or a composite over sub-queues
#[derive(Debug)]
pub(crate) enum QueueKind {
    Atomic(Box<dyn Discipline>),
    Composite(Box<CompositeState>),
}

#[derive(Debug)]
pub(crate) struct QueueEntry {
    pub(crate) name: String,
    pub(crate) state: QueueState,
    pub(crate) kind: QueueKind,
    /// Composite owning this queue, if any
    pub(crate) parent: Option<QueueId>,
}

struct ListenerEntry {
    id: ListenerId,
    /// `None` listens to every entity
    target: Option<EntityRef>,
    listener: Box<dyn Listener>,
}

// ============================================================================
// Simulation
// ============================================================================

/// Discrete-event simulation of a queueing network
pub struct Simulation {
    config: SimulationConfig,
    /// Tag stamped into every id this simulation issues
    pub(crate) owner: u64,
    pub(crate) events: EventList<SimEvent>,

    pub(crate) queues: Vec<QueueEntry>,
    pub(crate) jobs: Vec<Job>,
    /// Live delegate jobs, keyed by their own id
    pub(crate) delegates: BTreeMap<JobId, Job>,
    pub(crate) next_delegate: u64,

    /// Entities in creation order; this is the reset order
    attachment: Vec<EntityRef>,

    listeners: Vec<ListenerEntry>,
    next_listener: u64,

    /// Per-entity notification buffers, in the order entities became dirty
    buffers: IndexMap<EntityRef, EntityBuffer>,
    /// Sub-queues with notifications their composite has not seen
    relay: VecDeque<QueueId>,

    pub(crate) guard: InstantGuard,
    depth: usize,
    poisoned: Option<SimError>,
    trace: Option<NotificationLog>,
}

impl Simulation {
    /// Create an empty simulation
    ///
    /// # Errors
    /// `Config` if the configuration is invalid
    pub fn new(config: SimulationConfig) -> Result<Self, SimError> {
        config.validate()?;
        let limit = config.transition_limit()?;
        Ok(Self::build(config, limit))
    }

    fn build(config: SimulationConfig, limit: NonZeroUsize) -> Self {
        let owner = NEXT_OWNER.fetch_add(1, Ordering::Relaxed);
        info!(
            owner,
            start_time = config.start(),
            max_transitions_per_instant = config.max_transitions_per_instant,
            record_trace = config.record_trace,
            "simulation created"
        );
        Self {
            owner,
            events: EventList::new(config.start()),
            queues: Vec::new(),
            jobs: Vec::new(),
            delegates: BTreeMap::new(),
            next_delegate: 0,
            attachment: Vec::new(),
            listeners: Vec::new(),
            next_listener: 0,
            buffers: IndexMap::new(),
            relay: VecDeque::new(),
            guard: InstantGuard::new(limit),
            depth: 0,
            poisoned: None,
            trace: config.record_trace.then(NotificationLog::new),
            config,
        }
    }

    // ------------------------------------------------------------------------
    // Entities
    // ------------------------------------------------------------------------

    /// Attach an atomic queue
    pub fn add_queue(&mut self, name: impl Into<String>, discipline: Box<dyn Discipline>) -> QueueId {
        let id = QueueId(self.queues.len(), self.owner);
        let name = name.into();
        info!(queue = %id, name = %name, discipline = discipline.name(), "queue attached");
        self.queues.push(QueueEntry {
            name,
            state: QueueState::new(self.events.now()),
            kind: QueueKind::Atomic(discipline),
            parent: None,
        });
        self.attachment.push(EntityRef::Queue(id));
        self.set_flags_silently(id);
        id
    }

    /// Attach a composite queue; wiring is done by the caller
    pub(crate) fn attach_composite(&mut self, name: String, state: CompositeState) -> QueueId {
        let id = QueueId(self.queues.len(), self.owner);
        self.queues.push(QueueEntry {
            name,
            state: QueueState::new(self.events.now()),
            kind: QueueKind::Composite(Box::new(state)),
            parent: None,
        });
        self.attachment.push(EntityRef::Queue(id));
        id
    }

    /// Attach a real job
    ///
    /// # Errors
    /// `IllegalArgument` for negative or NaN service times, or a per-queue
    /// entry naming a queue of another simulation
    pub fn add_job(&mut self, job: Job) -> Result<JobId, SimError> {
        if job.is_delegate() {
            return Err(SimError::argument("delegate jobs cannot be attached"));
        }
        job.validate()?;
        if let Some(queue) = job.service_time_queues().find(|q| q.owner() != self.owner) {
            return Err(SimError::argument(format!(
                "job '{}' names {} of another simulation",
                job.name(),
                queue
            )));
        }
        let id = JobId::real(self.owner, self.jobs.len());
        debug!(job = %id, name = job.name(), "job attached");
        self.jobs.push(job);
        self.attachment.push(EntityRef::Job(id));
        Ok(id)
    }

    /// Entry of a queue this simulation issued
    pub(crate) fn entry(&self, queue: QueueId) -> Option<&QueueEntry> {
        if queue.owner() != self.owner {
            return None;
        }
        self.queues.get(queue.0)
    }

    /// State of a queue
    pub fn queue(&self, queue: QueueId) -> Option<&QueueState> {
        self.entry(queue).map(|entry| &entry.state)
    }

    /// Name given at construction
    pub fn queue_name(&self, queue: QueueId) -> Option<&str> {
        self.entry(queue).map(|entry| entry.name.as_str())
    }

    /// Queue with the given name (first match)
    pub fn queue_by_name(&self, name: &str) -> Option<QueueId> {
        self.queues
            .iter()
            .position(|e| e.name == name)
            .map(|index| QueueId(index, self.owner))
    }

    /// Discipline name of an atomic queue
    pub fn discipline_name(&self, queue: QueueId) -> Option<&'static str> {
        match &self.entry(queue)?.kind {
            QueueKind::Atomic(d) => Some(d.name()),
            QueueKind::Composite(_) => None,
        }
    }

    /// Composite that owns `queue`, if any
    pub fn parent(&self, queue: QueueId) -> Option<QueueId> {
        self.entry(queue)?.parent
    }

    pub fn is_composite(&self, queue: QueueId) -> bool {
        matches!(
            self.entry(queue).map(|e| &e.kind),
            Some(QueueKind::Composite(_))
        )
    }

    /// Remaining passage credits of a gate queue
    pub fn gate_passage_credits(&self, queue: QueueId) -> Option<Credits> {
        match &self.entry(queue)?.kind {
            QueueKind::Atomic(d) => d.as_gate().map(|gate| gate.passage_credits()),
            QueueKind::Composite(_) => None,
        }
    }

    /// A real or live delegate job
    pub fn job(&self, job: JobId) -> Option<&Job> {
        if job.owner() != self.owner {
            None
        } else if job.is_delegate() {
            self.delegates.get(&job)
        } else {
            self.jobs.get(job.index())
        }
    }

    /// All attached queues, in creation order
    pub fn queue_ids(&self) -> impl Iterator<Item = QueueId> {
        let owner = self.owner;
        (0..self.queues.len()).map(move |index| QueueId(index, owner))
    }

    /// All real jobs, in creation order
    pub fn job_ids(&self) -> impl Iterator<Item = JobId> {
        let owner = self.owner;
        (0..self.jobs.len()).map(move |index| JobId::real(owner, index))
    }

    pub(crate) fn job_ref(&self, job: JobId) -> Result<&Job, SimError> {
        self.job(job)
            .ok_or_else(|| SimError::state(format!("unknown {}", job)))
    }

    pub(crate) fn job_mut(&mut self, job: JobId) -> Result<&mut Job, SimError> {
        let found = if job.is_delegate() {
            self.delegates.get_mut(&job)
        } else {
            self.jobs.get_mut(job.index())
        };
        found.ok_or_else(|| SimError::state(format!("unknown {}", job)))
    }

    // ------------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------------

    /// Receive the batches of one entity
    pub fn listen(
        &mut self,
        entity: impl Into<EntityRef>,
        listener: impl Listener + 'static,
    ) -> ListenerId {
        self.register(Some(entity.into()), Box::new(listener))
    }

    /// Receive the batches of every entity
    pub fn listen_all(&mut self, listener: impl Listener + 'static) -> ListenerId {
        self.register(None, Box::new(listener))
    }

    /// Remove a listener; false if it was not registered
    pub fn unlisten(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|entry| entry.id != id);
        self.listeners.len() != before
    }

    fn register(&mut self, target: Option<EntityRef>, listener: Box<dyn Listener>) -> ListenerId {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push(ListenerEntry {
            id,
            target,
            listener,
        });
        id
    }

    // ------------------------------------------------------------------------
    // Clock and run control
    // ------------------------------------------------------------------------

    /// Current simulated time
    pub fn now(&self) -> Time {
        self.events.now()
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Number of pending events
    pub fn pending_events(&self) -> usize {
        self.events.len()
    }

    /// Time of the next pending event
    pub fn next_event_time(&self) -> Option<Time> {
        self.events.peek_time()
    }

    /// Error that poisoned the simulation, if any
    pub fn poisoned(&self) -> Option<&SimError> {
        self.poisoned.as_ref()
    }

    /// Recorded notification log (when `record_trace` is on)
    pub fn trace(&self) -> Option<&NotificationLog> {
        self.trace.as_ref()
    }

    /// Schedule a custom action
    ///
    /// The closure runs as one action at `time`; anything it does to the
    /// model is batched with everything else that happens in that action.
    ///
    /// # Errors
    /// - `IllegalArgument` if `time` is NaN
    /// - `PastTime` if `time` is before the current time
    pub fn schedule<F>(&mut self, time: Time, action: F) -> Result<EventHandle, SimError>
    where
        F: FnOnce(&mut Simulation, Time) -> Result<(), SimError> + 'static,
    {
        self.ensure_live()?;
        self.events.schedule(time, SimEvent::Action(Box::new(action)))
    }

    /// Cancel a pending event; false if it already ran or was cancelled
    pub fn cancel(&mut self, handle: EventHandle) -> bool {
        self.events.cancel(handle)
    }

    /// True if the event behind `handle` has not run yet
    pub fn is_pending(&self, handle: EventHandle) -> bool {
        self.events.is_pending(handle)
    }

    /// Execute the earliest pending event
    ///
    /// Returns `Ok(false)` when nothing is pending.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if self.depth > 0 {
            return Err(SimError::state("cannot step the simulation from inside an action"));
        }
        self.ensure_live()?;
        let Some((time, _handle, event)) = self.events.pop_next() else {
            return Ok(false);
        };
        let result = self.in_action(|sim| sim.dispatch(time, event));
        if let Err(err) = &result {
            if self.poisoned.is_none() {
                self.poison(err.clone());
            }
        }
        result.map(|_| true)
    }

    /// Run until no event is pending
    pub fn run(&mut self) -> Result<(), SimError> {
        self.run_until(f64::INFINITY)
    }

    /// Run every event scheduled at or before `until`
    pub fn run_until(&mut self, until: Time) -> Result<(), SimError> {
        check_time(until)?;
        if self.depth > 0 {
            return Err(SimError::state("cannot run the simulation from inside an action"));
        }
        self.ensure_live()?;
        info!(from = self.events.now(), until, pending = self.events.len(), "run started");
        let mut executed = 0usize;
        while matches!(self.events.peek_time(), Some(t) if t <= until) {
            self.step()?;
            executed += 1;
        }
        info!(now = self.events.now(), executed, "run finished");
        Ok(())
    }

    /// Clear every pending event, set the clock to `time` and reset every
    /// entity in creation order
    ///
    /// The only way to recover a poisoned simulation. Listeners get their
    /// [`Listener::reset`] call, then one `Reset` batch per queue.
    pub fn reset(&mut self, time: Time) -> Result<(), SimError> {
        if self.depth > 0 {
            return Err(SimError::state("cannot reset the simulation from inside an action"));
        }
        self.events.reset(time)?;
        self.guard.clear();
        self.poisoned = None;
        self.buffers.clear();
        self.relay.clear();
        self.delegates.clear();
        self.next_delegate = 0;
        if let Some(trace) = &mut self.trace {
            trace.clear();
        }
        info!(time, entities = self.attachment.len(), "simulation reset");

        for index in 0..self.attachment.len() {
            match self.attachment[index] {
                EntityRef::Queue(queue) => self.reset_queue(time, queue),
                EntityRef::Job(job) => {
                    if let Some(record) = self.jobs.get_mut(job.index()) {
                        record.set_current_queue(None);
                    }
                }
            }
        }
        for entry in &mut self.listeners {
            entry.listener.reset(time);
        }
        self.relay.clear();
        self.flush();
        Ok(())
    }

    fn reset_queue(&mut self, time: Time, queue: QueueId) {
        let entry = &mut self.queues[queue.0];
        entry.state.reset(time);
        match &mut entry.kind {
            QueueKind::Atomic(discipline) => discipline.reset(),
            QueueKind::Composite(composite) => composite.reset(),
        }
        self.notify(time, queue, NotificationKind::Reset, None);
        self.sync_wait_credits_silently(queue);
        self.set_flags_silently(queue);
    }

    // ------------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------------

    pub(crate) fn ensure_live(&self) -> Result<(), SimError> {
        match &self.poisoned {
            Some(err) => Err(SimError::Poisoned(Box::new(err.clone()))),
            None => Ok(()),
        }
    }

    /// Run `f` as an action; the outermost one settles and flushes
    pub(crate) fn in_action<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, SimError>,
    ) -> Result<T, SimError> {
        self.ensure_live()?;
        self.depth += 1;
        let result = f(self);
        self.depth -= 1;
        if self.depth > 0 {
            return result;
        }

        let result = result.and_then(|value| self.settle().map(|_| value));
        match result {
            Ok(value) => {
                self.flush();
                Ok(value)
            }
            Err(err) => {
                if err.class() == ErrorClass::IllegalState {
                    self.poison(err.clone());
                } else {
                    self.buffers.clear();
                    self.relay.clear();
                }
                Err(err)
            }
        }
    }

    fn poison(&mut self, err: SimError) {
        warn!(error = %err, now = self.events.now(), "simulation poisoned; reset required");
        self.poisoned = Some(err);
        self.buffers.clear();
        self.relay.clear();
    }

    fn dispatch(&mut self, time: Time, event: SimEvent) -> Result<(), SimError> {
        match event {
            SimEvent::Arrival { queue, job } => {
                self.check_open(queue)?;
                self.arrive_at(time, queue, job)
            }
            SimEvent::Revocation {
                queue,
                job,
                interrupt_service,
            } => {
                self.check_open(queue)?;
                self.revoke_at(time, queue, job, interrupt_service).map(|_| ())
            }
            SimEvent::AccessVacation { queue, on } => {
                self.check_open(queue)?;
                self.access_vacation_at(time, queue, on)
            }
            SimEvent::ServerAccessCredits { queue, credits } => {
                self.check_open(queue)?;
                self.server_access_credits_at(time, queue, credits)
            }
            SimEvent::GatePassageCredits { queue, credits } => {
                self.check_open(queue)?;
                self.gate_passage_credits_at(time, queue, credits)
            }
            SimEvent::Departure { queue, job } => self.depart_at(time, queue, job),
            SimEvent::Action(action) => action(self, time),
        }
    }

    /// Append a notification to the queue's buffer (and the job's, for
    /// real-job transitions); queue the sub-queue for relaying
    pub(crate) fn notify(
        &mut self,
        time: Time,
        queue: QueueId,
        kind: NotificationKind,
        job: Option<JobId>,
    ) {
        let notification = Notification {
            time,
            kind,
            queue,
            job,
        };
        self.buffers
            .entry(EntityRef::Queue(queue))
            .or_default()
            .notifications
            .push(notification);
        if let Some(job) = job {
            if !job.is_delegate() && kind.is_job_transition() {
                self.buffers
                    .entry(EntityRef::Job(job))
                    .or_default()
                    .notifications
                    .push(notification);
            }
        }
        if self.queues[queue.0].parent.is_some() && !self.relay.contains(&queue) {
            self.relay.push_back(queue);
        }
    }

    /// Relay sub-queue notifications to composites until quiet
    fn settle(&mut self) -> Result<(), SimError> {
        while let Some(sub) = self.relay.pop_front() {
            let Some(parent) = self.queues[sub.0].parent else {
                continue;
            };
            let fresh = match self.buffers.get_mut(&EntityRef::Queue(sub)) {
                Some(buffer) => buffer.take_unrelayed(),
                None => continue,
            };
            if !fresh.is_empty() {
                self.relay_to_composite(parent, sub, &fresh)?;
            }
        }
        Ok(())
    }

    fn flush(&mut self) {
        let buffers = std::mem::take(&mut self.buffers);
        for (entity, buffer) in buffers {
            if buffer.notifications.is_empty() {
                continue;
            }
            let batch = NotificationBatch {
                entity,
                notifications: buffer.notifications,
            };
            for entry in self
                .listeners
                .iter_mut()
                .filter(|entry| entry.target.map_or(true, |target| target == entity))
            {
                entry.listener.notify(&batch);
            }
            if let Some(trace) = &mut self.trace {
                trace.record(batch);
            }
        }
    }
}

impl Default for Simulation {
    fn default() -> Self {
        Self::build(SimulationConfig::default(), DEFAULT_TRANSITION_LIMIT)
    }
}

impl fmt::Debug for Simulation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Simulation")
            .field("now", &self.events.now())
            .field("pending_events", &self.events.len())
            .field("queues", &self.queues.len())
            .field("jobs", &self.jobs.len())
            .field("delegates", &self.delegates.len())
            .field("listeners", &self.listeners.len())
            .field("poisoned", &self.poisoned)
            .finish()
    }
}
