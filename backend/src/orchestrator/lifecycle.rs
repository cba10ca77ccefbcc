//! Job/queue lifecycle state machine
//!
//! Per job and per visit:
//!
//! ```text
//! arrive ──► WAITING ──start──► IN SERVICE ──► DEPARTED
//!              │                    │
//!              ├──► DROPPED         └──► REVOKED (interrupting)
//!              └──► REVOKED
//! ```
//!
//! Terminal outcomes end the visit; the job may then arrive anywhere anew.
//! After every operation the queue recomputes its start-armed and
//! no-wait-armed flags and reports each flip.
//!
//! Public entry points validate their arguments before touching any state
//! and fail with `IllegalArgument`. Guard violations inside the machine are
//! `IllegalState` and poison the simulation.

use super::engine::{QueueKind, SimEvent, Simulation};
use crate::core::error::SimError;
use crate::core::event_list::EventHandle;
use crate::core::time::{check_time, Time};
use crate::models::job::{JobId, JobKind};
use crate::models::notification::NotificationKind;
use crate::models::queue::{AutoRevocationPolicy, Credits, JobPhase, QueueId};
use crate::network::StartModel;
use tracing::debug;

impl Simulation {
    // ========================================================================
    // Stimuli
    // ========================================================================

    /// Let `job` arrive at `queue` now, at `time`
    ///
    /// # Errors
    /// `IllegalArgument` if the queue or job is unknown, the queue belongs to
    /// a composite, `time` is NaN or before the current time or the queue's
    /// last update, or the job is already visiting a queue
    pub fn arrive(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        self.check_stimulus(time, queue)?;
        self.check_real_job(job)?;
        self.in_action(|sim| sim.arrive_at(time, queue, job))
    }

    /// Revoke `job` from `queue`
    ///
    /// A job in service is only revoked when `interrupt_service` is set.
    /// Returns `Ok(false)` if nothing was revoked (job absent, or in service
    /// without interruption).
    pub fn revoke(
        &mut self,
        time: Time,
        queue: QueueId,
        job: JobId,
        interrupt_service: bool,
    ) -> Result<bool, SimError> {
        self.check_stimulus(time, queue)?;
        self.check_real_job(job)?;
        self.in_action(|sim| sim.revoke_at(time, queue, job, interrupt_service))
    }

    /// Start or end an access vacation
    pub fn set_access_vacation(&mut self, time: Time, queue: QueueId, on: bool) -> Result<(), SimError> {
        self.check_stimulus(time, queue)?;
        self.in_action(|sim| sim.access_vacation_at(time, queue, on))
    }

    /// Replace the server-access credits
    pub fn set_server_access_credits(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<(), SimError> {
        self.check_stimulus(time, queue)?;
        self.in_action(|sim| sim.server_access_credits_at(time, queue, credits))
    }

    /// Replace the passage credits of a gate queue
    ///
    /// # Errors
    /// `IllegalArgument` if `queue` is not a gate
    pub fn set_gate_passage_credits(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<(), SimError> {
        self.check_stimulus(time, queue)?;
        self.check_gate(queue)?;
        self.in_action(|sim| sim.gate_passage_credits_at(time, queue, credits))
    }

    /// Set the auto-revocation policy of a queue
    pub fn set_auto_revocation(
        &mut self,
        queue: QueueId,
        policy: AutoRevocationPolicy,
    ) -> Result<(), SimError> {
        self.check_queue(queue)?;
        self.check_open(queue)?;
        self.queues[queue.0].state.auto_revocation = policy;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Scheduled stimuli
    // ------------------------------------------------------------------------

    pub fn schedule_arrival(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<EventHandle, SimError> {
        self.check_stimulus(time, queue)?;
        self.check_real_job(job)?;
        self.events.schedule(time, SimEvent::Arrival { queue, job })
    }

    pub fn schedule_revocation(
        &mut self,
        time: Time,
        queue: QueueId,
        job: JobId,
        interrupt_service: bool,
    ) -> Result<EventHandle, SimError> {
        self.check_stimulus(time, queue)?;
        self.check_real_job(job)?;
        self.events.schedule(
            time,
            SimEvent::Revocation {
                queue,
                job,
                interrupt_service,
            },
        )
    }

    pub fn schedule_access_vacation(&mut self, time: Time, queue: QueueId, on: bool) -> Result<EventHandle, SimError> {
        self.check_stimulus(time, queue)?;
        self.events.schedule(time, SimEvent::AccessVacation { queue, on })
    }

    pub fn schedule_server_access_credits(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<EventHandle, SimError> {
        self.check_stimulus(time, queue)?;
        self.events
            .schedule(time, SimEvent::ServerAccessCredits { queue, credits })
    }

    pub fn schedule_gate_passage_credits(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<EventHandle, SimError> {
        self.check_stimulus(time, queue)?;
        self.check_gate(queue)?;
        self.events
            .schedule(time, SimEvent::GatePassageCredits { queue, credits })
    }

    // ------------------------------------------------------------------------
    // Validation
    // ------------------------------------------------------------------------

    pub(crate) fn check_queue(&self, queue: QueueId) -> Result<(), SimError> {
        if queue.owner() != self.owner {
            return Err(SimError::argument(format!(
                "{} belongs to another simulation",
                queue
            )));
        }
        if queue.0 >= self.queues.len() {
            return Err(SimError::argument(format!("unknown {}", queue)));
        }
        Ok(())
    }

    /// Sub-queues only take orders from their composite
    pub(crate) fn check_open(&self, queue: QueueId) -> Result<(), SimError> {
        match self.queues[queue.0].parent {
            Some(parent) => Err(SimError::argument(format!(
                "{} is owned by composite {}",
                queue, parent
            ))),
            None => Ok(()),
        }
    }

    fn check_stimulus(&self, time: Time, queue: QueueId) -> Result<(), SimError> {
        self.ensure_live()?;
        check_time(time)?;
        self.check_queue(queue)?;
        self.check_open(queue)?;
        if time < self.events.now() {
            return Err(SimError::argument(format!(
                "time {} is before the current time {}",
                time,
                self.events.now()
            )));
        }
        Ok(())
    }

    fn check_real_job(&self, job: JobId) -> Result<(), SimError> {
        if job.owner() != self.owner {
            return Err(SimError::argument(format!(
                "{} belongs to another simulation",
                job
            )));
        }
        if job.is_delegate() || job.index() >= self.jobs.len() {
            return Err(SimError::argument(format!("unknown {}", job)));
        }
        Ok(())
    }

    fn check_gate(&self, queue: QueueId) -> Result<(), SimError> {
        match &self.queues[queue.0].kind {
            QueueKind::Atomic(d) if d.as_gate().is_some() => Ok(()),
            _ => Err(SimError::argument(format!("{} is not a gate", queue))),
        }
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Advance the queue's clock, reporting an update if it moved
    pub(crate) fn update(&mut self, time: Time, queue: QueueId) -> Result<(), SimError> {
        let state = &mut self.queues[queue.0].state;
        if time < state.last_update {
            return Err(SimError::argument(format!(
                "time {} is before the last update {} of {}",
                time, state.last_update, queue
            )));
        }
        if time > state.last_update {
            state.last_update = time;
            self.notify(time, queue, NotificationKind::Update, None);
        }
        Ok(())
    }

    pub(crate) fn arrive_at(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        if let Some(at) = self.job_ref(job)?.current_queue() {
            return Err(SimError::argument(format!("{} is already at {}", job, at)));
        }
        self.update(time, queue)?;
        self.guard.record(time)?;
        debug!(time, queue = %queue, job = %job, "arrival");
        self.notify(time, queue, NotificationKind::Arrival, Some(job));

        if self.queues[queue.0].state.access_vacation {
            debug!(time, queue = %queue, job = %job, "dropped: access vacation");
            self.notify(time, queue, NotificationKind::Drop, Some(job));
            self.refresh_flags(time, queue);
            return Ok(());
        }

        self.queues[queue.0].state.insert_waiting(job, time);
        self.job_mut(job)?.set_current_queue(Some(queue));

        if matches!(self.queues[queue.0].kind, QueueKind::Composite(_)) {
            self.composite_arrival(time, queue, job)?;
        } else {
            self.reschedule(time, queue)?;
            self.drop_on_overflow(time, queue, job)?;
        }
        self.refresh_flags(time, queue);
        Ok(())
    }

    /// Drop the arriving job if it is still waiting beyond the buffer
    fn drop_on_overflow(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        let entry = &self.queues[queue.0];
        let QueueKind::Atomic(discipline) = &entry.kind else {
            return Ok(());
        };
        let overflow = discipline
            .buffer_size()
            .is_some_and(|size| entry.state.number_of_waiting_jobs() > size);
        if overflow && entry.state.phase(job) == Some(JobPhase::Waiting) {
            debug!(time, queue = %queue, job = %job, "dropped: buffer full");
            self.exit(time, queue, job, NotificationKind::Drop)?;
        }
        Ok(())
    }

    /// Start waiting jobs for as long as credits, servers and the
    /// discipline allow
    pub(crate) fn reschedule(&mut self, time: Time, queue: QueueId) -> Result<(), SimError> {
        loop {
            let entry = &mut self.queues[queue.0];
            if entry.state.credits.is_zero() {
                return Ok(());
            }
            let QueueKind::Atomic(discipline) = &mut entry.kind else {
                return Ok(());
            };
            if !discipline.has_server_available(&entry.state) {
                return Ok(());
            }
            let Some(job) = discipline.select_start(&entry.state) else {
                return Ok(());
            };
            self.start(time, queue, job)?;
        }
    }

    /// Waiting → service at an atomic queue
    ///
    /// Zero service (or finite service at an infinite time) departs on the
    /// spot; finite service schedules the departure; infinite service never
    /// ends on its own.
    fn start(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        self.guard.record(time)?;
        self.enter_service(time, queue, job)?;

        let entry = &mut self.queues[queue.0];
        let QueueKind::Atomic(discipline) = &mut entry.kind else {
            return Err(SimError::state(format!("{} has no discipline", queue)));
        };
        discipline.insert_on_start(job, time);
        if entry.state.auto_revocation == AutoRevocationPolicy::UponStart {
            debug!(time, queue = %queue, job = %job, "auto-revocation upon start");
            return self.exit(time, queue, job, NotificationKind::AutoRevocation);
        }

        let requested = self.requested_service_time(job, queue)?;
        let service = match &self.queues[queue.0].kind {
            QueueKind::Atomic(discipline) => discipline.service_time_for_job(job, requested),
            QueueKind::Composite(_) => requested,
        };
        if service.is_nan() || service < 0.0 {
            return Err(SimError::state(format!(
                "invalid service time {} for {} at {}",
                service, job, queue
            )));
        }

        if service == 0.0 || (service.is_finite() && time.is_infinite()) {
            return self.exit(time, queue, job, NotificationKind::Departure);
        }
        if service.is_finite() {
            let handle = self
                .events
                .schedule(time + service, SimEvent::Departure { queue, job })?;
            self.queues[queue.0].state.set_departure(job, handle);
        }
        Ok(())
    }

    /// Mark the job in service, consume a credit and report
    pub(crate) fn enter_service(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        let state = &mut self.queues[queue.0].state;
        if state.credits.is_zero() {
            return Err(SimError::state(format!(
                "{} started {} without server-access credits",
                queue, job
            )));
        }
        state.mark_in_service(job, time)?;
        state.credits = state.credits.consume();
        let exhausted = state.credits.is_zero();
        debug!(time, queue = %queue, job = %job, "start");
        self.notify(time, queue, NotificationKind::Start, Some(job));
        if exhausted {
            self.notify(time, queue, NotificationKind::OutOfServerAccessCredits, None);
        }
        Ok(())
    }

    /// Service → departed, fired by the departure event
    pub(crate) fn depart_at(&mut self, time: Time, queue: QueueId, job: JobId) -> Result<(), SimError> {
        self.update(time, queue)?;
        if self.queues[queue.0].state.phase(job) != Some(JobPhase::InService) {
            return Err(SimError::state(format!("{} cannot depart {}: not in service", job, queue)));
        }
        self.guard.record(time)?;
        self.exit(time, queue, job, NotificationKind::Departure)?;
        self.reschedule(time, queue)?;
        self.refresh_flags(time, queue);
        Ok(())
    }

    /// Remove a job through one terminal transition
    pub(crate) fn exit(
        &mut self,
        time: Time,
        queue: QueueId,
        job: JobId,
        kind: NotificationKind,
    ) -> Result<(), SimError> {
        let entry = &mut self.queues[queue.0];
        let visit = entry
            .state
            .remove(job)
            .ok_or_else(|| SimError::state(format!("{} is not at {}", job, queue)))?;
        if let QueueKind::Atomic(discipline) = &mut entry.kind {
            discipline.remove_job(job);
        }
        if let Some(handle) = visit.departure {
            self.events.cancel(handle);
        }
        self.job_mut(job)?.set_current_queue(None);
        debug!(time, queue = %queue, job = %job, outcome = kind.name(), "job left queue");
        self.notify(time, queue, kind, Some(job));
        Ok(())
    }

    pub(crate) fn revoke_at(
        &mut self,
        time: Time,
        queue: QueueId,
        job: JobId,
        interrupt_service: bool,
    ) -> Result<bool, SimError> {
        self.update(time, queue)?;
        let Some(phase) = self.queues[queue.0].state.phase(job) else {
            return Ok(false);
        };
        if phase == JobPhase::InService && !interrupt_service {
            return Ok(false);
        }
        self.guard.record(time)?;
        if matches!(self.queues[queue.0].kind, QueueKind::Composite(_)) {
            self.composite_withdraw(time, queue, job, NotificationKind::Revocation)?;
        } else {
            self.exit(time, queue, job, NotificationKind::Revocation)?;
            self.reschedule(time, queue)?;
        }
        self.refresh_flags(time, queue);
        Ok(true)
    }

    pub(crate) fn access_vacation_at(&mut self, time: Time, queue: QueueId, on: bool) -> Result<(), SimError> {
        self.update(time, queue)?;
        let state = &mut self.queues[queue.0].state;
        if state.access_vacation != on {
            state.access_vacation = on;
            let kind = if on {
                NotificationKind::AccessVacationStart
            } else {
                NotificationKind::AccessVacationEnd
            };
            debug!(time, queue = %queue, on, "access vacation");
            self.notify(time, queue, kind, None);
        }
        self.refresh_flags(time, queue);
        Ok(())
    }

    pub(crate) fn server_access_credits_at(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<(), SimError> {
        self.update(time, queue)?;
        let state = &mut self.queues[queue.0].state;
        let old = state.credits;
        if old == credits {
            return Ok(());
        }
        state.credits = credits;
        debug!(time, queue = %queue, credits = %credits, "server-access credits");
        if old.is_zero() {
            self.notify(time, queue, NotificationKind::RegainedServerAccessCredits, None);
        } else if credits.is_zero() {
            self.notify(time, queue, NotificationKind::OutOfServerAccessCredits, None);
        }
        if matches!(self.queues[queue.0].kind, QueueKind::Composite(_)) {
            self.composite_credits_changed(time, queue)?;
        } else {
            self.reschedule(time, queue)?;
        }
        self.refresh_flags(time, queue);
        Ok(())
    }

    pub(crate) fn gate_passage_credits_at(
        &mut self,
        time: Time,
        queue: QueueId,
        credits: Credits,
    ) -> Result<(), SimError> {
        self.update(time, queue)?;
        let gate = match &mut self.queues[queue.0].kind {
            QueueKind::Atomic(d) => d.as_gate_mut(),
            QueueKind::Composite(_) => None,
        };
        let Some(gate) = gate else {
            return Err(SimError::argument(format!("{} is not a gate", queue)));
        };
        gate.set_passage_credits(credits);
        debug!(time, queue = %queue, credits = %credits, "gate-passage credits");
        self.reschedule(time, queue)?;
        self.refresh_flags(time, queue);
        Ok(())
    }

    // ========================================================================
    // Service times and flags
    // ========================================================================

    /// Service time `job` requests at `queue`
    ///
    /// A delegate's own explicit entry wins; then the real job's entry for
    /// that sub-queue; otherwise whatever the real job requests at the
    /// composite (recursively, for nested composites).
    pub(crate) fn requested_service_time(&self, job: JobId, queue: QueueId) -> Result<Time, SimError> {
        let (mut job, mut queue) = (job, queue);
        loop {
            let record = self.job_ref(job)?;
            match record.kind() {
                JobKind::Real => {
                    return Ok(record
                        .explicit_service_time(queue)
                        .unwrap_or(record.default_service_time()))
                }
                JobKind::Delegate { real, composite } => {
                    if let Some(t) = record.explicit_service_time(queue) {
                        return Ok(t);
                    }
                    if let Some(t) = self.job_ref(real)?.explicit_service_time(queue) {
                        return Ok(t);
                    }
                    job = real;
                    queue = composite;
                }
            }
        }
    }

    fn compute_flags(&self, queue: QueueId) -> (bool, bool) {
        let entry = &self.queues[queue.0];
        let start_armed = match &entry.kind {
            QueueKind::Atomic(discipline) => discipline.has_server_available(&entry.state),
            QueueKind::Composite(composite) => match composite.model {
                StartModel::Local => true,
                StartModel::Encapsulator => composite
                    .sub_queues
                    .first()
                    .is_some_and(|sub| self.queues[sub.0].state.start_armed),
                StartModel::CompressedTandem2 => composite
                    .wait_serve()
                    .is_some_and(|(_, serve)| self.queues[serve.0].state.start_armed),
            },
        };
        let no_wait_armed = start_armed
            && !entry.state.credits.is_zero()
            && entry.state.number_of_waiting_jobs() == 0;
        (start_armed, no_wait_armed)
    }

    /// Recompute both flags and report each flip
    pub(crate) fn refresh_flags(&mut self, time: Time, queue: QueueId) {
        let (start_armed, no_wait_armed) = self.compute_flags(queue);
        let state = &mut self.queues[queue.0].state;
        let start_flipped = state.start_armed != start_armed;
        let no_wait_flipped = state.no_wait_armed != no_wait_armed;
        state.start_armed = start_armed;
        state.no_wait_armed = no_wait_armed;
        if start_flipped {
            self.notify(time, queue, NotificationKind::StartArmed(start_armed), None);
        }
        if no_wait_flipped {
            self.notify(time, queue, NotificationKind::NoWaitArmed(no_wait_armed), None);
        }
    }

    /// Recompute both flags without reporting (construction and reset)
    pub(crate) fn set_flags_silently(&mut self, queue: QueueId) {
        let (start_armed, no_wait_armed) = self.compute_flags(queue);
        let state = &mut self.queues[queue.0].state;
        state.start_armed = start_armed;
        state.no_wait_armed = no_wait_armed;
    }
}
