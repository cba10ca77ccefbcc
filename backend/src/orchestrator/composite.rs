//! Composite queues
//!
//! A composite turns each real arrival into exactly one delegate job, routes
//! the delegate through its sub-queues with its [`QueueSelector`], and
//! translates what happens to the delegate back into its own lifecycle:
//!
//! | Sub-queue notification | Composite reaction |
//! |------------------------|--------------------|
//! | Start | composite start, for `Encapsulator` and the wait queue of `CompressedTandem2` |
//! | Drop | drop of the real job |
//! | Departure / AutoRevocation | `select_next`: re-inject, or depart the real job |
//!
//! Sub-queue batches reach the composite when the enclosing action settles,
//! so the composite always sees a complete, ordered sub-queue batch.
//!
//! # Critical Invariants
//!
//! 1. **Conservation**: real jobs at the composite == live delegates
//!    (parked delegates of `Local` composites without credits included)
//! 2. **Containment**: sub-queues take no stimuli from outside; delegates
//!    never arrive at the composite itself

use super::engine::{QueueKind, Simulation};
use crate::core::error::{ErrorClass, SimError};
use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::notification::{Notification, NotificationKind};
use crate::models::queue::{AutoRevocationPolicy, Credits, JobPhase, QueueId};
use crate::network::composite::CompositeState;
use crate::network::{
    CompressedTandemSelector, DefaultDelegateJobFactory, DelegateJobFactory, FeedbackMode,
    FeedbackSelector, ParallelMode, ParallelSelector, QueueSelector, StartModel, TandemSelector,
};
use std::collections::HashSet;
use tracing::{debug, info};

/// Failures of internal plumbing are invariant violations, whatever their
/// original class
fn internal(err: SimError) -> SimError {
    match err.class() {
        ErrorClass::IllegalArgument => SimError::IllegalState(err.to_string()),
        ErrorClass::IllegalState => err,
    }
}

impl Simulation {
    // ========================================================================
    // Construction
    // ========================================================================

    /// Attach a composite queue over `sub_queues`
    ///
    /// # Arguments
    /// * `selector` - routes delegates through the sub-queues
    /// * `model` - when the composite's own start happens
    /// * `factory` - creates delegates; `None` uses [`DefaultDelegateJobFactory`]
    ///
    /// # Errors
    /// `IllegalArgument` if the list is empty, holds duplicates or unknown
    /// queues, a sub-queue already belongs to a composite or holds jobs, or
    /// the number of sub-queues does not fit the start model
    pub fn add_composite(
        &mut self,
        name: impl Into<String>,
        sub_queues: Vec<QueueId>,
        selector: Box<dyn QueueSelector>,
        model: StartModel,
        factory: Option<Box<dyn DelegateJobFactory>>,
    ) -> Result<QueueId, SimError> {
        self.ensure_live()?;
        let name = name.into();
        self.check_sub_queues(&name, &sub_queues, model)?;

        let factory = factory.unwrap_or_else(|| Box::new(DefaultDelegateJobFactory));
        let state = CompositeState::new(model, sub_queues.clone(), selector, factory);
        let id = self.attach_composite(name.clone(), state);
        for sub in &sub_queues {
            self.queues[sub.0].parent = Some(id);
        }

        match model {
            StartModel::Local => {}
            StartModel::Encapsulator => {
                let sub = sub_queues[0];
                self.queues[sub.0].state.credits = self.queues[id.0].state.credits;
                self.set_flags_silently(sub);
            }
            StartModel::CompressedTandem2 => {
                let wait = sub_queues[0];
                self.queues[wait.0].state.auto_revocation = AutoRevocationPolicy::UponStart;
                self.sync_wait_credits_silently(id);
            }
        }
        self.set_flags_silently(id);
        info!(
            queue = %id,
            name = %name,
            model = ?model,
            sub_queues = sub_queues.len(),
            "composite attached"
        );
        Ok(id)
    }

    fn check_sub_queues(&self, name: &str, subs: &[QueueId], model: StartModel) -> Result<(), SimError> {
        if subs.is_empty() {
            return Err(SimError::argument(format!("composite '{}' has no sub-queues", name)));
        }
        if let Some(arity) = model.arity() {
            if subs.len() != arity {
                return Err(SimError::argument(format!(
                    "composite '{}' with start model {:?} needs {} sub-queue(s), got {}",
                    name,
                    model,
                    arity,
                    subs.len()
                )));
            }
        }
        let mut seen = HashSet::new();
        for sub in subs {
            self.check_queue(*sub)?;
            if !seen.insert(*sub) {
                return Err(SimError::argument(format!(
                    "composite '{}' lists {} twice",
                    name, sub
                )));
            }
            let entry = &self.queues[sub.0];
            if let Some(parent) = entry.parent {
                return Err(SimError::argument(format!(
                    "{} already belongs to composite {}",
                    sub, parent
                )));
            }
            if entry.state.number_of_jobs() > 0 {
                return Err(SimError::argument(format!("{} is not empty", sub)));
            }
        }
        Ok(())
    }

    /// Every sub-queue once, in order; composite starts on admission
    pub fn add_tandem(&mut self, name: impl Into<String>, sub_queues: Vec<QueueId>) -> Result<QueueId, SimError> {
        let selector = Box::new(TandemSelector::new(sub_queues.clone()));
        self.add_composite(name, sub_queues, selector, StartModel::Local, None)
    }

    /// Exactly one of the sub-queues per job
    pub fn add_parallel(
        &mut self,
        name: impl Into<String>,
        sub_queues: Vec<QueueId>,
        mode: ParallelMode,
    ) -> Result<QueueId, SimError> {
        let selector = Box::new(ParallelSelector::new(sub_queues.clone(), mode));
        self.add_composite(name, sub_queues, selector, StartModel::Local, None)
    }

    /// Repeated visits to one sub-queue
    pub fn add_feedback(
        &mut self,
        name: impl Into<String>,
        sub_queue: QueueId,
        mode: FeedbackMode,
    ) -> Result<QueueId, SimError> {
        let selector = Box::new(FeedbackSelector::new(sub_queue, mode));
        self.add_composite(name, vec![sub_queue], selector, StartModel::Local, None)
    }

    /// One sub-queue presented as the composite itself
    pub fn add_encapsulator(&mut self, name: impl Into<String>, sub_queue: QueueId) -> Result<QueueId, SimError> {
        let selector = Box::new(TandemSelector::new(vec![sub_queue]));
        self.add_composite(name, vec![sub_queue], selector, StartModel::Encapsulator, None)
    }

    /// Ordering by `wait`, service by `serve`
    pub fn add_compressed_tandem(
        &mut self,
        name: impl Into<String>,
        wait: QueueId,
        serve: QueueId,
    ) -> Result<QueueId, SimError> {
        let selector = Box::new(CompressedTandemSelector::new(wait, serve));
        self.add_composite(
            name,
            vec![wait, serve],
            selector,
            StartModel::CompressedTandem2,
            None,
        )
    }

    // ========================================================================
    // Inspection
    // ========================================================================

    /// Sub-queues of a composite
    pub fn sub_queues(&self, composite: QueueId) -> Option<&[QueueId]> {
        self.composite(composite).ok().map(|c| c.sub_queues.as_slice())
    }

    /// Start model of a composite
    pub fn start_model(&self, composite: QueueId) -> Option<StartModel> {
        self.composite(composite).ok().map(|c| c.model)
    }

    /// Delegate currently standing in for `real` inside `composite`
    pub fn delegate_of(&self, composite: QueueId, real: JobId) -> Option<JobId> {
        self.composite(composite).ok()?.delegate_of(real)
    }

    /// Number of live delegates of a composite
    pub fn live_delegates(&self, composite: QueueId) -> Option<usize> {
        self.composite(composite).ok().map(|c| c.live_delegates())
    }

    pub(crate) fn composite(&self, queue: QueueId) -> Result<&CompositeState, SimError> {
        match self.entry(queue).map(|e| &e.kind) {
            Some(QueueKind::Composite(c)) => Ok(c),
            _ => Err(SimError::state(format!("{} is not a composite", queue))),
        }
    }

    fn composite_mut(&mut self, queue: QueueId) -> Result<&mut CompositeState, SimError> {
        match self.queues.get_mut(queue.0).map(|e| &mut e.kind) {
            Some(QueueKind::Composite(c)) => Ok(c),
            _ => Err(SimError::state(format!("{} is not a composite", queue))),
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// A real job entered the composite: create its delegate and, depending
    /// on the start model, start and inject it
    pub(crate) fn composite_arrival(&mut self, time: Time, composite: QueueId, real: JobId) -> Result<(), SimError> {
        let delegate_id = JobId::delegate(self.owner, self.next_delegate);
        self.next_delegate += 1;

        let real_job = if real.is_delegate() {
            self.delegates.get(&real)
        } else {
            self.jobs.get(real.index())
        }
        .ok_or_else(|| SimError::state(format!("unknown {}", real)))?;
        let QueueKind::Composite(state) = &mut self.queues[composite.0].kind else {
            return Err(SimError::state(format!("{} is not a composite", composite)));
        };
        let delegate = state
            .factory
            .create(time, real_job, composite)
            .into_delegate(real, composite);
        delegate.validate().map_err(internal)?;
        state.link(real, delegate_id);
        let model = state.model;
        self.delegates.insert(delegate_id, delegate);
        debug!(time, queue = %composite, job = %real, delegate = %delegate_id, "delegate created");

        match model {
            StartModel::Local => {
                if !self.queues[composite.0].state.credits.is_zero()
                    && self.composite_start(time, composite, real)?
                {
                    self.inject_first(time, composite, real)?;
                }
                Ok(())
            }
            StartModel::Encapsulator | StartModel::CompressedTandem2 => {
                self.inject_first(time, composite, real)
            }
        }
    }

    /// Start the real job at the composite
    ///
    /// Returns false if auto-revocation removed the job on the spot.
    fn composite_start(&mut self, time: Time, composite: QueueId, real: JobId) -> Result<bool, SimError> {
        self.guard.record(time)?;
        self.enter_service(time, composite, real)?;
        if self.queues[composite.0].state.auto_revocation == AutoRevocationPolicy::UponStart {
            debug!(time, queue = %composite, job = %real, "auto-revocation upon start");
            self.composite_withdraw(time, composite, real, NotificationKind::AutoRevocation)?;
            return Ok(false);
        }
        Ok(true)
    }

    fn inject_first(&mut self, time: Time, composite: QueueId, real: JobId) -> Result<(), SimError> {
        let state = self.composite_mut(composite)?;
        let delegate = state
            .delegate_of(real)
            .ok_or_else(|| SimError::state(format!("{} has no delegate at {}", real, composite)))?;
        let first = state.selector.select_first(time, real);
        self.route(time, composite, real, delegate, first)
    }

    /// Send the delegate to `next`, or let the real job depart
    fn route(
        &mut self,
        time: Time,
        composite: QueueId,
        real: JobId,
        delegate: JobId,
        next: Option<QueueId>,
    ) -> Result<(), SimError> {
        match next {
            Some(sub) if self.composite(composite)?.contains_sub(sub) => {
                debug!(time, queue = %composite, job = %real, sub_queue = %sub, "routing delegate");
                self.arrive_at(time, sub, delegate).map_err(internal)
            }
            Some(sub) => Err(SimError::state(format!(
                "selector of {} chose {} outside the network",
                composite, sub
            ))),
            None => self.leave_network(time, composite, real),
        }
    }

    /// The selector let the job go. A job that never started at the
    /// composite starts on its way out, or parks until credits return.
    fn leave_network(&mut self, time: Time, composite: QueueId, real: JobId) -> Result<(), SimError> {
        if self.queues[composite.0].state.phase(real) == Some(JobPhase::Waiting) {
            if self.queues[composite.0].state.credits.is_zero() {
                debug!(time, queue = %composite, job = %real, "parked on the way out");
                return Ok(());
            }
            let started = self.composite_start(time, composite, real)?;
            self.sync_sub_credits(time, composite)?;
            if !started {
                return Ok(());
            }
        }
        self.composite_depart(time, composite, real)
    }

    /// Start waiting jobs whose delegate is in no sub-queue, while credits
    /// last. Under `Local` these go on into the network; otherwise they
    /// already left it and depart.
    fn release_parked(&mut self, time: Time, composite: QueueId) -> Result<(), SimError> {
        let model = self.composite(composite)?.model;
        loop {
            let state = &self.queues[composite.0].state;
            if state.credits.is_zero() {
                return Ok(());
            }
            let network = self.composite(composite)?;
            let parked = state.waiting_jobs().find(|real| {
                network
                    .delegate_of(*real)
                    .and_then(|delegate| self.delegates.get(&delegate))
                    .is_some_and(|delegate| delegate.current_queue().is_none())
            });
            let Some(real) = parked else {
                return Ok(());
            };
            if !self.composite_start(time, composite, real)? {
                continue;
            }
            match model {
                StartModel::Local => self.inject_first(time, composite, real)?,
                StartModel::Encapsulator | StartModel::CompressedTandem2 => {
                    self.composite_depart(time, composite, real)?
                }
            }
        }
    }

    fn composite_depart(&mut self, time: Time, composite: QueueId, real: JobId) -> Result<(), SimError> {
        if self.queues[composite.0].state.phase(real) != Some(JobPhase::InService) {
            return Err(SimError::state(format!(
                "{} cannot depart {}: it never started",
                real, composite
            )));
        }
        self.exit(time, composite, real, NotificationKind::Departure)?;
        self.discard_delegate(composite, real)
    }

    /// Take the real job out through `kind` (revocation or
    /// auto-revocation), revoking its delegate wherever it is
    pub(crate) fn composite_withdraw(
        &mut self,
        time: Time,
        composite: QueueId,
        real: JobId,
        kind: NotificationKind,
    ) -> Result<(), SimError> {
        let delegate = self
            .composite(composite)?
            .delegate_of(real)
            .ok_or_else(|| SimError::state(format!("{} has no delegate at {}", real, composite)))?;
        if let Some(sub) = self.job_ref(delegate)?.current_queue() {
            if !self.revoke_at(time, sub, delegate, true).map_err(internal)? {
                return Err(SimError::state(format!("{} refused to release {}", sub, delegate)));
            }
        }
        self.exit(time, composite, real, kind)?;
        self.discard_delegate(composite, real)
    }

    fn discard_delegate(&mut self, composite: QueueId, real: JobId) -> Result<(), SimError> {
        if let Some(delegate) = self.composite_mut(composite)?.unlink(real) {
            self.delegates.remove(&delegate);
        }
        Ok(())
    }

    /// React to new server-access credits at the composite
    pub(crate) fn composite_credits_changed(&mut self, time: Time, composite: QueueId) -> Result<(), SimError> {
        self.release_parked(time, composite)?;
        self.sync_sub_credits(time, composite)
    }

    /// Mirror the composite's credits into the sub-queue that gates starts
    fn sync_sub_credits(&mut self, time: Time, composite: QueueId) -> Result<(), SimError> {
        match self.composite(composite)?.model {
            StartModel::Local => Ok(()),
            StartModel::Encapsulator => {
                let sub = self.composite(composite)?.sub_queues[0];
                let credits = self.queues[composite.0].state.credits;
                if self.queues[sub.0].state.credits == credits {
                    return Ok(());
                }
                self.server_access_credits_at(time, sub, credits)
                    .map_err(internal)
            }
            StartModel::CompressedTandem2 => self.sync_wait_credits(time, composite),
        }
    }

    // ========================================================================
    // Relaying
    // ========================================================================

    /// Translate one sub-queue batch into composite transitions
    pub(crate) fn relay_to_composite(
        &mut self,
        composite: QueueId,
        sub: QueueId,
        batch: &[Notification],
    ) -> Result<(), SimError> {
        let Some(first) = batch.first() else {
            return Ok(());
        };
        let time = first.time;
        self.update(time, composite).map_err(internal)?;
        let (model, wait) = {
            let state = self.composite(composite)?;
            (state.model, state.wait_serve().map(|(wait, _)| wait))
        };

        for notification in batch {
            let Some(delegate) = notification.job else {
                continue;
            };
            let Some(real) = self.composite(composite)?.real_of(delegate) else {
                continue;
            };
            let at = notification.time;
            match notification.kind {
                NotificationKind::Start => {
                    let starts_composite = match model {
                        StartModel::Local => false,
                        StartModel::Encapsulator => true,
                        StartModel::CompressedTandem2 => wait == Some(sub),
                    };
                    // a revisit of the first sub-queue does not start the job again
                    let waiting = self.queues[composite.0].state.phase(real) == Some(JobPhase::Waiting);
                    if starts_composite && waiting {
                        self.composite_start(at, composite, real)?;
                    }
                }
                NotificationKind::Drop => {
                    self.guard.record(at)?;
                    debug!(time = at, queue = %composite, job = %real, sub_queue = %sub, "dropped inside network");
                    self.exit(at, composite, real, NotificationKind::Drop)?;
                    self.discard_delegate(composite, real)?;
                }
                NotificationKind::Departure | NotificationKind::AutoRevocation => {
                    self.guard.record(at)?;
                    let next = self
                        .composite_mut(composite)?
                        .selector
                        .select_next(at, real, sub);
                    self.route(at, composite, real, delegate, next)?;
                }
                _ => {}
            }
        }

        self.sync_wait_credits(time, composite)?;
        self.refresh_flags(time, composite);
        Ok(())
    }

    /// Compressed tandem: the wait queue may start one job exactly when the
    /// composite has credits and the serve queue is start-armed
    fn wait_credits_target(&self, composite: QueueId) -> Option<(QueueId, Credits)> {
        let state = self.composite(composite).ok()?;
        let (wait, serve) = state.wait_serve()?;
        let open = !self.queues[composite.0].state.credits.is_zero()
            && self.queues[serve.0].state.start_armed;
        Some((wait, Credits::Finite(open as u64)))
    }

    fn sync_wait_credits(&mut self, time: Time, composite: QueueId) -> Result<(), SimError> {
        if let Some((wait, target)) = self.wait_credits_target(composite) {
            if self.queues[wait.0].state.credits != target {
                self.server_access_credits_at(time, wait, target)
                    .map_err(internal)?;
            }
        }
        Ok(())
    }

    /// Construction and reset: set the wait queue's credits without
    /// reporting
    pub(crate) fn sync_wait_credits_silently(&mut self, composite: QueueId) {
        if let Some((wait, target)) = self.wait_credits_target(composite) {
            self.queues[wait.0].state.credits = target;
            self.set_flags_silently(wait);
        }
    }
}
