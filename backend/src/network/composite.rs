//! Delegate bookkeeping of one composite queue

use super::{DelegateJobFactory, QueueSelector, StartModel};
use crate::models::job::JobId;
use crate::models::queue::QueueId;
use indexmap::IndexMap;
use std::collections::HashMap;

/// Network definition plus the live real ↔ delegate mapping
#[derive(Debug)]
pub(crate) struct CompositeState {
    pub(crate) model: StartModel,
    pub(crate) sub_queues: Vec<QueueId>,
    pub(crate) selector: Box<dyn QueueSelector>,
    pub(crate) factory: Box<dyn DelegateJobFactory>,
    real_to_delegate: IndexMap<JobId, JobId>,
    delegate_to_real: HashMap<JobId, JobId>,
}

impl CompositeState {
    pub(crate) fn new(
        model: StartModel,
        sub_queues: Vec<QueueId>,
        selector: Box<dyn QueueSelector>,
        factory: Box<dyn DelegateJobFactory>,
    ) -> Self {
        Self {
            model,
            sub_queues,
            selector,
            factory,
            real_to_delegate: IndexMap::new(),
            delegate_to_real: HashMap::new(),
        }
    }

    pub(crate) fn link(&mut self, real: JobId, delegate: JobId) {
        self.real_to_delegate.insert(real, delegate);
        self.delegate_to_real.insert(delegate, real);
    }

    /// Forget a real job; returns its delegate
    pub(crate) fn unlink(&mut self, real: JobId) -> Option<JobId> {
        let delegate = self.real_to_delegate.shift_remove(&real)?;
        self.delegate_to_real.remove(&delegate);
        self.selector.forget(real);
        Some(delegate)
    }

    pub(crate) fn delegate_of(&self, real: JobId) -> Option<JobId> {
        self.real_to_delegate.get(&real).copied()
    }

    pub(crate) fn real_of(&self, delegate: JobId) -> Option<JobId> {
        self.delegate_to_real.get(&delegate).copied()
    }

    pub(crate) fn live_delegates(&self) -> usize {
        self.real_to_delegate.len()
    }

    pub(crate) fn contains_sub(&self, queue: QueueId) -> bool {
        self.sub_queues.contains(&queue)
    }

    /// Wait and serve queue of a compressed tandem
    pub(crate) fn wait_serve(&self) -> Option<(QueueId, QueueId)> {
        match (self.model, self.sub_queues.as_slice()) {
            (StartModel::CompressedTandem2, [wait, serve]) => Some((*wait, *serve)),
            _ => None,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.real_to_delegate.clear();
        self.delegate_to_real.clear();
        self.selector.reset();
    }
}
