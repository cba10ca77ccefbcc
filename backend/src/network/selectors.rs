//! Selectors for the standard networks

use super::QueueSelector;
use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::queue::QueueId;
use crate::rng::RngManager;
use std::collections::HashMap;

/// Visit every sub-queue once, in order
#[derive(Debug, Clone)]
pub struct TandemSelector {
    queues: Vec<QueueId>,
}

impl TandemSelector {
    pub fn new(queues: Vec<QueueId>) -> Self {
        Self { queues }
    }
}

impl QueueSelector for TandemSelector {
    fn select_first(&mut self, _time: Time, _job: JobId) -> Option<QueueId> {
        self.queues.first().copied()
    }

    fn select_next(&mut self, _time: Time, _job: JobId, previous: QueueId) -> Option<QueueId> {
        let at = self.queues.iter().position(|q| *q == previous)?;
        self.queues.get(at + 1).copied()
    }
}

/// How a parallel network picks its branch
#[derive(Debug, Clone)]
pub enum ParallelMode {
    /// Cycle through the branches in order
    RoundRobin,
    /// Uniform choice with a seeded generator
    Random(RngManager),
}

/// Visit exactly one of the sub-queues
#[derive(Debug, Clone)]
pub struct ParallelSelector {
    queues: Vec<QueueId>,
    mode: ParallelMode,
    next: usize,
}

impl ParallelSelector {
    pub fn new(queues: Vec<QueueId>, mode: ParallelMode) -> Self {
        Self {
            queues,
            mode,
            next: 0,
        }
    }
}

impl QueueSelector for ParallelSelector {
    fn select_first(&mut self, _time: Time, _job: JobId) -> Option<QueueId> {
        if self.queues.is_empty() {
            return None;
        }
        let pick = match &mut self.mode {
            ParallelMode::RoundRobin => {
                let pick = self.next % self.queues.len();
                self.next = pick + 1;
                pick
            }
            ParallelMode::Random(rng) => rng.index(self.queues.len()),
        };
        Some(self.queues[pick])
    }

    fn select_next(&mut self, _time: Time, _job: JobId, _previous: QueueId) -> Option<QueueId> {
        None
    }

    fn reset(&mut self) {
        self.next = 0;
        if let ParallelMode::Random(rng) = &mut self.mode {
            rng.reseed();
        }
    }
}

/// When a feedback network sends a job round again
#[derive(Debug, Clone)]
pub enum FeedbackMode {
    /// Exactly this many visits per job
    Visits(usize),
    /// After each visit, revisit with probability `p`
    Probability { p: f64, rng: RngManager },
}

/// Revisit a single sub-queue
#[derive(Debug, Clone)]
pub struct FeedbackSelector {
    queue: QueueId,
    mode: FeedbackMode,
    visits: HashMap<JobId, usize>,
}

impl FeedbackSelector {
    pub fn new(queue: QueueId, mode: FeedbackMode) -> Self {
        Self {
            queue,
            mode,
            visits: HashMap::new(),
        }
    }

    /// Visits completed or under way for `job`
    pub fn visits(&self, job: JobId) -> usize {
        self.visits.get(&job).copied().unwrap_or(0)
    }
}

impl QueueSelector for FeedbackSelector {
    fn select_first(&mut self, _time: Time, job: JobId) -> Option<QueueId> {
        if let FeedbackMode::Visits(0) = self.mode {
            return None;
        }
        self.visits.insert(job, 1);
        Some(self.queue)
    }

    fn select_next(&mut self, _time: Time, job: JobId, _previous: QueueId) -> Option<QueueId> {
        let again = match &mut self.mode {
            FeedbackMode::Visits(n) => self.visits.get(&job).copied().unwrap_or(0) < *n,
            FeedbackMode::Probability { p, rng } => rng.bernoulli(*p),
        };
        if again {
            *self.visits.entry(job).or_insert(0) += 1;
            Some(self.queue)
        } else {
            self.visits.remove(&job);
            None
        }
    }

    fn forget(&mut self, job: JobId) {
        self.visits.remove(&job);
    }

    fn reset(&mut self) {
        self.visits.clear();
        if let FeedbackMode::Probability { rng, .. } = &mut self.mode {
            rng.reseed();
        }
    }
}

/// Wait queue, then serve queue
#[derive(Debug, Clone)]
pub struct CompressedTandemSelector {
    wait: QueueId,
    serve: QueueId,
}

impl CompressedTandemSelector {
    pub fn new(wait: QueueId, serve: QueueId) -> Self {
        Self { wait, serve }
    }
}

impl QueueSelector for CompressedTandemSelector {
    fn select_first(&mut self, _time: Time, _job: JobId) -> Option<QueueId> {
        Some(self.wait)
    }

    fn select_next(&mut self, _time: Time, _job: JobId, previous: QueueId) -> Option<QueueId> {
        (previous == self.wait).then_some(self.serve)
    }
}
