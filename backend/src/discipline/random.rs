//! Random-order service
//!
//! Picks uniformly among waiting jobs. The generator is rewound on reset,
//! so a replay picks the same jobs in the same order.

use super::{server_free, Discipline};
use crate::models::job::JobId;
use crate::models::queue::QueueState;
use crate::rng::RngManager;

#[derive(Debug, Clone)]
pub struct RandomOrder {
    servers: Option<usize>,
    rng: RngManager,
}

impl RandomOrder {
    pub fn new(servers: Option<usize>, seed: u64) -> Self {
        Self {
            servers,
            rng: RngManager::new(seed),
        }
    }
}

impl Discipline for RandomOrder {
    fn name(&self) -> &'static str {
        "random"
    }

    fn has_server_available(&self, state: &QueueState) -> bool {
        server_free(self.servers, state)
    }

    fn select_start(&mut self, state: &QueueState) -> Option<JobId> {
        let waiting = state.number_of_waiting_jobs();
        if waiting == 0 {
            return None;
        }
        let pick = self.rng.index(waiting);
        state.waiting_jobs().nth(pick)
    }

    fn reset(&mut self) {
        self.rng.reseed();
    }
}
