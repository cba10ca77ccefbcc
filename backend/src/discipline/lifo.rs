//! Last-come first-served, non-preemptive

use super::{server_free, Discipline};
use crate::models::job::JobId;
use crate::models::queue::QueueState;

/// Starts the most recently arrived waiting job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lifo {
    servers: Option<usize>,
}

impl Lifo {
    pub fn new(servers: Option<usize>) -> Self {
        Self { servers }
    }

    pub fn single_server() -> Self {
        Self::new(Some(1))
    }
}

impl Default for Lifo {
    fn default() -> Self {
        Self::single_server()
    }
}

impl Discipline for Lifo {
    fn name(&self) -> &'static str {
        "lifo"
    }

    fn has_server_available(&self, state: &QueueState) -> bool {
        server_free(self.servers, state)
    }

    fn select_start(&mut self, state: &QueueState) -> Option<JobId> {
        state.waiting_jobs().next_back()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifo_selects_newest_waiting() {
        let mut lifo = Lifo::single_server();
        let mut state = QueueState::new(0.0);
        state.insert_waiting(JobId::real(0, 0), 1.0);
        state.insert_waiting(JobId::real(0, 1), 2.0);
        state.insert_waiting(JobId::real(0, 2), 3.0);
        state.mark_in_service(JobId::real(0, 2), 3.0).unwrap();
        assert_eq!(lifo.select_start(&state), Some(JobId::real(0, 1)));
    }
}
