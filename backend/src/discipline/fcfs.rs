//! First-come first-served
//!
//! Starts waiting jobs in arrival order on `c` identical servers. An optional
//! buffer limits how many jobs may wait; an arrival that would exceed it is
//! dropped.

use super::{server_free, Discipline};
use crate::models::queue::QueueState;

/// FCFS with `servers` servers (`None` = infinitely many) and an optional
/// waiting-room limit
///
/// # Example
///
/// ```
/// use queueing_simulator_core_rs::discipline::{Discipline, Fcfs};
///
/// let fcfs = Fcfs::new(Some(2), Some(10));
/// assert_eq!(fcfs.buffer_size(), Some(10));
/// assert_eq!(Fcfs::single_server().servers(), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fcfs {
    servers: Option<usize>,
    buffer: Option<usize>,
}

impl Fcfs {
    pub fn new(servers: Option<usize>, buffer: Option<usize>) -> Self {
        Self { servers, buffer }
    }

    /// One server, unlimited buffer
    pub fn single_server() -> Self {
        Self::new(Some(1), None)
    }

    pub fn servers(&self) -> Option<usize> {
        self.servers
    }
}

impl Default for Fcfs {
    fn default() -> Self {
        Self::single_server()
    }
}

impl Discipline for Fcfs {
    fn name(&self) -> &'static str {
        "fcfs"
    }

    fn has_server_available(&self, state: &QueueState) -> bool {
        server_free(self.servers, state)
    }

    fn buffer_size(&self) -> Option<usize> {
        self.buffer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::job::JobId;

    #[test]
    fn test_fcfs_selects_oldest_waiting() {
        let mut fcfs = Fcfs::single_server();
        let mut state = QueueState::new(0.0);
        state.insert_waiting(JobId::real(0, 3), 1.0);
        state.insert_waiting(JobId::real(0, 1), 2.0);
        assert_eq!(fcfs.select_start(&state), Some(JobId::real(0, 3)));
    }

    #[test]
    fn test_fcfs_empty_queue() {
        let mut fcfs = Fcfs::single_server();
        let state = QueueState::new(0.0);
        assert_eq!(fcfs.select_start(&state), None);
        assert!(fcfs.has_server_available(&state));
    }
}
