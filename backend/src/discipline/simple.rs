//! Degenerate disciplines used as building blocks and in tests

use super::{server_free, Discipline};
use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::queue::QueueState;

/// Never serves: jobs wait until revoked
#[derive(Debug, Clone, Default)]
pub struct Sink;

impl Discipline for Sink {
    fn name(&self) -> &'static str {
        "sink"
    }

    fn has_server_available(&self, _state: &QueueState) -> bool {
        false
    }
}

/// Drops every arrival
#[derive(Debug, Clone, Default)]
pub struct DropAll;

impl Discipline for DropAll {
    fn name(&self) -> &'static str {
        "drop"
    }

    fn has_server_available(&self, _state: &QueueState) -> bool {
        false
    }

    fn buffer_size(&self) -> Option<usize> {
        Some(0)
    }
}

/// Every job departs at its arrival instant
#[derive(Debug, Clone, Default)]
pub struct Zero;

impl Discipline for Zero {
    fn name(&self) -> &'static str {
        "zero"
    }

    fn has_server_available(&self, _state: &QueueState) -> bool {
        true
    }

    fn service_time_for_job(&self, _job: JobId, _requested: Time) -> Time {
        0.0
    }
}

/// Infinitely many servers: every job starts on arrival
#[derive(Debug, Clone, Default)]
pub struct InfiniteServer;

impl Discipline for InfiniteServer {
    fn name(&self) -> &'static str {
        "infinite-server"
    }

    fn has_server_available(&self, state: &QueueState) -> bool {
        server_free(None, state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_ignores_request() {
        assert_eq!(Zero.service_time_for_job(JobId::real(0, 0), 7.0), 0.0);
        assert_eq!(
            InfiniteServer.service_time_for_job(JobId::real(0, 0), 7.0),
            7.0
        );
    }

    #[test]
    fn test_drop_all_has_no_room() {
        let state = QueueState::new(0.0);
        assert_eq!(DropAll.buffer_size(), Some(0));
        assert!(!DropAll.has_server_available(&state));
        assert!(!Sink.has_server_available(&state));
    }
}
