//! Gate
//!
//! Jobs pass in arrival order with zero service time, but only while the
//! gate has passage credits. Each passage consumes one credit; setting the
//! credits is an external stimulus
//! ([`Simulation::set_gate_passage_credits`](crate::orchestrator::Simulation::set_gate_passage_credits)).

use super::Discipline;
use crate::core::time::Time;
use crate::models::job::JobId;
use crate::models::queue::{Credits, QueueState};

/// Zero-service gate with passage credits (initially unlimited)
#[derive(Debug, Clone, Default)]
pub struct Gate {
    credits: Credits,
}

impl Gate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remaining passage credits
    pub fn passage_credits(&self) -> Credits {
        self.credits
    }

    pub(crate) fn set_passage_credits(&mut self, credits: Credits) {
        self.credits = credits;
    }
}

impl Discipline for Gate {
    fn name(&self) -> &'static str {
        "gate"
    }

    fn has_server_available(&self, _state: &QueueState) -> bool {
        !self.credits.is_zero()
    }

    fn insert_on_start(&mut self, _job: JobId, _time: Time) {
        self.credits = self.credits.consume();
    }

    fn service_time_for_job(&self, _job: JobId, _requested: Time) -> Time {
        0.0
    }

    fn reset(&mut self) {
        self.credits = Credits::Infinite;
    }

    fn as_gate(&self) -> Option<&Gate> {
        Some(self)
    }

    fn as_gate_mut(&mut self) -> Option<&mut Gate> {
        Some(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gate_passage_consumes_credit() {
        let mut gate = Gate::new();
        gate.set_passage_credits(Credits::Finite(1));
        let state = QueueState::new(0.0);
        assert!(gate.has_server_available(&state));
        gate.insert_on_start(JobId::real(0, 0), 0.0);
        assert!(!gate.has_server_available(&state));
        gate.reset();
        assert_eq!(gate.passage_credits(), Credits::Infinite);
    }
}
