//! Building a simulation from a [`ScenarioConfig`]

use super::types::{QueueKindConfig, ScenarioConfig, StimulusEvent};
use crate::core::error::SimError;
use crate::discipline::{
    Discipline, DropAll, Fcfs, Gate, InfiniteServer, Lifo, RandomOrder, Sink, Zero,
};
use crate::models::job::{Job, JobId};
use crate::models::queue::QueueId;
use crate::network::{FeedbackMode, ParallelMode};
use crate::orchestrator::Simulation;
use crate::rng::RngManager;
use indexmap::IndexMap;
use tracing::info;

/// A built scenario: the simulation plus its name index
#[derive(Debug)]
pub struct Scenario {
    simulation: Simulation,
    queues: IndexMap<String, QueueId>,
    jobs: IndexMap<String, JobId>,
}

fn config_error(context: &str, err: SimError) -> SimError {
    match err {
        SimError::Config(_) => err,
        other => SimError::Config(format!("{}: {}", context, other)),
    }
}

impl Scenario {
    /// Parse and build a JSON scenario
    ///
    /// # Errors
    /// `Config` for malformed JSON or an inconsistent scenario
    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let config: ScenarioConfig =
            serde_json::from_str(json).map_err(|e| SimError::Config(e.to_string()))?;
        Self::build(&config)
    }

    /// Build queues, jobs and scheduled stimuli, in that order
    pub fn build(config: &ScenarioConfig) -> Result<Self, SimError> {
        let mut scenario = Scenario {
            simulation: Simulation::new(config.simulation.clone())?,
            queues: IndexMap::new(),
            jobs: IndexMap::new(),
        };

        for queue in &config.queues {
            if scenario.queues.contains_key(&queue.name) {
                return Err(SimError::Config(format!("duplicate queue name '{}'", queue.name)));
            }
            let id = scenario
                .add_queue(&queue.name, &queue.kind)
                .map_err(|e| config_error(&format!("queue '{}'", queue.name), e))?;
            scenario
                .simulation
                .set_auto_revocation(id, queue.auto_revocation)
                .map_err(|e| config_error(&format!("queue '{}'", queue.name), e))?;
            scenario.queues.insert(queue.name.clone(), id);
        }

        for job in &config.jobs {
            if scenario.jobs.contains_key(&job.name) {
                return Err(SimError::Config(format!("duplicate job name '{}'", job.name)));
            }
            let mut built = Job::new(job.name.clone()).with_service_time(job.service_time);
            for (queue, time) in &job.per_queue {
                built = built.with_queue_service_time(scenario.queue_id(queue)?, *time);
            }
            let id = scenario
                .simulation
                .add_job(built)
                .map_err(|e| config_error(&format!("job '{}'", job.name), e))?;
            scenario.jobs.insert(job.name.clone(), id);
        }

        for stimulus in &config.stimuli {
            scenario
                .schedule(stimulus.at, &stimulus.event)
                .map_err(|e| config_error(&format!("stimulus at {}", stimulus.at), e))?;
        }

        info!(
            queues = scenario.queues.len(),
            jobs = scenario.jobs.len(),
            stimuli = config.stimuli.len(),
            "scenario built"
        );
        Ok(scenario)
    }

    fn queue_id(&self, name: &str) -> Result<QueueId, SimError> {
        self.queue(name)
            .ok_or_else(|| SimError::Config(format!("unknown queue '{}'", name)))
    }

    fn job_id(&self, name: &str) -> Result<JobId, SimError> {
        self.job(name)
            .ok_or_else(|| SimError::Config(format!("unknown job '{}'", name)))
    }

    fn add_queue(&mut self, name: &str, kind: &QueueKindConfig) -> Result<QueueId, SimError> {
        let subs = kind
            .sub_queue_names()
            .into_iter()
            .map(|sub| self.queue_id(sub))
            .collect::<Result<Vec<_>, _>>()?;

        let discipline: Box<dyn Discipline> = match kind {
            QueueKindConfig::Fcfs { servers, buffer } => Box::new(Fcfs::new(*servers, *buffer)),
            QueueKindConfig::Lifo { servers } => Box::new(Lifo::new(*servers)),
            QueueKindConfig::RandomOrder { servers, seed } => Box::new(RandomOrder::new(*servers, *seed)),
            QueueKindConfig::Sink => Box::new(Sink),
            QueueKindConfig::DropAll => Box::new(DropAll),
            QueueKindConfig::Zero => Box::new(Zero),
            QueueKindConfig::InfiniteServer => Box::new(InfiniteServer),
            QueueKindConfig::Gate => Box::new(Gate::new()),

            QueueKindConfig::Tandem { .. } => return self.simulation.add_tandem(name, subs),
            QueueKindConfig::Parallel { seed, .. } => {
                let mode = match seed {
                    Some(seed) => ParallelMode::Random(RngManager::new(*seed)),
                    None => ParallelMode::RoundRobin,
                };
                return self.simulation.add_parallel(name, subs, mode);
            }
            QueueKindConfig::Feedback {
                visits,
                probability,
                seed,
                ..
            } => {
                let mode = match (visits, probability) {
                    (Some(n), None) => FeedbackMode::Visits(*n),
                    (None, Some(p)) if (0.0..=1.0).contains(p) => FeedbackMode::Probability {
                        p: *p,
                        rng: RngManager::new(*seed),
                    },
                    _ => {
                        return Err(SimError::Config(
                            "feedback needs either 'visits' or a 'probability' in [0, 1]".to_string(),
                        ))
                    }
                };
                return self.simulation.add_feedback(name, subs[0], mode);
            }
            QueueKindConfig::Encapsulator { .. } => {
                return self.simulation.add_encapsulator(name, subs[0]);
            }
            QueueKindConfig::CompressedTandem { .. } => {
                return self.simulation.add_compressed_tandem(name, subs[0], subs[1]);
            }
        };
        Ok(self.simulation.add_queue(name, discipline))
    }

    fn schedule(&mut self, at: f64, event: &StimulusEvent) -> Result<(), SimError> {
        match event {
            StimulusEvent::Arrival { queue, job } => {
                let (queue, job) = (self.queue_id(queue)?, self.job_id(job)?);
                self.simulation.schedule_arrival(at, queue, job)?;
            }
            StimulusEvent::Revocation {
                queue,
                job,
                interrupt_service,
            } => {
                let (queue, job) = (self.queue_id(queue)?, self.job_id(job)?);
                self.simulation
                    .schedule_revocation(at, queue, job, *interrupt_service)?;
            }
            StimulusEvent::AccessVacation { queue, on } => {
                let queue = self.queue_id(queue)?;
                self.simulation.schedule_access_vacation(at, queue, *on)?;
            }
            StimulusEvent::ServerAccessCredits { queue, credits } => {
                let queue = self.queue_id(queue)?;
                self.simulation
                    .schedule_server_access_credits(at, queue, *credits)?;
            }
            StimulusEvent::GatePassageCredits { queue, credits } => {
                let queue = self.queue_id(queue)?;
                self.simulation
                    .schedule_gate_passage_credits(at, queue, *credits)?;
            }
        }
        Ok(())
    }

    /// Queue by scenario name
    pub fn queue(&self, name: &str) -> Option<QueueId> {
        self.queues.get(name).copied()
    }

    /// Job by scenario name
    pub fn job(&self, name: &str) -> Option<JobId> {
        self.jobs.get(name).copied()
    }

    pub fn simulation(&self) -> &Simulation {
        &self.simulation
    }

    pub fn simulation_mut(&mut self) -> &mut Simulation {
        &mut self.simulation
    }

    pub fn into_simulation(self) -> Simulation {
        self.simulation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_reference_rejected() {
        let json = r#"{
            "queues": [
                { "name": "t", "type": "tandem", "sub_queues": ["a"] },
                { "name": "a", "type": "sink" }
            ]
        }"#;
        match Scenario::from_json(json) {
            Err(SimError::Config(msg)) => assert!(msg.contains("unknown queue 'a'"), "{}", msg),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{"queues": [{"name": "a", "type": "sink"}, {"name": "a", "type": "zero"}]}"#;
        assert!(matches!(Scenario::from_json(json), Err(SimError::Config(_))));

        let json = r#"{"queues": [{"name": "a", "type": "sink"}],
                       "jobs": [{"name": "j"}, {"name": "j"}]}"#;
        assert!(matches!(Scenario::from_json(json), Err(SimError::Config(_))));
    }

    #[test]
    fn test_malformed_json_is_config_error() {
        assert!(matches!(Scenario::from_json("{"), Err(SimError::Config(_))));
    }

    #[test]
    fn test_feedback_needs_exactly_one_mode() {
        let json = r#"{"queues": [
            {"name": "a", "type": "zero"},
            {"name": "f", "type": "feedback", "sub_queue": "a"}
        ]}"#;
        assert!(matches!(Scenario::from_json(json), Err(SimError::Config(_))));
    }

    #[test]
    fn test_engine_errors_become_config_errors() {
        let json = r#"{"queues": [
            {"name": "a", "type": "sink"},
            {"name": "t", "type": "tandem", "sub_queues": ["a", "a"]}
        ]}"#;
        match Scenario::from_json(json) {
            Err(SimError::Config(msg)) => assert!(msg.starts_with("queue 't'"), "{}", msg),
            other => panic!("expected config error, got {:?}", other.map(|_| ())),
        }
    }
}
