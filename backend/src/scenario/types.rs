//! Scenario configuration types
//!
//! Everything here is plain serde data; validation against the network
//! (unknown names, arities) happens when the scenario is built.

use crate::models::queue::{AutoRevocationPolicy, Credits};
use crate::orchestrator::SimulationConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

fn single_server() -> Option<usize> {
    Some(1)
}

/// Complete scenario
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Queues in creation order; composites may only name earlier queues
    pub queues: Vec<QueueConfig>,

    #[serde(default)]
    pub jobs: Vec<JobConfig>,

    #[serde(default)]
    pub stimuli: Vec<StimulusConfig>,
}

/// One queue or composite
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueConfig {
    pub name: String,

    #[serde(flatten)]
    pub kind: QueueKindConfig,

    #[serde(default)]
    pub auto_revocation: AutoRevocationPolicy,
}

/// Discipline of an atomic queue, or network of a composite
///
/// `servers: null` means infinitely many servers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueKindConfig {
    Fcfs {
        #[serde(default = "single_server")]
        servers: Option<usize>,
        #[serde(default)]
        buffer: Option<usize>,
    },
    Lifo {
        #[serde(default = "single_server")]
        servers: Option<usize>,
    },
    RandomOrder {
        #[serde(default = "single_server")]
        servers: Option<usize>,
        seed: u64,
    },
    Sink,
    DropAll,
    Zero,
    InfiniteServer,
    Gate,

    /// Visit every sub-queue once, in order
    Tandem { sub_queues: Vec<String> },

    /// Visit one sub-queue: round robin, or random when seeded
    Parallel {
        sub_queues: Vec<String>,
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Revisit one sub-queue a fixed number of times, or with a probability
    Feedback {
        sub_queue: String,
        #[serde(default)]
        visits: Option<usize>,
        #[serde(default)]
        probability: Option<f64>,
        #[serde(default)]
        seed: u64,
    },

    Encapsulator { sub_queue: String },

    /// Ordering by `wait`, service by `serve`
    CompressedTandem { wait: String, serve: String },
}

impl QueueKindConfig {
    /// Names of queues this entry depends on
    pub fn sub_queue_names(&self) -> Vec<&str> {
        match self {
            QueueKindConfig::Tandem { sub_queues } | QueueKindConfig::Parallel { sub_queues, .. } => {
                sub_queues.iter().map(String::as_str).collect()
            }
            QueueKindConfig::Feedback { sub_queue, .. }
            | QueueKindConfig::Encapsulator { sub_queue } => vec![sub_queue.as_str()],
            QueueKindConfig::CompressedTandem { wait, serve } => vec![wait.as_str(), serve.as_str()],
            _ => Vec::new(),
        }
    }
}

/// One real job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,

    /// Requested service time at queues without an entry in `per_queue`
    #[serde(default)]
    pub service_time: f64,

    /// Requested service time by queue name
    #[serde(default)]
    pub per_queue: BTreeMap<String, f64>,
}

/// An external stimulus and its time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StimulusConfig {
    pub at: f64,
    pub event: StimulusEvent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StimulusEvent {
    Arrival {
        queue: String,
        job: String,
    },
    Revocation {
        queue: String,
        job: String,
        #[serde(default)]
        interrupt_service: bool,
    },
    AccessVacation {
        queue: String,
        on: bool,
    },
    ServerAccessCredits {
        queue: String,
        credits: Credits,
    },
    GatePassageCredits {
        queue: String,
        credits: Credits,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_queue_defaults() {
        let queue: QueueConfig = serde_json::from_str(r#"{"name": "q", "type": "fcfs"}"#).unwrap();
        assert_eq!(
            queue.kind,
            QueueKindConfig::Fcfs {
                servers: Some(1),
                buffer: None
            }
        );
        assert_eq!(queue.auto_revocation, AutoRevocationPolicy::None);
    }

    #[test]
    fn test_infinite_servers_and_auto_revocation() {
        let queue: QueueConfig = serde_json::from_str(
            r#"{"name": "q", "type": "lifo", "servers": null, "auto_revocation": "upon_start"}"#,
        )
        .unwrap();
        assert_eq!(queue.kind, QueueKindConfig::Lifo { servers: None });
        assert_eq!(queue.auto_revocation, AutoRevocationPolicy::UponStart);
    }

    #[test]
    fn test_stimulus_credits() {
        let stimulus: StimulusConfig = serde_json::from_str(
            r#"{"at": 2.5, "event": {"type": "server_access_credits", "queue": "q", "credits": {"finite": 0}}}"#,
        )
        .unwrap();
        assert_eq!(
            stimulus.event,
            StimulusEvent::ServerAccessCredits {
                queue: "q".to_string(),
                credits: Credits::Finite(0)
            }
        );
    }

    #[test]
    fn test_sub_queue_names() {
        let kind = QueueKindConfig::CompressedTandem {
            wait: "w".to_string(),
            serve: "s".to_string(),
        };
        assert_eq!(kind.sub_queue_names(), vec!["w", "s"]);
        assert!(QueueKindConfig::Sink.sub_queue_names().is_empty());
    }
}
