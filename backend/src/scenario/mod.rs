//! Declarative scenarios
//!
//! A scenario is a JSON document describing a network (queues and
//! composites, referring to each other by name), the jobs that travel
//! through it, and the time-stamped external stimuli that drive it.
//! [`Scenario::from_json`] turns it into a ready-to-run [`Simulation`].
//!
//! # Example
//!
//! ```rust
//! use queueing_simulator_core_rs::scenario::Scenario;
//!
//! let json = r#"{
//!     "queues": [
//!         { "name": "desk", "type": "fcfs", "servers": 1 }
//!     ],
//!     "jobs": [
//!         { "name": "a", "service_time": 2.0 },
//!         { "name": "b", "service_time": 1.0 }
//!     ],
//!     "stimuli": [
//!         { "at": 0.0, "event": { "type": "arrival", "queue": "desk", "job": "a" } },
//!         { "at": 1.0, "event": { "type": "arrival", "queue": "desk", "job": "b" } }
//!     ]
//! }"#;
//!
//! let mut scenario = Scenario::from_json(json).unwrap();
//! scenario.simulation_mut().run().unwrap();
//! assert_eq!(scenario.simulation().now(), 3.0);
//! ```
//!
//! [`Simulation`]: crate::orchestrator::Simulation

mod loader;
mod types;

pub use loader::Scenario;
pub use types::{JobConfig, QueueConfig, QueueKindConfig, ScenarioConfig, StimulusConfig, StimulusEvent};
