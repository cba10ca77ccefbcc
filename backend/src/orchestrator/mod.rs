//! Orchestrator - the simulation engine
//!
//! `engine.rs` owns the [`Simulation`] struct, the action/settle/flush cycle
//! and run control; `lifecycle.rs` the per-queue state machine and the
//! stimulus API; `composite.rs` the composite-queue machinery.

pub mod engine;
mod composite;
mod lifecycle;

// Re-export main types for convenience
pub use engine::{Action, Simulation, SimulationConfig};
