//! Deterministic random number generation
//!
//! All randomness in the engine (random routing, random-order service) goes
//! through an explicitly seeded [`RngManager`] owned by the component that
//! needs it. Nothing is process-global, so a reset replays the same choices.

mod xorshift;

pub use xorshift::RngManager;
