//! Engine primitives: simulated time, the event list, and errors

pub mod error;
pub mod event_list;
pub mod time;
