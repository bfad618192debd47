//! Application core: pure domain logic, zero I/O.
//!
//! Holds the control loop state machine and the types it trades in. All
//! interaction with lines, storage, time and logging happens through the
//! **port traits** in [`ports`], keeping this layer testable without a
//! GPIO chip.

pub mod commands;
pub mod events;
pub mod ports;
pub mod service;
pub mod state;
