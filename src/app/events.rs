//! Outbound audit events.
//!
//! [`CoverService`](super::service::CoverService) emits these through the
//! [`EventSink`](super::ports::EventSink) port. They are purely
//! observational and never feed back into control decisions.

use crate::calibration::StepId;

use super::state::{Direction, PositionState};

/// Why the motor stopped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopReason {
    /// A `stop()` command.
    Requested,
    /// The estimate reached a position target.
    TargetReached,
    /// The limiter for the commanded direction engaged.
    Limiter(Direction),
    /// A limiter engaged outside the grace window and overrode the intent.
    LimiterOverride(Direction),
    /// A command in the other direction arrived while moving.
    Reversal,
    /// The controller is shutting down.
    Shutdown,
}

/// Structured events emitted by the control loop.
#[derive(Debug, Clone, PartialEq)]
pub enum CoverEvent {
    /// The motor changed what it is doing.
    StateChanged {
        from: PositionState,
        to: PositionState,
        position: f64,
    },

    /// The motor stopped, and why.
    Stopped { reason: StopReason, position: f64 },

    /// Calibration sequence started.
    CalibrationStarted,

    /// Calibration sequencer moved between steps.
    CalibrationStep { from: StepId, to: StepId },

    /// Calibration finished with the measured travel times.
    CalibrationFinished { open_travel_ms: u64, close_travel_ms: u64 },

    /// The calibration record could not be written.
    PersistFailed(String),
}
