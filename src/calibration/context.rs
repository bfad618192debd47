//! Context threaded through every calibration step handler.
//!
//! The control loop refreshes the observed fields before each sequencer
//! tick and drains [`request`](CalibrationContext::request) afterwards.
//! Handlers never touch hardware or the cover state directly.

use crate::app::state::{Command, PositionState};

pub struct CalibrationContext {
    // -- Timing --
    /// Tick time of the current sequencer tick.
    pub now_ms: u64,
    /// When the current step was entered.
    pub entered_ms: u64,
    /// Settle pause between passes.
    pub settle_ms: u64,

    // -- Observed cover state (written by the control loop) --
    pub position_state: PositionState,
    pub position: f64,
    /// Time of the most recent motor state change.
    pub last_change_ms: u64,

    // -- Outputs (read by the control loop) --
    /// Command the sequencer wants issued. Taken by the control loop.
    pub request: Option<Command>,
    /// Start of the pass currently being timed.
    pub pass_started_ms: u64,
    pub open_travel_ms: Option<u64>,
    pub close_travel_ms: Option<u64>,
    /// Set once the sequence has both measurements.
    pub complete: bool,
}

impl CalibrationContext {
    pub fn new(now_ms: u64, settle_ms: u64) -> Self {
        Self {
            now_ms,
            entered_ms: now_ms,
            settle_ms,
            position_state: PositionState::Stopped,
            position: 0.0,
            last_change_ms: now_ms,
            request: None,
            pass_started_ms: now_ms,
            open_travel_ms: None,
            close_travel_ms: None,
            complete: false,
        }
    }

    /// Milliseconds spent in the current step.
    pub fn ms_in_step(&self) -> u64 {
        self.now_ms.saturating_sub(self.entered_ms)
    }

    /// Duration of the pass that just ended. The motor stopped at
    /// `last_change_ms`, which may be a tick before `now_ms`.
    pub fn pass_duration_ms(&self) -> u64 {
        self.last_change_ms
            .saturating_sub(self.pass_started_ms)
            .max(1)
    }
}
