//! Inbound commands to the control loop.
//!
//! These represent actions requested by the outside world (web API,
//! home-automation bridge) that
//! [`CoverService::handle_command`](super::service::CoverService::handle_command)
//! turns into intent.

use crate::error::InvalidArgument;

use super::state::PositionState;

/// Commands that external adapters can send into the control loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoverCommand {
    /// Run to the open limiter.
    Open,
    /// Run to the close limiter.
    Close,
    /// Stop on the next tick, regardless of dwell.
    Stop,
    /// Move to an absolute position (0–100).
    SetTarget(f64),
    /// Start the calibration sequence.
    Calibrate,
}

impl CoverCommand {
    /// Map a requested position-state code (0 = closing, 1 = opening,
    /// 2 = stopped) to the command that produces it.
    pub fn from_position_state(code: i64) -> Result<Self, InvalidArgument> {
        match PositionState::from_code(code) {
            Some(PositionState::Closing) => Ok(Self::Close),
            Some(PositionState::Opening) => Ok(Self::Open),
            Some(PositionState::Stopped) => Ok(Self::Stop),
            None => Err(InvalidArgument::UnknownPositionState(code)),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Stop => "stop",
            Self::SetTarget(_) => "set-target",
            Self::Calibrate => "calibrate",
        }
    }
}
