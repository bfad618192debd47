//! Externally visible cover state and the intent types behind it.
//!
//! [`CoverState`] is the snapshot handed to every observer. It is always a
//! copy; nobody outside the control loop holds a reference into live
//! state. Its JSON shape is the wire contract of the long-poll endpoint:
//!
//! ```json
//! {"currentPosition":42.0,"targetPosition":100.0,"positionState":1,"calibration":"calibrated"}
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Fully closed.
pub const POSITION_CLOSED: f64 = 0.0;
/// Fully open.
pub const POSITION_OPEN: f64 = 100.0;

/// Clamp a position into `[0, 100]`. Every position write goes through here.
pub fn clamp_position(p: f64) -> f64 {
    p.clamp(POSITION_CLOSED, POSITION_OPEN)
}

// ---------------------------------------------------------------------------
// Motion
// ---------------------------------------------------------------------------

/// A direction of travel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Open,
    Close,
}

impl Direction {
    /// The extreme this direction travels towards.
    pub fn extreme(self) -> f64 {
        match self {
            Direction::Open => POSITION_OPEN,
            Direction::Close => POSITION_CLOSED,
        }
    }
}

/// What the motor is doing right now.
///
/// Serialised as the home-automation position-state number:
/// 0 = closing, 1 = opening, 2 = stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PositionState {
    Closing,
    Opening,
    #[default]
    Stopped,
}

impl PositionState {
    pub fn code(self) -> u8 {
        match self {
            PositionState::Closing => 0,
            PositionState::Opening => 1,
            PositionState::Stopped => 2,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(PositionState::Closing),
            1 => Some(PositionState::Opening),
            2 => Some(PositionState::Stopped),
            _ => None,
        }
    }

    /// Direction of travel, `None` when stopped.
    pub fn direction(self) -> Option<Direction> {
        match self {
            PositionState::Opening => Some(Direction::Open),
            PositionState::Closing => Some(Direction::Close),
            PositionState::Stopped => None,
        }
    }

    pub fn moving(direction: Direction) -> Self {
        match direction {
            Direction::Open => PositionState::Opening,
            Direction::Close => PositionState::Closing,
        }
    }
}

impl Serialize for PositionState {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for PositionState {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let code = i64::deserialize(deserializer)?;
        Self::from_code(code)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid position state {code}")))
    }
}

/// Calibration status as observers see it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CalibrationStatus {
    #[default]
    Uncalibrated,
    InProgress,
    Calibrated,
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// The externally visible snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverState {
    /// 0 = fully closed, 100 = fully open. Exact only at the limiters.
    pub current_position: f64,
    /// Where the pending command is headed; equals the current position
    /// when nothing is pending.
    pub target_position: f64,
    pub position_state: PositionState,
    pub calibration: CalibrationStatus,
}

impl Default for CoverState {
    fn default() -> Self {
        Self {
            current_position: POSITION_CLOSED,
            target_position: POSITION_CLOSED,
            position_state: PositionState::Stopped,
            calibration: CalibrationStatus::Uncalibrated,
        }
    }
}

// ---------------------------------------------------------------------------
// Intent
// ---------------------------------------------------------------------------

/// When an in-flight command is satisfied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StopCondition {
    /// Stop when the limiter for the direction of travel engages.
    Limiter,
    /// Stop once the estimate reaches or passes this position.
    Position(f64),
}

/// A pending or in-flight directional request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Command {
    pub direction: Direction,
    pub until: StopCondition,
}

impl Command {
    pub fn to_limiter(direction: Direction) -> Self {
        Self {
            direction,
            until: StopCondition::Limiter,
        }
    }

    /// Absolute target this command resolves to.
    pub fn target(&self) -> f64 {
        match self.until {
            StopCondition::Limiter => self.direction.extreme(),
            StopCondition::Position(p) => p,
        }
    }

    /// Whether `position` has reached or passed a position target in the
    /// direction of travel. Always false for limiter targets.
    pub fn position_reached(&self, position: f64) -> bool {
        match (self.until, self.direction) {
            (StopCondition::Limiter, _) => false,
            (StopCondition::Position(t), Direction::Open) => position >= t,
            (StopCondition::Position(t), Direction::Close) => position <= t,
        }
    }
}

// ---------------------------------------------------------------------------
// Raw hardware view
// ---------------------------------------------------------------------------

/// Raw line levels, as exposed to diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineLevels {
    pub motor_open: u8,
    pub motor_close: u8,
    pub open_limiter: u8,
    pub close_limiter: u8,
}

/// Hardware view returned by `hardware_state()`. Serialises to `{}` when
/// no hardware is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub struct HardwareState {
    #[serde(flatten)]
    levels: Option<LineLevels>,
}

impl HardwareState {
    pub fn absent() -> Self {
        Self { levels: None }
    }

    pub fn present(levels: LineLevels) -> Self {
        Self {
            levels: Some(levels),
        }
    }

    pub fn levels(&self) -> Option<LineLevels> {
        self.levels
    }
}
