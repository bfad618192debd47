//! GPIO line assignments for the pool cover controller board.
//!
//! Single source of truth for the default wiring. Every default in
//! [`LineOffsets`](crate::config::LineOffsets) references this module
//! rather than hard-coding offsets. Offsets are BCM numbers on the
//! Raspberry Pi header, exposed as lines of `gpiochip0`.

/// GPIO character device holding all four lines.
pub const GPIO_CHIP: &str = "gpiochip0";

/// Consumer label attached to every requested line.
pub const CONSUMER: &str = "poolcover";

// ---------------------------------------------------------------------------
// Limit switches (inputs, HIGH = engaged)
// ---------------------------------------------------------------------------

/// Limit switch at the fully closed extreme.
pub const CLOSE_LIMITER_LINE: u32 = 17;
/// Limit switch at the fully open extreme.
pub const OPEN_LIMITER_LINE: u32 = 27;

// ---------------------------------------------------------------------------
// Motor relay outputs (HIGH = energised)
// ---------------------------------------------------------------------------

/// Drives the motor in the opening direction.
pub const MOTOR_OPEN_LINE: u32 = 5;
/// Drives the motor in the closing direction.
pub const MOTOR_CLOSE_LINE: u32 = 6;

/// The four lines the controller owns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Line {
    OpenLimiter,
    CloseLimiter,
    MotorOpen,
    MotorClose,
}

impl Line {
    pub const ALL: [Line; 4] = [
        Line::OpenLimiter,
        Line::CloseLimiter,
        Line::MotorOpen,
        Line::MotorClose,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Line::OpenLimiter => "open-limiter",
            Line::CloseLimiter => "close-limiter",
            Line::MotorOpen => "motor-open",
            Line::MotorClose => "motor-close",
        }
    }
}
