//! Cover motor driver (two direction lines into a relay pair).
//!
//! One output runs the motor towards open, the other towards closed.
//!
//! ## Safety contract
//!
//! Both outputs must never be high at once. Every direction change drives
//! the opposite line low before raising the new one. Whether the motor
//! should run at all is decided by the control loop; this driver is a
//! dumb actuator.

use embedded_hal::digital::PinState;

use crate::app::ports::LinePort;
use crate::app::state::Direction;
use crate::pins::Line;

pub struct MotorDriver {
    running: Option<Direction>,
}

impl MotorDriver {
    pub fn new() -> Self {
        Self { running: None }
    }

    /// Run towards `direction`.
    pub fn run(&mut self, lines: &mut dyn LinePort, direction: Direction) {
        let (on, off) = Self::lines_for(direction);
        lines.drive_level(off, PinState::Low);
        lines.drive_level(on, PinState::High);
        self.running = Some(direction);
    }

    /// Drive both outputs low.
    pub fn stop(&mut self, lines: &mut dyn LinePort) {
        lines.drive_level(Line::MotorOpen, PinState::Low);
        lines.drive_level(Line::MotorClose, PinState::Low);
        self.running = None;
    }

    /// Direction the outputs currently drive, `None` when both are low.
    pub fn direction(&self) -> Option<Direction> {
        self.running
    }

    fn lines_for(direction: Direction) -> (Line, Line) {
        match direction {
            Direction::Open => (Line::MotorOpen, Line::MotorClose),
            Direction::Close => (Line::MotorClose, Line::MotorOpen),
        }
    }
}

impl Default for MotorDriver {
    fn default() -> Self {
        Self::new()
    }
}
