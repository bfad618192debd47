//! Limiter guard.
//!
//! The guard runs **every tick after the intent's own stop condition** and
//! decides whether a limiter reading is trusted and whether it overrides
//! whatever the intent wanted.
//!
//! ## Debounce lifecycle
//!
//! 1. Any state change (start, stop, reversal) re-arms the grace window.
//! 2. While the window is open, limiter readings are ignored. The switch
//!    may still be bouncing, or the limiter of the extreme just left may
//!    not have cleared yet.
//! 3. Once the window has passed, an engaged limiter is ground truth: it
//!    stops the motor whichever way it is running and snaps the position
//!    estimate to the exact extreme.
//!
//! Without hardware there are no limiters and the guard never fires.

use embedded_hal::digital::PinState;
use log::warn;

use crate::app::state::Direction;
use crate::pins::Line;

/// A limiter reading that overrides the current estimate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimiterHit {
    /// The extreme the engaged limiter marks.
    pub limiter: Direction,
    /// Whether the motor is running and must be stopped.
    pub halts_motion: bool,
}

/// Limiter debounce and override.
pub struct LimiterGuard {
    grace_ms: u64,
    /// Start of the current grace window. `None` until the first state
    /// change, so limiters are trusted from boot.
    armed_at_ms: Option<u64>,
    enabled: bool,
    /// Last limiter seen engaged, so the warning logs once per engagement.
    latched: Option<Direction>,
}

impl LimiterGuard {
    pub fn new(grace_ms: u64, hardware_present: bool) -> Self {
        Self {
            grace_ms,
            armed_at_ms: None,
            enabled: hardware_present,
            latched: None,
        }
    }

    /// Re-arm the grace window. Call on every `positionState` change.
    pub fn on_state_change(&mut self, now_ms: u64) {
        self.armed_at_ms = Some(now_ms);
    }

    /// True while limiter readings are ignored.
    pub fn in_grace(&self, now_ms: u64) -> bool {
        match self.armed_at_ms {
            Some(t) => now_ms.saturating_sub(t) < self.grace_ms,
            None => false,
        }
    }

    /// Whether a limiter reading `level` counts as engaged right now.
    pub fn engaged(&self, level: PinState, now_ms: u64) -> bool {
        self.enabled && level == PinState::High && !self.in_grace(now_ms)
    }

    /// Evaluate both limiters. Returns the override to apply, if any.
    ///
    /// `moving` is the current direction of travel. The close limiter is
    /// checked first; both engaged at once is a wiring fault and the
    /// closed reading wins.
    pub fn evaluate(
        &mut self,
        close_level: PinState,
        open_level: PinState,
        moving: Option<Direction>,
        now_ms: u64,
    ) -> Option<LimiterHit> {
        if !self.enabled || self.in_grace(now_ms) {
            return None;
        }
        let hit = if close_level == PinState::High {
            Some(Direction::Close)
        } else if open_level == PinState::High {
            Some(Direction::Open)
        } else {
            None
        };

        if hit != self.latched {
            if let (Some(limiter), Some(dir)) = (hit, moving) {
                warn!(
                    "LIMITER: {:?} limiter engaged while moving {:?}, forcing stop",
                    limiter, dir
                );
            }
            self.latched = hit;
        }

        hit.map(|limiter| LimiterHit {
            limiter,
            halts_motion: moving.is_some(),
        })
    }

    /// The line that reports `direction`'s limiter.
    pub fn line_for(direction: Direction) -> Line {
        match direction {
            Direction::Open => Line::OpenLimiter,
            Direction::Close => Line::CloseLimiter,
        }
    }
}
