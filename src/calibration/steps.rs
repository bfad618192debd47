//! Calibration step handlers and table builder.
//!
//! Each step is two plain `fn` pointers: an entry action and an advance
//! condition. Entry actions only issue commands or stamp times; advance
//! conditions only look at observed state.
//!
//! ```text
//!  INITIAL_CLOSE ──[closing]──▶ AWAIT_INITIAL_CLOSE ──[stopped at 0]──▶ PAUSE_BEFORE_OPEN
//!        ▲                              │                                     │
//!        └────────[stopped elsewhere]───┘                               [settle elapsed]
//!                                                                             ▼
//!  PAUSE_BEFORE_CLOSE ◀──[stopped at 100]── AWAIT_OPEN_STOPPED ◀──[opening]── OPENING
//!        │
//!  [settle elapsed]
//!        ▼
//!     CLOSING ──[closing]──▶ AWAIT_CLOSE_STOPPED ──[stopped at 0]──▶ COMPLETE
//! ```
//!
//! A pass that ends anywhere but its own extreme is retried from the
//! preceding pause.

use log::{info, warn};

use super::context::CalibrationContext;
use super::{StepDescriptor, StepId};
use crate::app::state::{Command, Direction, POSITION_CLOSED, POSITION_OPEN, PositionState};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the step table. Indexed by `StepId as usize`.
pub fn build_step_table() -> [StepDescriptor; StepId::COUNT] {
    [
        StepDescriptor {
            id: StepId::InitialClose,
            name: "InitialClose",
            on_enter: Some(initial_close_enter),
            on_update: initial_close_update,
        },
        StepDescriptor {
            id: StepId::AwaitInitialClose,
            name: "AwaitInitialClose",
            on_enter: None,
            on_update: await_initial_close_update,
        },
        StepDescriptor {
            id: StepId::PauseBeforeOpen,
            name: "PauseBeforeOpen",
            on_enter: None,
            on_update: pause_before_open_update,
        },
        StepDescriptor {
            id: StepId::Opening,
            name: "Opening",
            on_enter: Some(opening_enter),
            on_update: opening_update,
        },
        StepDescriptor {
            id: StepId::AwaitOpenStopped,
            name: "AwaitOpenStopped",
            on_enter: None,
            on_update: await_open_stopped_update,
        },
        StepDescriptor {
            id: StepId::PauseBeforeClose,
            name: "PauseBeforeClose",
            on_enter: None,
            on_update: pause_before_close_update,
        },
        StepDescriptor {
            id: StepId::Closing,
            name: "Closing",
            on_enter: Some(closing_enter),
            on_update: closing_update,
        },
        StepDescriptor {
            id: StepId::AwaitCloseStopped,
            name: "AwaitCloseStopped",
            on_enter: None,
            on_update: await_close_stopped_update,
        },
        StepDescriptor {
            id: StepId::Complete,
            name: "Complete",
            on_enter: Some(complete_enter),
            on_update: complete_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  Initial close: establish a known starting point
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn initial_close_enter(ctx: &mut CalibrationContext) {
    ctx.request = Some(Command::to_limiter(Direction::Close));
    info!("CALIBRATE: driving to the close limiter");
}

pub(crate) fn initial_close_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    (ctx.position_state == PositionState::Closing).then_some(StepId::AwaitInitialClose)
}

pub(crate) fn await_initial_close_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    if ctx.position_state != PositionState::Stopped {
        return None;
    }
    if ctx.position == POSITION_CLOSED {
        Some(StepId::PauseBeforeOpen)
    } else {
        warn!(
            "CALIBRATE: initial close stopped at {:.1}%, retrying",
            ctx.position
        );
        Some(StepId::InitialClose)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Open pass
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn pause_before_open_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    (ctx.ms_in_step() >= ctx.settle_ms).then_some(StepId::Opening)
}

pub(crate) fn opening_enter(ctx: &mut CalibrationContext) {
    ctx.request = Some(Command::to_limiter(Direction::Open));
    ctx.pass_started_ms = ctx.now_ms;
    info!("CALIBRATE: timing open pass");
}

pub(crate) fn opening_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    (ctx.position_state == PositionState::Opening).then_some(StepId::AwaitOpenStopped)
}

pub(crate) fn await_open_stopped_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    if ctx.position_state != PositionState::Stopped {
        return None;
    }
    if ctx.position == POSITION_OPEN {
        let travel = ctx.pass_duration_ms();
        ctx.open_travel_ms = Some(travel);
        info!("CALIBRATE: open travel {}ms", travel);
        Some(StepId::PauseBeforeClose)
    } else {
        warn!(
            "CALIBRATE: open pass stopped at {:.1}%, repeating it",
            ctx.position
        );
        Some(StepId::PauseBeforeOpen)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Close pass
// ═══════════════════════════════════════════════════════════════════════════

pub(crate) fn pause_before_close_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    (ctx.ms_in_step() >= ctx.settle_ms).then_some(StepId::Closing)
}

pub(crate) fn closing_enter(ctx: &mut CalibrationContext) {
    ctx.request = Some(Command::to_limiter(Direction::Close));
    ctx.pass_started_ms = ctx.now_ms;
    info!("CALIBRATE: timing close pass");
}

pub(crate) fn closing_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    (ctx.position_state == PositionState::Closing).then_some(StepId::AwaitCloseStopped)
}

pub(crate) fn await_close_stopped_update(ctx: &mut CalibrationContext) -> Option<StepId> {
    if ctx.position_state != PositionState::Stopped {
        return None;
    }
    if ctx.position == POSITION_CLOSED {
        let travel = ctx.pass_duration_ms();
        ctx.close_travel_ms = Some(travel);
        info!("CALIBRATE: close travel {}ms", travel);
        Some(StepId::Complete)
    } else {
        warn!(
            "CALIBRATE: close pass stopped at {:.1}%, repeating it",
            ctx.position
        );
        Some(StepId::PauseBeforeClose)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  Complete (terminal)
// ═══════════════════════════════════════════════════════════════════════════

fn complete_enter(ctx: &mut CalibrationContext) {
    ctx.complete = ctx.open_travel_ms.is_some() && ctx.close_travel_ms.is_some();
}

fn complete_update(_ctx: &mut CalibrationContext) -> Option<StepId> {
    None
}
