//! Calibration sequencer: a table-driven nested state machine.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StepTable                                                   │
//! │  ┌────────────────────┬────────────────┬──────────────────┐  │
//! │  │ StepId             │ on_enter       │ on_update        │  │
//! │  ├────────────────────┼────────────────┼──────────────────┤  │
//! │  │ InitialClose       │ issue close    │ closing?         │  │
//! │  │ AwaitInitialClose  │ -              │ stopped at 0?    │  │
//! │  │ PauseBeforeOpen    │ -              │ settle elapsed?  │  │
//! │  │ Opening            │ issue open     │ opening?         │  │
//! │  │ AwaitOpenStopped   │ -              │ stopped at 100?  │  │
//! │  │ PauseBeforeClose   │ -              │ settle elapsed?  │  │
//! │  │ Closing            │ issue close    │ closing?         │  │
//! │  │ AwaitCloseStopped  │ -              │ stopped at 0?    │  │
//! │  │ Complete           │ mark complete  │ -                │  │
//! │  └────────────────────┴────────────────┴──────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The control loop ticks the sequencer at the top of its own tick. Each
//! tick the engine calls `on_update` for the current step; on
//! `Some(next)` it stamps the entry time and runs `on_enter` for the next
//! step. Travel times are measured between the limiter stops, never from
//! the position estimate being calibrated.

pub mod context;
pub mod record;
pub mod steps;

use context::CalibrationContext;
use log::info;

use crate::app::state::{Command, PositionState};

// ---------------------------------------------------------------------------
// Step identity
// ---------------------------------------------------------------------------

/// Every step of the calibration sequence, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum StepId {
    InitialClose = 0,
    AwaitInitialClose = 1,
    PauseBeforeOpen = 2,
    Opening = 3,
    AwaitOpenStopped = 4,
    PauseBeforeClose = 5,
    Closing = 6,
    AwaitCloseStopped = 7,
    Complete = 8,
}

impl StepId {
    /// Total number of steps. Sizes the table array.
    pub const COUNT: usize = 9;

    /// Convert a table index back to `StepId`. Out-of-range indices map to
    /// `Complete` in release builds.
    pub fn from_index(idx: usize) -> Self {
        match idx {
            0 => Self::InitialClose,
            1 => Self::AwaitInitialClose,
            2 => Self::PauseBeforeOpen,
            3 => Self::Opening,
            4 => Self::AwaitOpenStopped,
            5 => Self::PauseBeforeClose,
            6 => Self::Closing,
            7 => Self::AwaitCloseStopped,
            8 => Self::Complete,
            _ => {
                debug_assert!(false, "invalid step index: {idx}");
                Self::Complete
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Function-pointer type aliases
// ---------------------------------------------------------------------------

/// Entry action, run once when a step becomes current.
pub type StepActionFn = fn(&mut CalibrationContext);

/// Advance condition, run every tick. `Some(next)` triggers a transition.
pub type StepUpdateFn = fn(&mut CalibrationContext) -> Option<StepId>;

/// One row of the step table.
pub struct StepDescriptor {
    pub id: StepId,
    pub name: &'static str,
    pub on_enter: Option<StepActionFn>,
    pub on_update: StepUpdateFn,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The step engine.
pub struct Sequencer {
    table: [StepDescriptor; StepId::COUNT],
    current: usize,
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            table: steps::build_step_table(),
            current: StepId::InitialClose as usize,
        }
    }

    /// Run the entry action of the first step.
    pub fn start(&mut self, ctx: &mut CalibrationContext) {
        info!("Calibration starting in step: {}", self.table[self.current].name);
        ctx.entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }

    /// Advance by one tick. Returns the transition taken, if any.
    pub fn tick(&mut self, ctx: &mut CalibrationContext) -> Option<(StepId, StepId)> {
        let from = self.current_step();
        let next = (self.table[self.current].on_update)(ctx)?;
        self.transition(next, ctx);
        Some((from, next))
    }

    pub fn current_step(&self) -> StepId {
        StepId::from_index(self.current)
    }

    pub fn is_complete(&self) -> bool {
        self.current == StepId::Complete as usize
    }

    fn transition(&mut self, next: StepId, ctx: &mut CalibrationContext) {
        let next_idx = next as usize;
        info!(
            "Calibration step: {} -> {}",
            self.table[self.current].name, self.table[next_idx].name
        );
        self.current = next_idx;
        ctx.entered_ms = ctx.now_ms;
        if let Some(enter) = self.table[self.current].on_enter {
            enter(ctx);
        }
    }
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Run handle used by the control loop
// ---------------------------------------------------------------------------

/// What one sequencer tick produced.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct StepOutput {
    /// Command to issue this tick, bypassing the external-command gates.
    pub command: Option<Command>,
    /// Step transition taken this tick.
    pub transition: Option<(StepId, StepId)>,
    /// `(open_travel_ms, close_travel_ms)` once the sequence completed.
    pub result: Option<(u64, u64)>,
}

/// An in-progress calibration: the engine plus its context.
pub struct CalibrationRun {
    sequencer: Sequencer,
    ctx: CalibrationContext,
}

impl CalibrationRun {
    /// Start a run. The first command is issued by the next [`step`](Self::step).
    pub fn start(now_ms: u64, settle_ms: u64) -> Self {
        let mut ctx = CalibrationContext::new(now_ms, settle_ms);
        let mut sequencer = Sequencer::new();
        sequencer.start(&mut ctx);
        Self { sequencer, ctx }
    }

    /// Feed the observed cover state and advance one tick.
    pub fn step(
        &mut self,
        now_ms: u64,
        position_state: PositionState,
        position: f64,
        last_change_ms: u64,
    ) -> StepOutput {
        self.ctx.now_ms = now_ms;
        self.ctx.position_state = position_state;
        self.ctx.position = position;
        self.ctx.last_change_ms = last_change_ms;

        let transition = if self.sequencer.is_complete() {
            None
        } else {
            self.sequencer.tick(&mut self.ctx)
        };

        let result = match (self.ctx.complete, self.ctx.open_travel_ms, self.ctx.close_travel_ms) {
            (true, Some(open), Some(close)) => Some((open, close)),
            _ => None,
        };

        StepOutput {
            command: self.ctx.request.take(),
            transition,
            result,
        }
    }

    pub fn current_step(&self) -> StepId {
        self.sequencer.current_step()
    }
}
