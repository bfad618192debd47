//! Control loop service, the hexagonal core.
//!
//! [`CoverService`] owns the cover state, the pending intent, the
//! calibration record and every port. External calls only record intent;
//! [`tick`](CoverService::tick) is the sole mutator of position and motor
//! state.
//!
//! ```text
//!   Clock ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!             │         CoverService         │
//!  LinePort ◀▶│ Sequencer · Guard · Motor    │
//!             └──────────────────────────────┘
//!                           │
//!                      StoragePort
//! ```
//!
//! Each tick runs, in order:
//!
//! 0. the calibration sequencer, which may replace the intent;
//! 1. intent application (stop, reversal halt, or motion start);
//! 2. position estimation by linear interpolation;
//! 3. the intent's own stop condition;
//! 4. the limiter override;
//! 5. change detection against the last published snapshot.

use core::fmt;

use embedded_hal::digital::PinState;
use log::{debug, info, warn};

use crate::calibration::record::CalibrationInfo;
use crate::calibration::CalibrationRun;
use crate::config::CoverConfig;
use crate::drivers::motor::MotorDriver;
use crate::error::{Error, InvalidArgument};
use crate::pins::Line;
use crate::safety::LimiterGuard;

use super::commands::CoverCommand;
use super::events::{CoverEvent, StopReason};
use super::ports::{Clock, EventSink, LinePort, StoragePort};
use super::state::{
    CalibrationStatus, Command, CoverState, Direction, HardwareState, LineLevels, POSITION_CLOSED,
    POSITION_OPEN, PositionState, StopCondition, clamp_position,
};

// ───────────────────────────────────────────────────────────────
// Command outcomes
// ───────────────────────────────────────────────────────────────

/// Why a command was dropped. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The calibration sequencer has control authority.
    Calibrating,
    /// Movement needs a calibrated cover.
    Uncalibrated,
    /// Too soon after the last state change or accepted command.
    Dwell,
    /// The cover is already where the command would take it.
    AlreadyThere,
    /// Calibration needs real limiters.
    NoHardware,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Calibrating => write!(f, "calibration in progress"),
            Self::Uncalibrated => write!(f, "not calibrated"),
            Self::Dwell => write!(f, "within dwell window"),
            Self::AlreadyThere => write!(f, "already at target"),
            Self::NoHardware => write!(f, "no hardware"),
        }
    }
}

/// Result of a command call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    Ignored(IgnoreReason),
}

impl CommandOutcome {
    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}

// ───────────────────────────────────────────────────────────────
// CoverService
// ───────────────────────────────────────────────────────────────

/// The control loop state machine.
pub struct CoverService {
    config: CoverConfig,
    lines: Box<dyn LinePort>,
    store: Box<dyn StoragePort>,
    clock: Box<dyn Clock>,
    sink: Box<dyn EventSink>,

    hardware_present: bool,
    motor: MotorDriver,
    guard: LimiterGuard,
    calibration: CalibrationInfo,
    calibration_run: Option<CalibrationRun>,

    // -- Live state (tick-owned) --
    position: f64,
    position_state: PositionState,
    /// Position at the last state change; interpolation starts here.
    anchor_position: f64,
    last_state_change_ms: Option<u64>,

    // -- Intent (written by commands, consumed by the tick) --
    command: Option<Command>,
    stop_requested: bool,
    last_command_ms: Option<u64>,

    /// Last snapshot handed to observers.
    published: CoverState,
    shut_down: bool,
}

impl CoverService {
    /// Build the service. Loads the calibration record once; without
    /// hardware the cover is force-calibrated with whatever travel times
    /// are known.
    pub fn new(
        config: CoverConfig,
        lines: Box<dyn LinePort>,
        store: Box<dyn StoragePort>,
        clock: Box<dyn Clock>,
        sink: Box<dyn EventSink>,
    ) -> Self {
        let hardware_present = lines.is_present();
        let mut calibration =
            CalibrationInfo::load(store.as_ref(), &config.calibration_key, config.default_travel_ms);
        if !hardware_present && !calibration.calibrated {
            info!("CoverService: no hardware, assuming calibrated travel times");
            calibration.calibrated = true;
        }

        let guard = LimiterGuard::new(config.limiter_grace_ms, hardware_present);
        let mut svc = Self {
            config,
            lines,
            store,
            clock,
            sink,
            hardware_present,
            motor: MotorDriver::new(),
            guard,
            calibration,
            calibration_run: None,
            position: POSITION_CLOSED,
            position_state: PositionState::Stopped,
            anchor_position: POSITION_CLOSED,
            last_state_change_ms: None,
            command: None,
            stop_requested: false,
            last_command_ms: None,
            published: CoverState::default(),
            shut_down: false,
        };
        svc.motor.stop(svc.lines.as_mut());
        svc.published = svc.state();
        info!(
            "CoverService started (hardware={}, calibration={:?})",
            hardware_present, svc.published.calibration
        );
        svc
    }

    // ── Queries ───────────────────────────────────────────────

    /// Copy of the externally visible state.
    pub fn state(&self) -> CoverState {
        CoverState {
            current_position: self.position,
            target_position: self.target_position(),
            position_state: self.position_state,
            calibration: self.calibration_status(),
        }
    }

    /// Absolute target of the current intent, or the current position when
    /// nothing is pending.
    pub fn target_position(&self) -> f64 {
        self.command.map_or(self.position, |c| c.target())
    }

    pub fn calibration_status(&self) -> CalibrationStatus {
        if self.calibration_run.is_some() {
            CalibrationStatus::InProgress
        } else if self.calibration.calibrated {
            CalibrationStatus::Calibrated
        } else {
            CalibrationStatus::Uncalibrated
        }
    }

    pub fn calibration_info(&self) -> CalibrationInfo {
        self.calibration
    }

    /// Raw line levels, or [`HardwareState::absent`] without hardware.
    pub fn hardware_state(&mut self) -> HardwareState {
        if !self.hardware_present || self.shut_down {
            return HardwareState::absent();
        }
        let mut level = |line: Line| u8::from(self.lines.read_level(line) == PinState::High);
        HardwareState::present(LineLevels {
            motor_open: level(Line::MotorOpen),
            motor_close: level(Line::MotorClose),
            open_limiter: level(Line::OpenLimiter),
            close_limiter: level(Line::CloseLimiter),
        })
    }

    pub fn config(&self) -> &CoverConfig {
        &self.config
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ── Commands ──────────────────────────────────────────────

    /// Request a run to the open limiter.
    pub fn open(&mut self) -> CommandOutcome {
        self.run_to_limiter(Direction::Open)
    }

    /// Request a run to the close limiter.
    pub fn close(&mut self) -> CommandOutcome {
        self.run_to_limiter(Direction::Close)
    }

    /// Drop any intent and stop on the next tick. Not subject to dwell.
    pub fn stop(&mut self) -> CommandOutcome {
        info!("stop command received");
        if self.calibration_run.is_some() {
            return self.ignored("stop", IgnoreReason::Calibrating);
        }
        self.command = None;
        self.stop_requested = true;
        CommandOutcome::Accepted
    }

    /// Request a move to an absolute position.
    pub fn set_target_position(&mut self, target: f64) -> Result<CommandOutcome, Error> {
        info!("set-target command received ({target})");
        if !(POSITION_CLOSED..=POSITION_OPEN).contains(&target) {
            return Err(InvalidArgument::PositionOutOfRange(target).into());
        }
        let now = self.clock.now_ms();
        if let Some(reason) = self.movement_gate(now) {
            return Ok(self.ignored("set-target", reason));
        }
        // Full travel always ends on the limiter, whatever the estimate says.
        if let Some(direction) = [Direction::Open, Direction::Close]
            .into_iter()
            .find(|d| target == d.extreme())
        {
            if self.already_at_limiter(direction) {
                return Ok(self.ignored("set-target", IgnoreReason::AlreadyThere));
            }
            return Ok(self.accept(Command::to_limiter(direction), now));
        }
        if (target - self.position).abs() <= self.config.change_epsilon {
            return Ok(self.ignored("set-target", IgnoreReason::AlreadyThere));
        }

        let direction = if target > self.position {
            Direction::Open
        } else {
            Direction::Close
        };
        let command = Command {
            direction,
            until: StopCondition::Position(target),
        };
        Ok(self.accept(command, now))
    }

    /// Start the calibration sequence.
    pub fn calibrate(&mut self) -> CommandOutcome {
        info!("calibrate command received");
        if self.calibration_run.is_some() {
            return self.ignored("calibrate", IgnoreReason::Calibrating);
        }
        if !self.hardware_present {
            return self.ignored("calibrate", IgnoreReason::NoHardware);
        }
        let now = self.clock.now_ms();
        self.command = None;
        self.stop_requested = false;
        self.calibration_run = Some(CalibrationRun::start(
            now,
            self.config.calibration_settle_ms,
        ));
        self.sink.emit(&CoverEvent::CalibrationStarted);
        CommandOutcome::Accepted
    }

    /// Dispatch a [`CoverCommand`].
    pub fn handle_command(&mut self, cmd: CoverCommand) -> Result<CommandOutcome, Error> {
        debug!("dispatching {} command", cmd.name());
        match cmd {
            CoverCommand::Open => Ok(self.open()),
            CoverCommand::Close => Ok(self.close()),
            CoverCommand::Stop => Ok(self.stop()),
            CoverCommand::SetTarget(p) => self.set_target_position(p),
            CoverCommand::Calibrate => Ok(self.calibrate()),
        }
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one control cycle. Returns the new snapshot when something
    /// observable changed since the last one returned.
    pub fn tick(&mut self) -> Option<CoverState> {
        if self.shut_down {
            return None;
        }
        let now = self.clock.now_ms();

        // 0. Calibration sequencer
        self.step_calibration(now);

        // 1. Apply intent
        self.apply_intent(now);

        // 2. Estimate position
        if let Some(direction) = self.position_state.direction() {
            if self.calibration.calibrated {
                let elapsed = now.saturating_sub(self.last_state_change_ms.unwrap_or(now));
                let moved = self.calibration.travel_percent(direction, elapsed);
                self.position = clamp_position(match direction {
                    Direction::Open => self.anchor_position + moved,
                    Direction::Close => self.anchor_position - moved,
                });
            }
        }

        // 3. The intent's own stop condition
        self.check_stop_condition(now);

        // 4. Limiter override, always last
        self.check_limiters(now);
        debug_assert_eq!(self.motor.direction(), self.position_state.direction());

        // 5. Change detection
        self.detect_change()
    }

    /// Stop the motor, drive both outputs low and release every line.
    /// Further ticks and commands have no effect on hardware. Idempotent.
    pub fn release_hardware(&mut self) {
        if self.shut_down {
            return;
        }
        let now = self.clock.now_ms();
        if self.position_state != PositionState::Stopped {
            self.halt(now, StopReason::Shutdown);
        }
        if self.calibration_run.take().is_some() {
            warn!("CoverService: calibration abandoned by shutdown");
        }
        self.command = None;
        self.motor.stop(self.lines.as_mut());
        for line in Line::ALL {
            self.lines.release(line);
        }
        self.shut_down = true;
        info!("CoverService: hardware released");
    }

    // ── Internal: commands ────────────────────────────────────

    fn run_to_limiter(&mut self, direction: Direction) -> CommandOutcome {
        let name = match direction {
            Direction::Open => "open",
            Direction::Close => "close",
        };
        info!("{name} command received");
        let now = self.clock.now_ms();
        if let Some(reason) = self.movement_gate(now) {
            return self.ignored(name, reason);
        }
        if self.already_at_limiter(direction) {
            return self.ignored(name, IgnoreReason::AlreadyThere);
        }
        self.accept(Command::to_limiter(direction), now)
    }

    /// Stopped with nothing pending and resting on `direction`'s limiter.
    /// With hardware only the switch counts; an estimate clamped at the
    /// extreme does not.
    fn already_at_limiter(&mut self, direction: Direction) -> bool {
        if self.command.is_some() || self.position_state != PositionState::Stopped {
            return false;
        }
        if self.hardware_present {
            self.lines.read_level(LimiterGuard::line_for(direction)) == PinState::High
        } else {
            self.position == direction.extreme()
        }
    }

    /// Reason a movement command must be dropped right now, if any.
    fn movement_gate(&self, now: u64) -> Option<IgnoreReason> {
        if self.calibration_run.is_some() {
            return Some(IgnoreReason::Calibrating);
        }
        if !self.calibration.calibrated {
            return Some(IgnoreReason::Uncalibrated);
        }
        let last = self.last_state_change_ms.max(self.last_command_ms)?;
        (now.saturating_sub(last) < self.config.command_dwell_ms).then_some(IgnoreReason::Dwell)
    }

    fn accept(&mut self, command: Command, now: u64) -> CommandOutcome {
        self.command = Some(command);
        self.stop_requested = false;
        self.last_command_ms = Some(now);
        info!(
            "command accepted: {:?} towards {:.1}%",
            command.direction,
            command.target()
        );
        CommandOutcome::Accepted
    }

    fn ignored(&self, name: &str, reason: IgnoreReason) -> CommandOutcome {
        info!("{name} command ignored: {reason}");
        CommandOutcome::Ignored(reason)
    }

    // ── Internal: tick steps ──────────────────────────────────

    fn step_calibration(&mut self, now: u64) {
        let out = match self.calibration_run.as_mut() {
            Some(run) => run.step(
                now,
                self.position_state,
                self.position,
                self.last_state_change_ms.unwrap_or(now),
            ),
            None => return,
        };
        if let Some((from, to)) = out.transition {
            self.sink.emit(&CoverEvent::CalibrationStep { from, to });
        }
        if let Some(command) = out.command {
            self.command = Some(command);
            self.stop_requested = false;
        }
        if let Some((open_travel_ms, close_travel_ms)) = out.result {
            self.finish_calibration(open_travel_ms, close_travel_ms);
        }
    }

    fn finish_calibration(&mut self, open_travel_ms: u64, close_travel_ms: u64) {
        self.calibration = CalibrationInfo {
            calibrated: true,
            open_travel_ms,
            close_travel_ms,
        };
        self.calibration_run = None;
        info!(
            "Calibration complete: open={}ms close={}ms",
            open_travel_ms, close_travel_ms
        );
        if let Err(e) = self
            .calibration
            .save(self.store.as_mut(), &self.config.calibration_key)
        {
            warn!("Calibration record not persisted: {}", e);
            self.sink.emit(&CoverEvent::PersistFailed(e.to_string()));
        }
        self.sink.emit(&CoverEvent::CalibrationFinished {
            open_travel_ms,
            close_travel_ms,
        });
    }

    fn apply_intent(&mut self, now: u64) {
        if self.stop_requested {
            self.stop_requested = false;
            if self.position_state != PositionState::Stopped {
                self.halt(now, StopReason::Requested);
            }
        }
        let Some(command) = self.command else {
            return;
        };
        match self.position_state.direction() {
            // Never reverse within a tick: halt, keep the command.
            Some(moving) if moving != command.direction => {
                self.halt(now, StopReason::Reversal);
            }
            Some(_) => {}
            None => {
                let paused = self
                    .last_state_change_ms
                    .is_none_or(|t| now.saturating_sub(t) >= self.config.reversal_pause_ms);
                if paused {
                    self.start_motion(now, command.direction);
                }
            }
        }
    }

    fn check_stop_condition(&mut self, now: u64) {
        let (Some(command), Some(moving)) = (self.command, self.position_state.direction()) else {
            return;
        };
        if command.direction != moving {
            return;
        }
        match command.until {
            StopCondition::Position(_) => {
                if command.position_reached(self.position) {
                    self.command = None;
                    self.halt(now, StopReason::TargetReached);
                }
            }
            StopCondition::Limiter => {
                let reached = if self.hardware_present {
                    let level = self.lines.read_level(LimiterGuard::line_for(moving));
                    self.guard.engaged(level, now)
                } else {
                    // No switch to wait for: the estimate hitting the end stands in.
                    self.position == moving.extreme()
                };
                if reached {
                    info!("{:?} limiter reached", moving);
                    self.snap_to(moving.extreme());
                    self.command = None;
                    self.halt(now, StopReason::Limiter(moving));
                }
            }
        }
    }

    fn check_limiters(&mut self, now: u64) {
        if !self.hardware_present {
            return;
        }
        let close_level = self.lines.read_level(Line::CloseLimiter);
        let open_level = self.lines.read_level(Line::OpenLimiter);
        let moving = self.position_state.direction();
        let Some(hit) = self.guard.evaluate(close_level, open_level, moving, now) else {
            return;
        };
        self.snap_to(hit.limiter.extreme());
        if self.command.is_some_and(|c| c.direction == hit.limiter) {
            self.command = None;
        }
        if hit.halts_motion {
            self.command = None;
            self.halt(now, StopReason::LimiterOverride(hit.limiter));
        }
    }

    fn detect_change(&mut self) -> Option<CoverState> {
        let snapshot = self.state();
        let prev = self.published;
        let changed = snapshot.position_state != prev.position_state
            || snapshot.calibration != prev.calibration
            || (snapshot.current_position - prev.current_position).abs() > self.config.change_epsilon;
        if changed {
            self.published = snapshot;
            Some(snapshot)
        } else {
            None
        }
    }

    // ── Internal: motor transitions ───────────────────────────

    fn start_motion(&mut self, now: u64, direction: Direction) {
        let from = self.position_state;
        self.motor.run(self.lines.as_mut(), direction);
        self.position_state = PositionState::moving(direction);
        self.mark_state_change(now);
        self.sink.emit(&CoverEvent::StateChanged {
            from,
            to: self.position_state,
            position: self.position,
        });
    }

    fn halt(&mut self, now: u64, reason: StopReason) {
        let from = self.position_state;
        self.motor.stop(self.lines.as_mut());
        self.position_state = PositionState::Stopped;
        self.mark_state_change(now);
        self.sink.emit(&CoverEvent::StateChanged {
            from,
            to: PositionState::Stopped,
            position: self.position,
        });
        self.sink.emit(&CoverEvent::Stopped {
            reason,
            position: self.position,
        });
    }

    /// Pin the position to a known value and restart interpolation there.
    fn snap_to(&mut self, position: f64) {
        self.position = clamp_position(position);
        self.anchor_position = self.position;
    }

    fn mark_state_change(&mut self, now: u64) {
        self.last_state_change_ms = Some(now);
        self.anchor_position = self.position;
        self.guard.on_state_change(now);
    }
}
