//! Mock hardware for integration tests.
//!
//! [`MockLines`] records every drive call and lets the test set limiter
//! levels through a shared [`LineHandle`]. [`SimulatedCover`] sits on the
//! same handle and moves a physical position according to the motor
//! outputs, raising the limiters at the extremes. [`Rig`] wires all of it
//! to a [`ControlLoop`] driven by a [`ManualClock`].

use std::collections::HashSet;
use std::sync::Arc;

use embedded_hal::digital::PinState;
use parking_lot::Mutex;

use poolcover::adapters::persist::MemoryStore;
use poolcover::adapters::time::ManualClock;
use poolcover::app::events::CoverEvent;
use poolcover::app::ports::{EventSink, LinePort, StorageError, StoragePort};
use poolcover::app::service::CoverService;
use poolcover::app::state::CoverState;
use poolcover::calibration::record::CalibrationInfo;
use poolcover::config::CoverConfig;
use poolcover::pins::Line;
use poolcover::runtime::ControlLoop;

pub const TICK_MS: u64 = 100;
pub const KEY: &str = "cover_state";

// ── Lines ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct LineBank {
    open_limiter: bool,
    close_limiter: bool,
    motor_open: bool,
    motor_close: bool,
    drives: Vec<(Line, PinState)>,
    released: HashSet<Line>,
}

/// Test-side view of the mock lines.
#[derive(Clone, Default)]
pub struct LineHandle(Arc<Mutex<LineBank>>);

#[allow(dead_code)]
impl LineHandle {
    pub fn set_limiter(&self, line: Line, engaged: bool) {
        let mut bank = self.0.lock();
        match line {
            Line::OpenLimiter => bank.open_limiter = engaged,
            Line::CloseLimiter => bank.close_limiter = engaged,
            _ => panic!("{} is not a limiter", line.name()),
        }
    }

    pub fn motor_open(&self) -> bool {
        self.0.lock().motor_open
    }

    pub fn motor_close(&self) -> bool {
        self.0.lock().motor_close
    }

    pub fn drives(&self) -> Vec<(Line, PinState)> {
        self.0.lock().drives.clone()
    }

    pub fn released(&self) -> HashSet<Line> {
        self.0.lock().released.clone()
    }

    /// True if both motor outputs were ever high at the same time.
    pub fn ever_both_high(&self) -> bool {
        let (mut open, mut close) = (false, false);
        for (line, level) in self.drives() {
            let high = level == PinState::High;
            match line {
                Line::MotorOpen => open = high,
                Line::MotorClose => close = high,
                _ => {}
            }
            if open && close {
                return true;
            }
        }
        false
    }
}

/// [`LinePort`] backed by a [`LineHandle`].
pub struct MockLines(LineHandle);

impl MockLines {
    pub fn pair() -> (Self, LineHandle) {
        let handle = LineHandle::default();
        (Self(handle.clone()), handle)
    }
}

impl LinePort for MockLines {
    fn is_present(&self) -> bool {
        true
    }

    fn read_level(&mut self, line: Line) -> PinState {
        let bank = self.0.0.lock();
        let high = match line {
            Line::OpenLimiter => bank.open_limiter,
            Line::CloseLimiter => bank.close_limiter,
            Line::MotorOpen => bank.motor_open,
            Line::MotorClose => bank.motor_close,
        };
        PinState::from(high)
    }

    fn drive_level(&mut self, line: Line, level: PinState) {
        let mut bank = self.0.0.lock();
        if bank.released.contains(&line) {
            return;
        }
        let high = level == PinState::High;
        match line {
            Line::MotorOpen => bank.motor_open = high,
            Line::MotorClose => bank.motor_close = high,
            _ => return,
        }
        bank.drives.push((line, level));
    }

    fn release(&mut self, line: Line) {
        self.0.0.lock().released.insert(line);
    }
}

// ── Physical plant ────────────────────────────────────────────

/// Moves a physical cover according to the motor outputs.
pub struct SimulatedCover {
    lines: LineHandle,
    pub position: f64,
    pub open_travel_ms: u64,
    pub close_travel_ms: u64,
}

impl SimulatedCover {
    pub fn new(lines: LineHandle, position: f64, open_travel_ms: u64, close_travel_ms: u64) -> Self {
        let cover = Self {
            lines,
            position,
            open_travel_ms,
            close_travel_ms,
        };
        cover.update_limiters();
        cover
    }

    pub fn advance(&mut self, dt_ms: u64) {
        let (open, close) = (self.lines.motor_open(), self.lines.motor_close());
        let delta = match (open, close) {
            (true, false) => dt_ms as f64 * 100.0 / self.open_travel_ms as f64,
            (false, true) => -(dt_ms as f64 * 100.0 / self.close_travel_ms as f64),
            _ => 0.0,
        };
        self.position = (self.position + delta).clamp(0.0, 100.0);
        if self.position < 1e-9 {
            self.position = 0.0;
        } else if self.position > 100.0 - 1e-9 {
            self.position = 100.0;
        }
        self.update_limiters();
    }

    fn update_limiters(&self) {
        self.lines.set_limiter(Line::CloseLimiter, self.position == 0.0);
        self.lines.set_limiter(Line::OpenLimiter, self.position == 100.0);
    }
}

// ── Storage & events ──────────────────────────────────────────

/// Store shared between the service and the test.
#[derive(Clone, Default)]
pub struct SharedStore {
    inner: Arc<Mutex<MemoryStore>>,
    fail_writes: bool,
}

#[allow(dead_code)]
impl SharedStore {
    pub fn failing_writes() -> Self {
        Self {
            fail_writes: true,
            ..Self::default()
        }
    }

    pub fn with_record(info: CalibrationInfo) -> Self {
        let store = Self::default();
        info.save(&mut *store.inner.lock(), KEY).unwrap();
        store
    }

    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.inner.lock().get(key).unwrap()
    }

    pub fn put_raw(&self, key: &str, data: &[u8]) {
        self.inner.lock().set(key, data).unwrap();
    }

    pub fn record(&self) -> Option<CalibrationInfo> {
        self.raw(KEY).map(|b| serde_json::from_slice(&b).unwrap())
    }
}

impl StoragePort for SharedStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.inner.lock().get(key)
    }

    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes {
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.lock().set(key, data)
    }
}

/// Event sink that keeps everything it is given.
#[derive(Clone, Default)]
pub struct RecordingSink(Arc<Mutex<Vec<CoverEvent>>>);

#[allow(dead_code)]
impl RecordingSink {
    pub fn events(&self) -> Vec<CoverEvent> {
        self.0.lock().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &CoverEvent) {
        self.0.lock().push(event.clone());
    }
}

// ── Rig ───────────────────────────────────────────────────────

pub fn test_config() -> CoverConfig {
    CoverConfig {
        tick_interval_ms: TICK_MS,
        ..CoverConfig::default()
    }
}

pub fn calibrated(open_travel_ms: u64, close_travel_ms: u64) -> CalibrationInfo {
    CalibrationInfo {
        calibrated: true,
        open_travel_ms,
        close_travel_ms,
    }
}

/// A control loop on a manual clock, with optional simulated physics.
pub struct Rig {
    pub ctl: ControlLoop,
    pub clock: ManualClock,
    pub lines: Option<LineHandle>,
    pub cover: Option<SimulatedCover>,
    pub store: SharedStore,
    pub sink: RecordingSink,
}

#[allow(dead_code)]
impl Rig {
    /// No hardware at all.
    pub fn without_hardware(store: SharedStore) -> Self {
        Self::build(Box::new(poolcover::adapters::gpio::NoHardware), None, None, store)
    }

    /// Mock lines whose limiters the test sets by hand.
    pub fn with_lines(store: SharedStore) -> Self {
        let (lines, handle) = MockLines::pair();
        Self::build(Box::new(lines), Some(handle), None, store)
    }

    /// Mock lines driven by a simulated cover at `position`.
    pub fn with_cover(store: SharedStore, position: f64, open_ms: u64, close_ms: u64) -> Self {
        let (lines, handle) = MockLines::pair();
        let cover = SimulatedCover::new(handle.clone(), position, open_ms, close_ms);
        Self::build(Box::new(lines), Some(handle), Some(cover), store)
    }

    fn build(
        lines: Box<dyn LinePort>,
        handle: Option<LineHandle>,
        cover: Option<SimulatedCover>,
        store: SharedStore,
    ) -> Self {
        let clock = ManualClock::new(0);
        let sink = RecordingSink::default();
        let service = CoverService::new(
            test_config(),
            lines,
            Box::new(store.clone()),
            Box::new(clock.clone()),
            Box::new(sink.clone()),
        );
        Self {
            ctl: ControlLoop::new(service),
            clock,
            lines: handle,
            cover,
            store,
            sink,
        }
    }

    pub fn now(&self) -> u64 {
        use poolcover::app::ports::Clock;
        self.clock.now_ms()
    }

    pub fn handle(&self) -> &LineHandle {
        self.lines.as_ref().expect("rig has no mock lines")
    }

    /// Advance one tick period: physics first, then the control tick.
    pub fn step(&mut self) -> Option<CoverState> {
        self.clock.advance(TICK_MS);
        if let Some(cover) = self.cover.as_mut() {
            cover.advance(TICK_MS);
        }
        self.ctl.tick()
    }

    pub fn steps(&mut self, n: usize) {
        for _ in 0..n {
            self.step();
        }
    }

    /// Advance `ms` of wall time in ticks.
    pub fn run_for(&mut self, ms: u64) {
        self.steps((ms / TICK_MS) as usize);
    }

    /// Step until `done` holds, at most `max_ticks`. Returns ticks taken.
    pub fn run_until(&mut self, max_ticks: usize, done: impl Fn(&CoverState) -> bool) -> usize {
        for n in 1..=max_ticks {
            self.step();
            if done(&self.ctl.state()) {
                return n;
            }
        }
        panic!("condition not met within {max_ticks} ticks: {:?}", self.ctl.state());
    }
}
