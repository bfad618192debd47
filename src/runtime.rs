//! Thread-safe controller handle.
//!
//! [`ControlLoop`] is what request handlers and the accessory bridge hold.
//! It owns the [`CoverService`] behind a mutex, the tick thread and the
//! [`ChangeNotifier`].
//!
//! ```text
//!  request threads ──▶ ControlLoop ──lock──▶ CoverService
//!                          │                      │ tick() -> Option<CoverState>
//!                          └──── ChangeNotifier ◀─┘   (fan-out outside the lock)
//! ```
//!
//! Commands hold the lock only long enough to record intent. Listeners
//! run after the lock is dropped, so a listener may call back into the
//! handle.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{info, warn};
use parking_lot::Mutex;

use crate::app::commands::CoverCommand;
use crate::app::service::{CommandOutcome, CoverService};
use crate::app::state::{CoverState, HardwareState};
use crate::calibration::record::CalibrationInfo;
use crate::error::Error;
use crate::notify::{ChangeNotifier, ListenerId};

pub struct ControlLoop {
    service: Arc<Mutex<CoverService>>,
    notifier: Arc<ChangeNotifier>,
    running: Arc<AtomicBool>,
    worker: Mutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
}

impl ControlLoop {
    pub fn new(service: CoverService) -> Self {
        let tick_interval = Duration::from_millis(service.config().tick_interval_ms);
        Self {
            service: Arc::new(Mutex::new(service)),
            notifier: Arc::new(ChangeNotifier::new()),
            running: Arc::new(AtomicBool::new(false)),
            worker: Mutex::new(None),
            tick_interval,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the tick thread. A second call while running does nothing.
    pub fn spawn(&self) -> std::io::Result<()> {
        let mut worker = self.worker.lock();
        if worker.is_some() || self.service.lock().is_shut_down() {
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);

        let service = Arc::clone(&self.service);
        let notifier = Arc::clone(&self.notifier);
        let running = Arc::clone(&self.running);
        let interval = self.tick_interval;
        let handle = thread::Builder::new()
            .name("cover-tick".into())
            .spawn(move || {
                info!("Control loop running every {}ms", interval.as_millis());
                while running.load(Ordering::SeqCst) {
                    let started = Instant::now();
                    run_tick(&service, &notifier);
                    if let Some(rest) = interval.checked_sub(started.elapsed()) {
                        thread::sleep(rest);
                    } else {
                        warn!("Control loop tick overran {}ms", interval.as_millis());
                    }
                }
                info!("Control loop stopped");
            })?;
        *worker = Some(handle);
        Ok(())
    }

    /// Run one tick on the calling thread and publish any change.
    pub fn tick(&self) -> Option<CoverState> {
        run_tick(&self.service, &self.notifier)
    }

    /// Stop ticking after the in-flight tick, then stop the motor and
    /// release every line. Idempotent.
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.lock().take() {
            if handle.thread().id() == thread::current().id() {
                warn!("shutdown() called from the tick thread; not joining");
            } else if handle.join().is_err() {
                warn!("Control loop thread panicked");
            }
        }
        self.service.lock().release_hardware();
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn state(&self) -> CoverState {
        self.service.lock().state()
    }

    pub fn target_position(&self) -> f64 {
        self.service.lock().target_position()
    }

    pub fn hardware_state(&self) -> HardwareState {
        self.service.lock().hardware_state()
    }

    pub fn calibration_info(&self) -> CalibrationInfo {
        self.service.lock().calibration_info()
    }

    // ── Commands ──────────────────────────────────────────────

    pub fn open(&self) -> CommandOutcome {
        self.service.lock().open()
    }

    pub fn close(&self) -> CommandOutcome {
        self.service.lock().close()
    }

    pub fn stop(&self) -> CommandOutcome {
        self.service.lock().stop()
    }

    pub fn set_target_position(&self, target: f64) -> Result<CommandOutcome, Error> {
        self.service.lock().set_target_position(target)
    }

    pub fn calibrate(&self) -> CommandOutcome {
        self.service.lock().calibrate()
    }

    pub fn handle_command(&self, cmd: CoverCommand) -> Result<CommandOutcome, Error> {
        self.service.lock().handle_command(cmd)
    }

    // ── Notifications ─────────────────────────────────────────

    pub fn subscribe(&self, listener: impl Fn(&CoverState) + Send + Sync + 'static) -> ListenerId {
        self.notifier.subscribe(listener)
    }

    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        self.notifier.unsubscribe(id)
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Block until the next published snapshot or `timeout`. The one-shot
    /// listener is always removed before returning.
    pub fn wait_for_change(&self, timeout: Duration) -> Option<CoverState> {
        let (tx, rx) = mpsc::channel();
        let id = self.notifier.subscribe(move |state| {
            let _ = tx.send(*state);
        });
        let result = rx.recv_timeout(timeout).ok();
        self.notifier.unsubscribe(id);
        result
    }
}

impl Drop for ControlLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_tick(service: &Mutex<CoverService>, notifier: &ChangeNotifier) -> Option<CoverState> {
    let changed = service.lock().tick();
    if let Some(state) = &changed {
        notifier.publish(state);
    }
    changed
}
