//! Change notification fan-out.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use poolcover::CoverState;
use poolcover::app::state::{CalibrationStatus, PositionState};

use crate::mock_hw::{Rig, SharedStore, TICK_MS, calibrated};

fn collect(rig: &Rig) -> Arc<Mutex<Vec<CoverState>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    rig.ctl.subscribe(move |s| sink.lock().push(*s));
    seen
}

#[test]
fn half_open_publishes_progress_then_stop() {
    let mut rig = Rig::without_hardware(SharedStore::with_record(calibrated(10_000, 10_000)));
    let seen = collect(&rig);

    assert!(rig.ctl.set_target_position(50.0).unwrap().is_accepted());
    rig.ctl.tick();
    rig.run_for(5_000);

    let seen = seen.lock().clone();
    let first = seen.first().expect("no snapshot published");
    assert_eq!(first.position_state, PositionState::Opening);
    assert_eq!(first.target_position, 50.0);

    assert!(seen.iter().any(|s| {
        s.position_state == PositionState::Opening && (s.current_position - 25.0).abs() < 1e-9
    }));

    let last = seen.last().unwrap();
    assert_eq!(last.position_state, PositionState::Stopped);
    assert_eq!(last.current_position, 50.0);
    assert_eq!(last.target_position, 50.0);

    // Positions never move backwards during the run.
    assert!(
        seen.windows(2)
            .all(|w| w[1].current_position >= w[0].current_position)
    );
}

#[test]
fn idle_cover_publishes_nothing() {
    let mut rig = Rig::with_lines(SharedStore::with_record(calibrated(10_000, 10_000)));
    let seen = collect(&rig);
    rig.steps(50);
    assert!(seen.lock().is_empty());
}

#[test]
fn wait_for_change_returns_next_snapshot() {
    let rig = Rig::without_hardware(SharedStore::with_record(calibrated(10_000, 10_000)));
    let ctl = &rig.ctl;
    let clock = &rig.clock;

    let got = thread::scope(|s| {
        let waiter = s.spawn(|| ctl.wait_for_change(Duration::from_secs(5)));
        while ctl.notifier().listener_count() == 0 {
            thread::yield_now();
        }
        assert!(ctl.open().is_accepted());
        clock.advance(TICK_MS);
        ctl.tick();
        waiter.join().unwrap()
    });

    let state = got.expect("no change seen");
    assert_eq!(state.position_state, PositionState::Opening);
    assert_eq!(ctl.notifier().listener_count(), 0);
}

#[test]
fn panicking_listener_does_not_stop_the_loop() {
    let mut rig = Rig::without_hardware(SharedStore::with_record(calibrated(10_000, 10_000)));
    rig.ctl.subscribe(|_| panic!("listener bug"));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    rig.ctl.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });

    rig.ctl.open();
    rig.steps(3);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);
}

#[test]
fn unsubscribed_listener_is_not_called() {
    let mut rig = Rig::without_hardware(SharedStore::with_record(calibrated(10_000, 10_000)));
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let id = rig.ctl.subscribe(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    });
    assert!(rig.ctl.unsubscribe(id));
    assert!(!rig.ctl.unsubscribe(id));

    rig.ctl.open();
    rig.steps(3);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn calibration_status_changes_are_published() {
    let mut rig = Rig::with_cover(SharedStore::default(), 0.0, 4_000, 4_000);
    let seen = collect(&rig);
    rig.ctl.calibrate();
    rig.run_until(400, |s| s.calibration == CalibrationStatus::Calibrated);

    let statuses: Vec<_> = seen.lock().iter().map(|s| s.calibration).collect();
    assert_eq!(statuses.first(), Some(&CalibrationStatus::InProgress));
    assert_eq!(statuses.last(), Some(&CalibrationStatus::Calibrated));
}
