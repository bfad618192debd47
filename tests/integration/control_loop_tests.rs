//! Control loop behaviour against mock lines and a manual clock.

use embedded_hal::digital::PinState;

use poolcover::app::commands::CoverCommand;
use poolcover::app::service::{CommandOutcome, IgnoreReason};
use poolcover::app::state::{CalibrationStatus, PositionState};
use poolcover::error::{Error, InvalidArgument};
use poolcover::pins::Line;

use crate::mock_hw::{Rig, SharedStore, calibrated};

fn calibrated_store(open_ms: u64, close_ms: u64) -> SharedStore {
    SharedStore::with_record(calibrated(open_ms, close_ms))
}

// ── Position estimation ───────────────────────────────────────

#[test]
fn target_position_reached_within_one_tick() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 10_000));
    assert!(rig.ctl.set_target_position(37.5).unwrap().is_accepted());
    assert_eq!(rig.ctl.target_position(), 37.5);

    rig.run_until(200, |s| s.position_state == PositionState::Stopped && s.current_position > 0.0);
    let s = rig.ctl.state();
    // One tick at 10 s full travel is 1 %.
    assert!((s.current_position - 37.5).abs() <= 1.0, "{s:?}");
    assert_eq!(s.target_position, s.current_position);
}

#[test]
fn closing_uses_close_travel_time() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 20_000));
    rig.ctl.open();
    rig.run_until(200, |s| s.position_state == PositionState::Stopped && s.current_position == 100.0);
    rig.run_for(1_000);

    assert!(rig.ctl.close().is_accepted());
    rig.step();
    rig.run_for(5_000);
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Closing);
    assert!((s.current_position - 75.0).abs() < 1e-9, "{s:?}");
}

#[test]
fn stop_is_idempotent() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 10_000));
    rig.ctl.open();
    rig.steps(10);
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);

    assert_eq!(rig.ctl.stop(), CommandOutcome::Accepted);
    rig.step();
    let stopped = rig.ctl.state();
    assert_eq!(stopped.position_state, PositionState::Stopped);

    for _ in 0..5 {
        assert_eq!(rig.ctl.stop(), CommandOutcome::Accepted);
        rig.step();
        assert_eq!(rig.ctl.state(), stopped);
    }
}

// ── Dwell and reversal ────────────────────────────────────────

#[test]
fn open_then_immediate_close_is_ignored() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 10_000));
    assert!(rig.ctl.open().is_accepted());
    assert_eq!(rig.ctl.close(), CommandOutcome::Ignored(IgnoreReason::Dwell));
    rig.step();
    assert_eq!(rig.ctl.close(), CommandOutcome::Ignored(IgnoreReason::Dwell));
    rig.steps(3);
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);
    assert_eq!(rig.ctl.target_position(), 100.0);
}

#[test]
fn reversal_passes_through_stopped() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.set_target_position(80.0).unwrap();
    rig.step();
    rig.run_for(2_000);
    assert!(rig.ctl.close().is_accepted());

    rig.step();
    assert_eq!(rig.ctl.state().position_state, PositionState::Stopped);
    assert!(!rig.handle().motor_open() && !rig.handle().motor_close());

    let ticks = rig.run_until(20, |s| s.position_state == PositionState::Closing);
    assert_eq!(ticks as u64 * 100, 500, "held stopped for the reversal pause");
    assert!(rig.handle().motor_close());
    assert!(!rig.handle().ever_both_high());
}

// ── Limiters ──────────────────────────────────────────────────

#[test]
fn limiter_ignored_during_grace() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.set_target_position(50.0).unwrap();
    rig.step();
    rig.run_for(1_000);

    rig.handle().set_limiter(Line::OpenLimiter, true);
    rig.step();
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Opening);
    assert!(s.current_position < 5.0);
}

#[test]
fn limiter_override_wins_after_grace() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    // A position target never stops on a limiter by itself.
    rig.ctl.set_target_position(50.0).unwrap();
    rig.step();
    rig.run_for(3_000);
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);

    rig.handle().set_limiter(Line::OpenLimiter, true);
    rig.step();
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Stopped);
    assert_eq!(s.current_position, 100.0);
    assert_eq!(s.target_position, 100.0);
    assert!(!rig.handle().motor_open() && !rig.handle().motor_close());
}

#[test]
fn opposite_limiter_after_grace_also_stops() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.set_target_position(50.0).unwrap();
    rig.step();
    rig.run_for(3_500);
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);

    rig.handle().set_limiter(Line::CloseLimiter, true);
    rig.step();
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Stopped);
    assert_eq!(s.current_position, 0.0);
    assert_eq!(s.target_position, 0.0);
    assert!(!rig.handle().motor_open() && !rig.handle().motor_close());

    rig.steps(5);
    assert_eq!(rig.ctl.state(), s);
    assert!(!rig.handle().ever_both_high());
}

#[test]
fn limiter_snap_while_stopped_restarts_interpolation() {
    let mut rig = Rig::with_lines(calibrated_store(10_000, 10_000));
    rig.ctl.set_target_position(50.0).unwrap();
    rig.run_until(100, |s| s.position_state == PositionState::Stopped && s.current_position > 0.0);
    rig.run_for(3_000);

    rig.handle().set_limiter(Line::OpenLimiter, true);
    rig.step();
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Stopped);
    assert_eq!(s.current_position, 100.0);

    rig.handle().set_limiter(Line::OpenLimiter, false);
    assert!(rig.ctl.close().is_accepted());
    rig.step();
    rig.run_for(2_000);
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Closing);
    assert!((s.current_position - 80.0).abs() < 1e-9, "{s:?}");
}

#[test]
fn clamped_estimate_does_not_block_finishing_the_run() {
    // The cover is physically twice as slow as calibrated.
    let mut rig = Rig::with_cover(calibrated_store(10_000, 10_000), 0.0, 20_000, 20_000);
    rig.ctl.open();
    rig.step();
    rig.run_for(12_000);
    assert_eq!(rig.ctl.state().current_position, 100.0);
    assert!(rig.ctl.stop().is_accepted());
    rig.step();
    rig.run_for(1_000);
    let physical = rig.cover.as_ref().unwrap().position;
    assert!(physical < 70.0, "physical {physical}");

    // The open limiter has not engaged, so full travel is still wanted.
    assert!(rig.ctl.set_target_position(100.0).unwrap().is_accepted());
    assert_eq!(rig.ctl.target_position(), 100.0);
    rig.run_until(200, |s| s.position_state == PositionState::Stopped);
    assert_eq!(rig.cover.as_ref().unwrap().position, 100.0);
    assert_eq!(rig.ctl.state().current_position, 100.0);

    rig.run_for(1_000);
    assert_eq!(rig.ctl.open(), CommandOutcome::Ignored(IgnoreReason::AlreadyThere));
    assert_eq!(
        rig.ctl.set_target_position(100.0).unwrap(),
        CommandOutcome::Ignored(IgnoreReason::AlreadyThere)
    );
}

#[test]
fn open_runs_until_open_limiter() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.open();
    rig.step();
    rig.run_for(10_000);
    // The estimate alone never ends a limiter run while hardware is present.
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);

    rig.handle().set_limiter(Line::OpenLimiter, true);
    rig.step();
    let s = rig.ctl.state();
    assert_eq!(s.position_state, PositionState::Stopped);
    assert_eq!(s.current_position, 100.0);
}

#[test]
fn close_limiter_snaps_to_zero() {
    let mut rig = Rig::with_cover(calibrated_store(20_000, 20_000), 0.0, 20_000, 20_000);
    rig.ctl.set_target_position(60.0).unwrap();
    rig.run_until(200, |s| s.position_state == PositionState::Stopped && s.current_position > 0.0);
    rig.run_for(1_000);

    assert!(rig.ctl.close().is_accepted());
    rig.run_until(200, |s| s.position_state == PositionState::Stopped);
    let s = rig.ctl.state();
    assert_eq!(s.current_position, 0.0);
    assert_eq!(s.target_position, 0.0);
    assert_eq!(rig.cover.as_ref().unwrap().position, 0.0);
}

// ── Gating ────────────────────────────────────────────────────

#[test]
fn uncalibrated_rejects_movement() {
    let mut rig = Rig::with_lines(SharedStore::default());
    assert_eq!(rig.ctl.state().calibration, CalibrationStatus::Uncalibrated);
    assert_eq!(rig.ctl.open(), CommandOutcome::Ignored(IgnoreReason::Uncalibrated));
    assert_eq!(
        rig.ctl.set_target_position(50.0).unwrap(),
        CommandOutcome::Ignored(IgnoreReason::Uncalibrated)
    );
    assert!(rig.ctl.stop().is_accepted());
    rig.steps(3);
    assert_eq!(rig.ctl.state().position_state, PositionState::Stopped);
    assert!(rig.handle().drives().iter().all(|(_, l)| *l == PinState::Low));
}

#[test]
fn out_of_range_target_leaves_state_unchanged() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 10_000));
    let before = rig.ctl.state();
    assert!(matches!(
        rig.ctl.set_target_position(150.0),
        Err(Error::InvalidArgument(InvalidArgument::PositionOutOfRange(p))) if p == 150.0
    ));
    rig.step();
    assert_eq!(rig.ctl.state(), before);
}

#[test]
fn position_state_requests_map_to_commands() {
    let mut rig = Rig::without_hardware(calibrated_store(10_000, 10_000));
    let cmd = CoverCommand::from_position_state(1).unwrap();
    assert!(rig.ctl.handle_command(cmd).unwrap().is_accepted());
    rig.step();
    assert_eq!(rig.ctl.state().position_state, PositionState::Opening);

    let stop = CoverCommand::from_position_state(2).unwrap();
    assert!(rig.ctl.handle_command(stop).unwrap().is_accepted());
    rig.step();
    assert_eq!(rig.ctl.state().position_state, PositionState::Stopped);
    assert!(CoverCommand::from_position_state(5).is_err());
}

// ── Hardware view and shutdown ────────────────────────────────

#[test]
fn hardware_absent_reports_empty_and_calibrated() {
    let rig = Rig::without_hardware(SharedStore::default());
    let hw = rig.ctl.hardware_state();
    assert_eq!(serde_json::to_string(&hw).unwrap(), "{}");
    assert_eq!(rig.ctl.state().calibration, CalibrationStatus::Calibrated);
    assert_eq!(rig.ctl.calibrate(), CommandOutcome::Ignored(IgnoreReason::NoHardware));
}

#[test]
fn hardware_state_reports_line_levels() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.open();
    rig.step();
    rig.handle().set_limiter(Line::CloseLimiter, true);

    let v = serde_json::to_value(rig.ctl.hardware_state()).unwrap();
    assert_eq!(v["motorOpen"], 1);
    assert_eq!(v["motorClose"], 0);
    assert_eq!(v["openLimiter"], 0);
    assert_eq!(v["closeLimiter"], 1);
}

#[test]
fn shutdown_drives_motors_low_and_releases_lines() {
    let mut rig = Rig::with_lines(calibrated_store(60_000, 60_000));
    rig.ctl.open();
    rig.step();
    assert!(rig.handle().motor_open());

    rig.ctl.shutdown();
    assert!(!rig.handle().motor_open() && !rig.handle().motor_close());
    assert_eq!(rig.handle().released().len(), Line::ALL.len());
    assert_eq!(rig.ctl.state().position_state, PositionState::Stopped);

    rig.ctl.shutdown();
    assert_eq!(rig.step(), None);
    assert!(!rig.handle().ever_both_high());
}
