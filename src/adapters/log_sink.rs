//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by rendering each [`CoverEvent`] as a single
//! log line. A home-automation or MQTT adapter would implement the same
//! trait.

use log::{error, info};

use crate::app::events::{CoverEvent, StopReason};
use crate::app::ports::EventSink;

/// Adapter that logs every [`CoverEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &CoverEvent) {
        match event {
            CoverEvent::StateChanged { from, to, position } => {
                info!("STATE | {:?} -> {:?} at {:.1}%", from, to, position);
            }
            CoverEvent::Stopped { reason, position } => {
                let why = match reason {
                    StopReason::Requested => "stop requested".to_string(),
                    StopReason::TargetReached => "target reached".to_string(),
                    StopReason::Limiter(d) => format!("{d:?} limiter"),
                    StopReason::LimiterOverride(d) => format!("{d:?} limiter override"),
                    StopReason::Reversal => "reversal".to_string(),
                    StopReason::Shutdown => "shutdown".to_string(),
                };
                info!("STOP  | {} at {:.1}%", why, position);
            }
            CoverEvent::CalibrationStarted => {
                info!("CALIB | started");
            }
            CoverEvent::CalibrationStep { from, to } => {
                info!("CALIB | {:?} -> {:?}", from, to);
            }
            CoverEvent::CalibrationFinished {
                open_travel_ms,
                close_travel_ms,
            } => {
                info!(
                    "CALIB | finished, open={}ms close={}ms",
                    open_travel_ms, close_travel_ms
                );
            }
            CoverEvent::PersistFailed(e) => {
                error!("CALIB | record not saved: {}", e);
            }
        }
    }
}
