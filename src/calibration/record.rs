//! Persisted calibration record.
//!
//! Stored as a flat JSON object under a single key of the
//! [`StoragePort`]:
//!
//! ```json
//! {"calibrated":true,"openTravelMs":41200,"closeTravelMs":39800}
//! ```
//!
//! Records written by older firmware used `openTime` / `closeTime`; both
//! spellings are accepted on load, only the new one is written.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::{StorageError, StoragePort};
use crate::app::state::Direction;

/// Calibrated travel times. Owned by the control loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CalibrationInfo {
    pub calibrated: bool,
    #[serde(alias = "openTime")]
    pub open_travel_ms: u64,
    #[serde(alias = "closeTime")]
    pub close_travel_ms: u64,
}

impl CalibrationInfo {
    /// Conservative default: uncalibrated, assume slow travel both ways.
    pub fn uncalibrated(default_travel_ms: u64) -> Self {
        Self {
            calibrated: false,
            open_travel_ms: default_travel_ms,
            close_travel_ms: default_travel_ms,
        }
    }

    /// Full-travel duration for one direction.
    pub fn travel_ms(&self, direction: Direction) -> u64 {
        match direction {
            Direction::Open => self.open_travel_ms,
            Direction::Close => self.close_travel_ms,
        }
    }

    /// Percent of full travel covered after `elapsed_ms` of motion in
    /// `direction`. Not clamped.
    pub fn travel_percent(&self, direction: Direction, elapsed_ms: u64) -> f64 {
        elapsed_ms as f64 * 100.0 / self.travel_ms(direction).max(1) as f64
    }

    /// Load the record stored under `key`.
    ///
    /// A missing, unreadable or corrupt record falls back to
    /// [`uncalibrated`](Self::uncalibrated); the failure is logged, never
    /// returned.
    pub fn load(store: &dyn StoragePort, key: &str, default_travel_ms: u64) -> Self {
        let fallback = Self::uncalibrated(default_travel_ms);
        let bytes = match store.get(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                info!("Calibration: no stored record, starting uncalibrated");
                return fallback;
            }
            Err(e) => {
                warn!("Calibration: record read failed ({}), starting uncalibrated", e);
                return fallback;
            }
        };
        match serde_json::from_slice::<Self>(&bytes) {
            Ok(info) if info.open_travel_ms > 0 && info.close_travel_ms > 0 => {
                info!(
                    "Calibration: loaded (calibrated={}, open={}ms, close={}ms)",
                    info.calibrated, info.open_travel_ms, info.close_travel_ms
                );
                info
            }
            Ok(_) => {
                warn!("Calibration: stored record has zero travel time, ignoring it");
                fallback
            }
            Err(e) => {
                warn!("Calibration: stored record corrupt ({}), ignoring it", e);
                fallback
            }
        }
    }

    /// Persist under `key`.
    pub fn save(&self, store: &mut dyn StoragePort, key: &str) -> Result<(), StorageError> {
        let bytes = serde_json::to_vec(self)
            .map_err(|e| StorageError::Io(std::io::Error::other(e)))?;
        store.set(key, &bytes)
    }
}
