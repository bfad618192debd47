//! Controller configuration.
//!
//! All tunable timing constants, the GPIO wiring and the persistence
//! location. Loaded once at startup from a JSON file; any field left out
//! of the file keeps its default.

use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::pins;

/// Core controller configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CoverConfig {
    // --- Timing ---
    /// Control loop period (milliseconds).
    pub tick_interval_ms: u64,
    /// Limiter readings are ignored for this long after any state change.
    pub limiter_grace_ms: u64,
    /// Minimum time after a state change or accepted command before a new
    /// movement command is honoured.
    pub command_dwell_ms: u64,
    /// Minimum time spent stopped before motion starts again.
    pub reversal_pause_ms: u64,
    /// Pause between calibration passes so the motor de-energises.
    pub calibration_settle_ms: u64,
    /// Full-travel duration assumed before the first calibration.
    pub default_travel_ms: u64,

    // --- Change detection ---
    /// Position delta (percent) that counts as an observable move.
    pub change_epsilon: f64,

    // --- Hardware ---
    pub gpio_chip: String,
    pub lines: LineOffsets,

    // --- Persistence ---
    /// Directory holding the key-value store.
    pub storage_dir: String,
    /// Key of the persisted calibration record.
    pub calibration_key: String,
}

/// GPIO offsets of the four lines on [`CoverConfig::gpio_chip`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LineOffsets {
    pub open_limiter: u32,
    pub close_limiter: u32,
    pub motor_open: u32,
    pub motor_close: u32,
}

impl Default for LineOffsets {
    fn default() -> Self {
        Self {
            open_limiter: pins::OPEN_LIMITER_LINE,
            close_limiter: pins::CLOSE_LIMITER_LINE,
            motor_open: pins::MOTOR_OPEN_LINE,
            motor_close: pins::MOTOR_CLOSE_LINE,
        }
    }
}

impl LineOffsets {
    pub fn offset(&self, line: pins::Line) -> u32 {
        match line {
            pins::Line::OpenLimiter => self.open_limiter,
            pins::Line::CloseLimiter => self.close_limiter,
            pins::Line::MotorOpen => self.motor_open,
            pins::Line::MotorClose => self.motor_close,
        }
    }
}

impl Default for CoverConfig {
    fn default() -> Self {
        Self {
            // Timing
            tick_interval_ms: 100, // 10 Hz
            limiter_grace_ms: 3_000,
            command_dwell_ms: 1_000,
            reversal_pause_ms: 500,
            calibration_settle_ms: 2_000,
            default_travel_ms: 60_000, // assume slow travel until calibrated

            change_epsilon: 0.1,

            gpio_chip: pins::GPIO_CHIP.to_string(),
            lines: LineOffsets::default(),

            storage_dir: "persist".to_string(),
            calibration_key: "cover_state".to_string(),
        }
    }
}

impl CoverConfig {
    /// Load from a JSON file. A missing file yields the defaults; a file
    /// that exists but does not parse or validate is an error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Config: {} not found, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        let cfg: Self = serde_json::from_str(&text).map_err(ConfigError::Parse)?;
        cfg.validate()?;
        info!("Config: loaded {}", path.display());
        Ok(cfg)
    }

    /// Range-check every field. Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(10..=1_000).contains(&self.tick_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "tickIntervalMs must be 10–1000",
            ));
        }
        if self.limiter_grace_ms > 30_000 {
            return Err(ConfigError::ValidationFailed(
                "limiterGraceMs must be at most 30000",
            ));
        }
        if self.command_dwell_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "commandDwellMs must be at most 10000",
            ));
        }
        if self.reversal_pause_ms > 10_000 {
            return Err(ConfigError::ValidationFailed(
                "reversalPauseMs must be at most 10000",
            ));
        }
        if self.calibration_settle_ms < self.reversal_pause_ms {
            return Err(ConfigError::ValidationFailed(
                "calibrationSettleMs must not be shorter than reversalPauseMs",
            ));
        }
        if !(1_000..=600_000).contains(&self.default_travel_ms) {
            return Err(ConfigError::ValidationFailed(
                "defaultTravelMs must be 1000–600000",
            ));
        }
        if !(self.change_epsilon > 0.0 && self.change_epsilon < 5.0) {
            return Err(ConfigError::ValidationFailed(
                "changeEpsilon must be within (0, 5)",
            ));
        }
        let l = &self.lines;
        let offsets = [l.open_limiter, l.close_limiter, l.motor_open, l.motor_close];
        for (i, a) in offsets.iter().enumerate() {
            if offsets[i + 1..].contains(a) {
                return Err(ConfigError::ValidationFailed(
                    "line offsets must be distinct",
                ));
            }
        }
        if self.calibration_key.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "calibrationKey must not be empty",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    Io(std::io::Error),
    /// The config file is not valid JSON for [`CoverConfig`].
    Parse(serde_json::Error),
    /// A field failed range validation.
    ValidationFailed(&'static str),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::Parse(e) => write!(f, "parse error: {}", e),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
