//! Unified error types for the pool cover controller.
//!
//! Only a handful of conditions ever reach a caller: an out-of-range
//! target, a storage or configuration failure, or a hardware line that
//! could not be acquired. Rejected commands (dwell window, calibration in
//! progress) are not errors; they come back as
//! [`CommandOutcome::Ignored`](crate::app::service::CommandOutcome).

use core::fmt;

use crate::app::ports::StorageError;
use crate::config::ConfigError;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum Error {
    /// A command argument was outside its valid range.
    InvalidArgument(InvalidArgument),
    /// The key-value store failed.
    Storage(StorageError),
    /// Hardware lines could not be acquired.
    Hardware(HardwareError),
    /// Configuration is invalid or could not be loaded.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(e) => write!(f, "invalid argument: {e}"),
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Hardware(e) => write!(f, "hardware: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Invalid arguments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvalidArgument {
    /// Target position outside 0–100.
    PositionOutOfRange(f64),
    /// Position-state code other than 0 (closing), 1 (opening), 2 (stopped).
    UnknownPositionState(i64),
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PositionOutOfRange(p) => {
                write!(f, "position must be between 0 and 100, got {p}")
            }
            Self::UnknownPositionState(n) => write!(f, "invalid position state {n}"),
        }
    }
}

impl From<InvalidArgument> for Error {
    fn from(e: InvalidArgument) -> Self {
        Self::InvalidArgument(e)
    }
}

// ---------------------------------------------------------------------------
// Hardware errors
// ---------------------------------------------------------------------------

/// Raised while acquiring lines. Never surfaces from the tick: the
/// acquisition path turns it into the no-hardware stub.
#[derive(Debug)]
pub enum HardwareError {
    /// The GPIO chip could not be opened.
    ChipUnavailable { chip: String, source: std::io::Error },
    /// A single line could not be requested.
    LineRequest { offset: u32, source: std::io::Error },
    /// Built without GPIO support, or not running on Linux.
    Unsupported,
}

impl fmt::Display for HardwareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChipUnavailable { chip, source } => {
                write!(f, "cannot open GPIO chip '{chip}': {source}")
            }
            Self::LineRequest { offset, source } => {
                write!(f, "cannot request GPIO line {offset}: {source}")
            }
            Self::Unsupported => write!(f, "GPIO support not available on this build"),
        }
    }
}

impl From<HardwareError> for Error {
    fn from(e: HardwareError) -> Self {
        Self::Hardware(e)
    }
}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
