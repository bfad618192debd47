//! Port traits: the hexagonal boundary between the control loop and the
//! outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CoverService (domain)
//! ```
//!
//! Driven adapters (GPIO lines, key-value store, clock, event sink)
//! implement these traits. [`CoverService`](super::service::CoverService)
//! holds them as trait objects chosen once at construction, so the tick
//! never branches on which implementation it talks to.

use embedded_hal::digital::PinState;

use crate::pins::Line;

// ───────────────────────────────────────────────────────────────
// Line port (limiter inputs, motor outputs)
// ───────────────────────────────────────────────────────────────

/// Minimal digital-line capability.
///
/// Every call is synchronous and must return promptly; the tick runs
/// these on its own thread every 100 ms. Implementations never fail
/// outward: I/O problems are logged and reads fall back to `Low`.
pub trait LinePort: Send {
    /// Whether real hardware backs this port.
    fn is_present(&self) -> bool;

    /// Current logic level of `line`. For outputs, the last driven level.
    fn read_level(&mut self, line: Line) -> PinState;

    /// Drive an output line. Ignored for inputs.
    fn drive_level(&mut self, line: Line, level: PinState);

    /// Give the line back to the system. Idempotent.
    fn release(&mut self, line: Line);
}

// ───────────────────────────────────────────────────────────────
// Storage port (opaque key-value persistence)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage holding the calibration record.
///
/// Writes MUST be atomic: a power loss mid-write leaves either the old
/// or the new value.
pub trait StoragePort: Send {
    /// Read a value. `Ok(None)` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Write a value atomically, replacing any previous one.
    fn set(&mut self, key: &str, data: &[u8]) -> Result<(), StorageError>;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Monotonic millisecond clock. The origin is arbitrary.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (domain → logging / telemetry)
// ───────────────────────────────────────────────────────────────

/// The control loop emits structured
/// [`CoverEvent`](super::events::CoverEvent)s through this port.
pub trait EventSink: Send {
    fn emit(&mut self, event: &super::events::CoverEvent);
}

// ───────────────────────────────────────────────────────────────
// Error types
// ───────────────────────────────────────────────────────────────

/// Errors from [`StoragePort`] operations.
#[derive(Debug)]
pub enum StorageError {
    /// Generic I/O error from the storage backend.
    Io(std::io::Error),
    /// The key contains characters the backend cannot store.
    InvalidKey(String),
}

impl core::fmt::Display for StorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {}", e),
            Self::InvalidKey(key) => write!(f, "invalid key '{}'", key),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<std::io::Error> for StorageError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}
