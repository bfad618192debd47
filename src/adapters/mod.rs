//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements  | Connects to                     |
//! |------------|-------------|---------------------------------|
//! | `gpio`     | LinePort    | GPIO character device / stub    |
//! | `log_sink` | EventSink   | `log` facade                    |
//! | `persist`  | StoragePort | Files in a directory / memory   |
//! | `time`     | Clock       | `std::time::Instant` / manual   |

pub mod gpio;
pub mod log_sink;
pub mod persist;
pub mod time;
