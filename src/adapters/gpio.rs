//! GPIO line adapters.
//!
//! Implements [`LinePort`] twice:
//!
//! - **[`GpiodLines`]** (feature `gpiod`, Linux only) talks to the GPIO
//!   character device. Each line is requested on its own so a single
//!   line can be released independently.
//! - **[`NoHardware`]** is the stub used whenever the chip or a line
//!   cannot be acquired. Reads are `Low`, writes and releases do nothing.
//!
//! [`acquire`] picks one of them exactly once at startup. The control loop
//! only ever asks [`LinePort::is_present`].

use embedded_hal::digital::PinState;
use log::warn;

use crate::app::ports::LinePort;
use crate::config::CoverConfig;
use crate::pins::Line;

/// Acquire the four lines described by `config`, or fall back to
/// [`NoHardware`].
pub fn acquire(config: &CoverConfig) -> Box<dyn LinePort> {
    #[cfg(all(feature = "gpiod", target_os = "linux"))]
    {
        match GpiodLines::open(config) {
            Ok(lines) => {
                log::info!("GPIO: acquired 4 lines on {}", config.gpio_chip);
                return Box::new(lines);
            }
            Err(e) => warn!("GPIO: {e}; running without hardware"),
        }
    }

    #[cfg(not(all(feature = "gpiod", target_os = "linux")))]
    warn!(
        "GPIO: {} (chip {}); running without hardware",
        crate::error::HardwareError::Unsupported,
        config.gpio_chip
    );

    Box::new(NoHardware)
}

// ---------------------------------------------------------------------------
// No-hardware stub
// ---------------------------------------------------------------------------

/// Line port used when no GPIO chip is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHardware;

impl LinePort for NoHardware {
    fn is_present(&self) -> bool {
        false
    }

    fn read_level(&mut self, _line: Line) -> PinState {
        PinState::Low
    }

    fn drive_level(&mut self, _line: Line, _level: PinState) {}

    fn release(&mut self, _line: Line) {}
}

// ---------------------------------------------------------------------------
// GPIO character device
// ---------------------------------------------------------------------------

#[cfg(all(feature = "gpiod", target_os = "linux"))]
pub use chardev::GpiodLines;

#[cfg(all(feature = "gpiod", target_os = "linux"))]
mod chardev {
    use embedded_hal::digital::PinState;
    use gpiod::{Chip, Input, Lines, Options, Output};
    use log::{info, warn};

    use crate::app::ports::LinePort;
    use crate::config::CoverConfig;
    use crate::error::HardwareError;
    use crate::pins::{CONSUMER, Line};

    /// The four lines, each held by its own request.
    pub struct GpiodLines {
        open_limiter: Option<Lines<Input>>,
        close_limiter: Option<Lines<Input>>,
        motor_open: Option<Lines<Output>>,
        motor_close: Option<Lines<Output>>,
        /// Last driven level of each output, indexed open/close.
        driven: [PinState; 2],
    }

    impl GpiodLines {
        /// Open the chip and request all four lines. Motor outputs start
        /// low. On any failure the requests made so far are dropped, which
        /// releases them.
        pub fn open(config: &CoverConfig) -> Result<Self, HardwareError> {
            let chip = Chip::new(&config.gpio_chip).map_err(|source| {
                HardwareError::ChipUnavailable {
                    chip: config.gpio_chip.clone(),
                    source,
                }
            })?;
            let offsets = &config.lines;

            let input = |offset: u32| {
                chip.request_lines(Options::input([offset]).consumer(CONSUMER))
                    .map_err(|source| HardwareError::LineRequest { offset, source })
            };
            let output = |offset: u32| {
                chip.request_lines(
                    Options::output([offset])
                        .values([false])
                        .consumer(CONSUMER),
                )
                .map_err(|source| HardwareError::LineRequest { offset, source })
            };

            let close_limiter = input(offsets.offset(Line::CloseLimiter))?;
            let open_limiter = input(offsets.offset(Line::OpenLimiter))?;
            let motor_open = output(offsets.offset(Line::MotorOpen))?;
            let motor_close = output(offsets.offset(Line::MotorClose))?;

            Ok(Self {
                open_limiter: Some(open_limiter),
                close_limiter: Some(close_limiter),
                motor_open: Some(motor_open),
                motor_close: Some(motor_close),
                driven: [PinState::Low; 2],
            })
        }

        fn output_mut(&mut self, line: Line) -> Option<(&mut Option<Lines<Output>>, usize)> {
            match line {
                Line::MotorOpen => Some((&mut self.motor_open, 0)),
                Line::MotorClose => Some((&mut self.motor_close, 1)),
                _ => None,
            }
        }
    }

    fn read_input(request: Option<&Lines<Input>>, line: Line) -> PinState {
        let Some(request) = request else {
            return PinState::Low;
        };
        match request.get_values([false; 1]) {
            Ok([high]) => PinState::from(high),
            Err(e) => {
                warn!("GPIO: read {} failed: {e}", line.name());
                PinState::Low
            }
        }
    }

    impl LinePort for GpiodLines {
        fn is_present(&self) -> bool {
            true
        }

        fn read_level(&mut self, line: Line) -> PinState {
            match line {
                Line::OpenLimiter => read_input(self.open_limiter.as_ref(), line),
                Line::CloseLimiter => read_input(self.close_limiter.as_ref(), line),
                Line::MotorOpen => self.driven[0],
                Line::MotorClose => self.driven[1],
            }
        }

        fn drive_level(&mut self, line: Line, level: PinState) {
            let Some((slot, idx)) = self.output_mut(line) else {
                return;
            };
            let Some(request) = slot.as_ref() else {
                return;
            };
            match request.set_values([level == PinState::High]) {
                Ok(()) => self.driven[idx] = level,
                Err(e) => warn!("GPIO: drive {} failed: {e}", line.name()),
            }
        }

        fn release(&mut self, line: Line) {
            if let Some((slot, idx)) = self.output_mut(line) {
                if let Some(request) = slot.take() {
                    if let Err(e) = request.set_values([false]) {
                        warn!("GPIO: could not drive {} low on release: {e}", line.name());
                    }
                    info!("GPIO: released {}", line.name());
                    self.driven[idx] = PinState::Low;
                }
                return;
            }
            let slot = match line {
                Line::OpenLimiter => &mut self.open_limiter,
                _ => &mut self.close_limiter,
            };
            if slot.take().is_some() {
                info!("GPIO: released {}", line.name());
            }
        }
    }
}
