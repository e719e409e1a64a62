//! IEC serial bus glue between GPIO pins and an emulated drive.
//!
//! A Raspberry Pi wired to the IEC cable stands in for a 1541 or 1581. Its
//! GPIO pins can only be inputs or outputs, while the bus is open-collector:
//! any device may pull a line low, nobody drives it high. Each cycle this
//! crate reconciles the sampled pins, the lines the drive pulls in software
//! and the drive chip's port B configuration into one logical bus state, then
//! projects the drive's pulls back onto the output pins.
//!
//! Components:
//!
//! - [`BusLineModel`]: sensed and pulled state of ATN, DATA, CLOCK, SRQ, RESET.
//! - [`ChipBridge`]: ATN transitions into the chip, port writes out of it.
//! - [`OutputDriver`]: pulls and indicators onto GPIO.
//! - [`InputDebouncer`]: front panel buttons and rotary encoder.
//!
//! [`BusContext`] owns all four for one drive session.

pub mod bridge;
pub mod chip;
pub mod config;
pub mod gpio;
pub mod input;
pub mod line;
pub mod output;
mod session;

pub use bridge::{ChipBridge, ChipOutputEvent, GateState};
pub use chip::{ChipHandle, ChipKind, ChipPortSnapshot, CiaPort, PortPin, SerialPort, ViaPort};
pub use config::{BusConfig, ConfigError, PinMap};
pub use gpio::{GpioBank, MockGpio, PinFunction};
pub use input::{Button, ButtonEvent, InputDebouncer, RotaryDirection};
pub use line::{BusLine, BusLineModel, IecLine};
pub use output::{OutputDriver, OutputFrame, OutputState};
pub use session::BusContext;
