//! Projection of drive-side pulls and indicators onto GPIO outputs.
//!
//! Two wirings:
//!
//! - Shared pins: DATA and CLOCK are sensed and driven on the same GPIO.
//!   Releasing a line means switching the pin back to input so the bus
//!   pull-up wins; pulling means switching it to output with the latch low.
//! - Split pins: DATA and CLOCK each have a dedicated output driving a
//!   transistor. The level alone encodes the pull, and `invert_outputs`
//!   selects whether a pull is a high or a low level.
//!
//! LED and sound are plain level outputs in both wirings.

use crate::config::BusConfig;
use crate::gpio::{GpioBank, PinFunction};

/// What the drive wants on the outputs this cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputState {
    pub pull_data_low: bool,
    pub pull_clock_low: bool,
    pub led: bool,
    pub sound: bool,
}

/// Register writes for one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputFrame {
    pub set: u32,
    pub clear: u32,
    /// Function selects for DATA and CLOCK in shared-pin mode.
    pub functions: Option<[(u8, PinFunction); 2]>,
}

/// Output pin driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputDriver {
    split_lines: bool,
    invert_outputs: bool,
    data_pin: u8,
    clock_pin: u8,
    led_pin: u8,
    sound_pin: u8,
}

impl OutputDriver {
    #[must_use]
    pub fn new(config: &BusConfig) -> Self {
        let pins = &config.pins;
        let (data_pin, clock_pin) = if config.split_lines {
            (pins.out_data, pins.out_clock)
        } else {
            (pins.data, pins.clock)
        };
        Self {
            split_lines: config.split_lines,
            invert_outputs: config.invert_outputs,
            data_pin,
            clock_pin,
            led_pin: pins.led,
            sound_pin: pins.sound,
        }
    }

    /// Compute the writes for `state` without touching hardware.
    #[must_use]
    pub fn frame(&self, state: &OutputState) -> OutputFrame {
        let mut set: u32 = 0;
        let mut clear: u32 = 0;
        let mut functions = None;

        let data: u32 = 1 << self.data_pin;
        let clock: u32 = 1 << self.clock_pin;

        if self.split_lines {
            let mut pulled = 0;
            let mut released = 0;
            if state.pull_data_low {
                pulled |= data;
            } else {
                released |= data;
            }
            if state.pull_clock_low {
                pulled |= clock;
            } else {
                released |= clock;
            }
            if self.invert_outputs {
                set |= pulled;
                clear |= released;
            } else {
                set |= released;
                clear |= pulled;
            }
        } else {
            let function = |pull: bool| {
                if pull {
                    PinFunction::Output
                } else {
                    PinFunction::Input
                }
            };
            functions = Some([
                (self.data_pin, function(state.pull_data_low)),
                (self.clock_pin, function(state.pull_clock_low)),
            ]);
        }

        if state.led {
            set |= 1 << self.led_pin;
        } else {
            clear |= 1 << self.led_pin;
        }
        if state.sound {
            set |= 1 << self.sound_pin;
        } else {
            clear |= 1 << self.sound_pin;
        }

        OutputFrame {
            set,
            clear,
            functions,
        }
    }

    /// Write `state` to the pins: function selects, then clear, then set.
    pub fn refresh<G: GpioBank>(&self, state: &OutputState, gpio: &mut G) -> OutputFrame {
        let frame = self.frame(state);
        if let Some(functions) = frame.functions {
            for (pin, function) in functions {
                gpio.set_function(pin, function);
            }
        }
        gpio.clear_pins(frame.clear);
        gpio.set_pins(frame.set);
        frame
    }

    /// Configure output pins and park the bus lines released.
    ///
    /// In shared-pin mode the DATA/CLOCK latches are cleared once so that
    /// switching those pins to output later drives them low.
    pub fn init<G: GpioBank>(&self, gpio: &mut G) {
        gpio.set_function(self.led_pin, PinFunction::Output);
        gpio.set_function(self.sound_pin, PinFunction::Output);
        if self.split_lines {
            gpio.set_function(self.data_pin, PinFunction::Output);
            gpio.set_function(self.clock_pin, PinFunction::Output);
        } else {
            gpio.set_function(self.data_pin, PinFunction::Input);
            gpio.set_function(self.clock_pin, PinFunction::Input);
            gpio.clear_pins((1 << self.data_pin) | (1 << self.clock_pin));
        }
        self.refresh(&OutputState::default(), gpio);
    }
}
