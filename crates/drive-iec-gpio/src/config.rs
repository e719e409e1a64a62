//! Wiring and behaviour options, fixed for the duration of a session.

use thiserror::Error;

use crate::input::Button;

/// Invalid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("GPIO {pin} for {name} is outside the 32-pin bank")]
    PinOutOfRange { name: &'static str, pin: u8 },
    #[error("{first} and {second} are both assigned GPIO {pin}")]
    PinConflict {
        first: &'static str,
        second: &'static str,
        pin: u8,
    },
    #[error("repeat threshold for {button:?} is zero")]
    ZeroRepeatThreshold { button: Button },
}

/// GPIO assignment.
///
/// The bus inputs double as outputs in shared-pin mode. In split-pin mode
/// DATA and CLOCK are driven through `out_data`/`out_clock` instead.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinMap {
    pub atn: u8,
    pub data: u8,
    pub clock: u8,
    pub srq: u8,
    pub reset: u8,
    pub out_data: u8,
    pub out_clock: u8,
    pub led: u8,
    pub sound: u8,
    /// Indexed by [`Button::index`].
    pub buttons: [u8; 5],
}

impl Default for PinMap {
    fn default() -> Self {
        Self {
            atn: 2,
            data: 18,
            clock: 17,
            srq: 19,
            reset: 3,
            out_data: 6,
            out_clock: 5,
            led: 16,
            sound: 11,
            buttons: [27, 22, 23, 24, 25],
        }
    }
}

impl PinMap {
    fn assignments(&self, split_lines: bool) -> Vec<(&'static str, u8)> {
        let mut pins = vec![
            ("ATN", self.atn),
            ("DATA", self.data),
            ("CLOCK", self.clock),
            ("SRQ", self.srq),
            ("RESET", self.reset),
            ("LED", self.led),
            ("sound", self.sound),
        ];
        if split_lines {
            pins.push(("DATA out", self.out_data));
            pins.push(("CLOCK out", self.out_clock));
        }
        for button in Button::ALL {
            pins.push((button.name(), self.buttons[button.index()]));
        }
        pins
    }
}

/// Session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BusConfig {
    /// Bus inputs read high when asserted.
    pub invert_inputs: bool,
    /// Split-pin outputs are driven high to pull a line low.
    pub invert_outputs: bool,
    /// DATA and CLOCK have dedicated output pins.
    pub split_lines: bool,
    /// Never report RESET.
    pub ignore_reset: bool,
    /// Debounce threshold per button, indexed by [`Button::index`].
    pub repeat_thresholds: [u32; 5],
    pub pins: PinMap,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            invert_inputs: false,
            invert_outputs: true,
            split_lines: false,
            ignore_reset: false,
            repeat_thresholds: [4; 5],
            pins: PinMap::default(),
        }
    }
}

impl BusConfig {
    /// Check pin ranges, pin uniqueness and debounce thresholds.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pins = self.pins.assignments(self.split_lines);
        for (i, &(name, pin)) in pins.iter().enumerate() {
            if pin >= 32 {
                return Err(ConfigError::PinOutOfRange { name, pin });
            }
            if let Some(&(first, _)) = pins[..i].iter().find(|&&(_, other)| other == pin) {
                return Err(ConfigError::PinConflict {
                    first,
                    second: name,
                    pin,
                });
            }
        }
        for button in Button::ALL {
            if self.repeat_thresholds[button.index()] == 0 {
                return Err(ConfigError::ZeroRepeatThreshold { button });
            }
        }
        Ok(())
    }
}
