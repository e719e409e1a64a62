//! GPIO register access.
//!
//! The bank is 32 pins wide: one level register for reads, one function
//! select per pin, and write-one-to-set / write-one-to-clear output latches.
//! Accesses are memory-mapped and cannot fail.

/// Pin function select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinFunction {
    Input,
    Output,
}

/// Hardware register collaborator.
pub trait GpioBank {
    /// Read the level register (bit n = pin n high).
    fn read_levels(&mut self) -> u32;

    /// Select input or output for one pin.
    fn set_function(&mut self, pin: u8, function: PinFunction);

    /// Drive every pin in `mask` high.
    fn set_pins(&mut self, mask: u32);

    /// Drive every pin in `mask` low.
    fn clear_pins(&mut self, mask: u32);
}

/// One register write, in issue order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioWrite {
    Function(u8, PinFunction),
    Set(u32),
    Clear(u32),
}

/// In-memory GPIO bank.
///
/// Pins configured as outputs read back their latched level; input pins
/// read the externally supplied level. Every write is logged.
#[derive(Debug, Clone)]
pub struct MockGpio {
    /// Levels presented on the pins from outside.
    pub external: u32,
    latch: u32,
    outputs: u32,
    log: Vec<GpioWrite>,
}

impl MockGpio {
    /// All pins inputs, pulled high (every IEC line released, no button
    /// pressed).
    #[must_use]
    pub fn new() -> Self {
        Self {
            external: u32::MAX,
            latch: 0,
            outputs: 0,
            log: Vec::new(),
        }
    }

    /// Set the external level of one pin.
    pub fn set_external(&mut self, pin: u8, high: bool) {
        if high {
            self.external |= 1 << pin;
        } else {
            self.external &= !(1 << pin);
        }
    }

    /// Current function of a pin.
    #[must_use]
    pub fn function(&self, pin: u8) -> PinFunction {
        if self.outputs & (1 << pin) != 0 {
            PinFunction::Output
        } else {
            PinFunction::Input
        }
    }

    /// Latched output level of a pin.
    #[must_use]
    pub fn latched(&self, pin: u8) -> bool {
        self.latch & (1 << pin) != 0
    }

    /// Writes issued since the last [`take_log`](Self::take_log).
    pub fn take_log(&mut self) -> Vec<GpioWrite> {
        std::mem::take(&mut self.log)
    }
}

impl Default for MockGpio {
    fn default() -> Self {
        Self::new()
    }
}

impl GpioBank for MockGpio {
    fn read_levels(&mut self) -> u32 {
        (self.external & !self.outputs) | (self.latch & self.outputs)
    }

    fn set_function(&mut self, pin: u8, function: PinFunction) {
        match function {
            PinFunction::Output => self.outputs |= 1 << pin,
            PinFunction::Input => self.outputs &= !(1 << pin),
        }
        self.log.push(GpioWrite::Function(pin, function));
    }

    fn set_pins(&mut self, mask: u32) {
        self.latch |= mask;
        self.log.push(GpioWrite::Set(mask));
    }

    fn clear_pins(&mut self, mask: u32) {
        self.latch &= !mask;
        self.log.push(GpioWrite::Clear(mask));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inputs_read_external() {
        let mut gpio = MockGpio::new();
        gpio.set_external(4, false);
        assert_eq!(gpio.read_levels() & (1 << 4), 0);
        assert_ne!(gpio.read_levels() & (1 << 5), 0);
    }

    #[test]
    fn outputs_read_latch() {
        let mut gpio = MockGpio::new();
        gpio.set_function(7, PinFunction::Output);
        gpio.clear_pins(1 << 7);
        assert_eq!(gpio.read_levels() & (1 << 7), 0);
        gpio.set_pins(1 << 7);
        assert!(gpio.latched(7));
        gpio.set_function(7, PinFunction::Input);
        gpio.set_external(7, false);
        assert_eq!(gpio.read_levels() & (1 << 7), 0);
    }

    #[test]
    fn log_keeps_order() {
        let mut gpio = MockGpio::new();
        gpio.clear_pins(1);
        gpio.set_pins(2);
        assert_eq!(gpio.take_log(), vec![GpioWrite::Clear(1), GpioWrite::Set(2)]);
        assert!(gpio.take_log().is_empty());
    }
}
