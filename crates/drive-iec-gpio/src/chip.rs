//! Interface chip handles for the drive's serial port.
//!
//! Both supported drives wire the IEC bus to port B of an interface chip:
//!
//!   1541: VIA 6522 at $1800, ATN also on CA1 (edge-triggered latch)
//!   1581: CIA 8520 at $4000, ATN also on FLAG (level-sensitive input)
//!
//! Port B bit layout (identical on both drives):
//!
//! | Bit | Pin       | Direction | Meaning                                  |
//! |-----|-----------|-----------|------------------------------------------|
//! | 0   | DATA IN   | input     | 1 = DATA line low                        |
//! | 1   | DATA OUT  | output    | 1 = pull DATA low                        |
//! | 2   | CLOCK IN  | input     | 1 = CLOCK line low                       |
//! | 3   | CLOCK OUT | output    | 1 = pull CLOCK low                       |
//! | 4   | ATNA      | output    | ATN acknowledge, gated with ATN onto DATA |
//! | 7   | ATN IN    | input     | 1 = ATN line low                         |
//!
//! The chip emulations themselves live outside this crate. They expose a
//! narrow surface through [`SerialPort`] plus one variant-specific ATN
//! input ([`ViaPort::input_ca1`] or [`CiaPort::set_pin_flag`]).

/// Port B pins used by the serial interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PortPin {
    DataIn,
    DataOut,
    ClockIn,
    ClockOut,
    Atna,
    AtnIn,
}

impl PortPin {
    /// Bit mask of this pin within port B.
    #[must_use]
    pub const fn mask(self) -> u8 {
        match self {
            Self::DataIn => 0x01,
            Self::DataOut => 0x02,
            Self::ClockIn => 0x04,
            Self::ClockOut => 0x08,
            Self::Atna => 0x10,
            Self::AtnIn => 0x80,
        }
    }
}

/// Port B surface shared by both chip families.
pub trait SerialPort {
    /// Data direction register (1 = output).
    fn port_direction(&self) -> u8;

    /// Last value written to the output register.
    fn port_output(&self) -> u8;

    /// Drive an external input pin of the port.
    fn set_port_input(&mut self, pin: PortPin, level: bool);
}

/// VIA 6522 surface: ATN arrives on the CA1 edge latch.
pub trait ViaPort: SerialPort {
    fn input_ca1(&mut self, level: bool);
}

/// CIA 8520 surface: ATN arrives on the FLAG input.
pub trait CiaPort: SerialPort {
    fn set_pin_flag(&mut self, level: bool);
}

/// How the ATNA output combines with ATN to pull DATA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateFunction {
    Xor,
    And,
}

impl GateFunction {
    #[must_use]
    pub const fn apply(self, atna: bool, atn_asserted: bool) -> bool {
        match self {
            Self::Xor => atna != atn_asserted,
            Self::And => atna && atn_asserted,
        }
    }
}

/// Which primitive receives ATN transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AtnInput {
    /// Edge-triggered latch pin, fed the asserted level directly.
    EdgeLatch,
    /// Level-sensitive flag pin, fed the inverted level.
    LevelFlag,
}

impl AtnInput {
    /// Pin level to present for the given ATN state.
    #[must_use]
    pub const fn level(self, atn_asserted: bool) -> bool {
        match self {
            Self::EdgeLatch => atn_asserted,
            Self::LevelFlag => !atn_asserted,
        }
    }
}

/// Drive variant, selected once per session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChipKind {
    /// 1541: VIA 6522, XOR gate UD3.
    Via6522,
    /// 1581: CIA 8520, ATNA combined by AND.
    Cia8520,
}

impl ChipKind {
    #[must_use]
    pub const fn gate_function(self) -> GateFunction {
        match self {
            Self::Via6522 => GateFunction::Xor,
            Self::Cia8520 => GateFunction::And,
        }
    }

    #[must_use]
    pub const fn atn_input(self) -> AtnInput {
        match self {
            Self::Via6522 => AtnInput::EdgeLatch,
            Self::Cia8520 => AtnInput::LevelFlag,
        }
    }
}

/// Read-only view of the chip's port B.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipPortSnapshot {
    pub direction_mask: u8,
    pub output_value: u8,
}

impl ChipPortSnapshot {
    /// Whether the pin is configured as an output.
    #[must_use]
    pub const fn is_output(&self, pin: PortPin) -> bool {
        self.direction_mask & pin.mask() != 0
    }
}

/// Borrowed handle to whichever chip is attached this cycle.
pub enum ChipHandle<'a> {
    Via(&'a mut dyn ViaPort),
    Cia(&'a mut dyn CiaPort),
}

impl ChipHandle<'_> {
    #[must_use]
    pub fn kind(&self) -> ChipKind {
        match self {
            Self::Via(_) => ChipKind::Via6522,
            Self::Cia(_) => ChipKind::Cia8520,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> ChipPortSnapshot {
        let (direction_mask, output_value) = match self {
            Self::Via(via) => (via.port_direction(), via.port_output()),
            Self::Cia(cia) => (cia.port_direction(), cia.port_output()),
        };
        ChipPortSnapshot {
            direction_mask,
            output_value,
        }
    }

    pub fn set_port_input(&mut self, pin: PortPin, level: bool) {
        match self {
            Self::Via(via) => via.set_port_input(pin, level),
            Self::Cia(cia) => cia.set_port_input(pin, level),
        }
    }

    /// Present an ATN level on the variant's dedicated ATN input.
    pub fn signal_atn(&mut self, atn_asserted: bool) {
        let level = self.kind().atn_input().level(atn_asserted);
        match self {
            Self::Via(via) => via.input_ca1(level),
            Self::Cia(cia) => cia.set_pin_flag(level),
        }
    }
}

#[cfg(test)]
pub(crate) mod fake {
    //! Minimal chip doubles recording what the bridge drove.

    use super::{CiaPort, PortPin, SerialPort, ViaPort};

    #[derive(Debug, Default)]
    pub struct FakeChip {
        pub ddr: u8,
        pub output: u8,
        pub external: u8,
        pub atn_input: Vec<bool>,
    }

    impl FakeChip {
        pub fn with_ddr(ddr: u8) -> Self {
            Self {
                ddr,
                ..Self::default()
            }
        }

        pub fn input(&self, pin: PortPin) -> bool {
            self.external & pin.mask() != 0
        }
    }

    impl SerialPort for FakeChip {
        fn port_direction(&self) -> u8 {
            self.ddr
        }

        fn port_output(&self) -> u8 {
            self.output
        }

        fn set_port_input(&mut self, pin: PortPin, level: bool) {
            if level {
                self.external |= pin.mask();
            } else {
                self.external &= !pin.mask();
            }
        }
    }

    impl ViaPort for FakeChip {
        fn input_ca1(&mut self, level: bool) {
            self.atn_input.push(level);
        }
    }

    impl CiaPort for FakeChip {
        fn set_pin_flag(&mut self, level: bool) {
            self.atn_input.push(level);
        }
    }
}
