//! Bridge between bus line transitions and the drive's interface chip.
//!
//! Two directions:
//!
//! - Bus to chip: an ATN transition is presented on port B ATN IN and on the
//!   variant's dedicated ATN input, and the ATNA gate is re-evaluated.
//! - Chip to bus: a port B output write is decoded into DATA/CLOCK pulls.
//!   The result is returned as a [`ChipOutputEvent`] for the session to
//!   apply, so the chip never mutates bus state from inside its own update.
//!
//! The ATNA gate (UD3 on the 1541) pulls DATA low whenever ATNA and ATN
//! disagree, which acknowledges ATN in hardware before the drive CPU
//! notices. The 1581 combines the same two signals with AND instead.

use log::{debug, trace};

use crate::chip::{ChipHandle, ChipKind, ChipPortSnapshot, GateFunction, PortPin};

/// Output of the ATNA gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GateState {
    pub pull_data_low: bool,
}

/// DATA/CLOCK pulls decoded from a chip port write.
///
/// Decoding has no side effects; the bus changes only once the event is
/// committed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChipOutputEvent {
    /// ATNA output bit as written.
    pub atna_out: bool,
    /// ATNA gate output.
    pub gate_pull: bool,
    /// DATA OUT wants DATA low (after the direction correction).
    pub data_low: bool,
    /// CLOCK OUT wants CLOCK low (after the direction correction).
    pub clock_low: bool,
}

impl ChipOutputEvent {
    /// Whether DATA is pulled by either the gate or the port.
    #[must_use]
    pub const fn data_pulled(&self) -> bool {
        self.gate_pull || self.data_low
    }
}

/// Port-to-bus translation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChipBridge {
    kind: Option<ChipKind>,
    /// Last ATNA output bit seen from the chip.
    atna_out: bool,
    gate: GateState,
}

impl ChipBridge {
    /// Create a bridge. `None` means no chip is attached yet (browse mode);
    /// the gate then falls back to AND and no direction checks apply.
    #[must_use]
    pub fn new(kind: Option<ChipKind>) -> Self {
        Self {
            kind,
            atna_out: false,
            gate: GateState::default(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> Option<ChipKind> {
        self.kind
    }

    #[must_use]
    pub fn gate(&self) -> GateState {
        self.gate
    }

    #[must_use]
    pub fn atna_out(&self) -> bool {
        self.atna_out
    }

    /// Record which chip is attached. The gate function follows it.
    pub fn attach(&mut self, kind: ChipKind) {
        if self.kind != Some(kind) {
            debug!("chip attached: {kind:?} (was {:?})", self.kind);
            self.kind = Some(kind);
        }
    }

    fn gate_function(&self) -> GateFunction {
        self.kind.map_or(GateFunction::And, ChipKind::gate_function)
    }

    /// Handle an ATN transition.
    ///
    /// Feeds ATN IN and the variant's ATN input, then recomputes the gate
    /// from the chip's current ATNA output bit. When ATNA is configured as
    /// an input the gate cannot pull DATA, so the result is forced false.
    pub fn on_atn_transition(
        &mut self,
        atn_asserted: bool,
        chip: Option<&mut ChipHandle<'_>>,
    ) -> GateState {
        let pull = match chip {
            Some(chip) => {
                self.attach(chip.kind());
                let port = chip.snapshot();
                self.atna_out = port.output_value & PortPin::Atna.mask() != 0;
                chip.set_port_input(PortPin::AtnIn, atn_asserted);
                chip.signal_atn(atn_asserted);
                port.is_output(PortPin::Atna)
                    && self.gate_function().apply(self.atna_out, atn_asserted)
            }
            None => self.gate_function().apply(self.atna_out, atn_asserted),
        };
        trace!("ATN {} atna={} gate={pull}", u8::from(atn_asserted), u8::from(self.atna_out));
        self.gate.pull_data_low = pull;
        self.gate
    }

    /// Decode a port B output write without changing any state.
    ///
    /// `port` is the chip's current port configuration, `None` when no chip
    /// is attached. A DATA OUT or CLOCK OUT pin configured as input reads as
    /// asserted on real hardware, so it is decoded as a pull. The 1541 board
    /// is where this was observed; it is applied to the 1581 CIA as well.
    #[must_use]
    pub fn decode_port_output(
        &self,
        status: u8,
        atn_asserted: bool,
        port: Option<ChipPortSnapshot>,
    ) -> ChipOutputEvent {
        let atna_out = status & PortPin::Atna.mask() != 0;
        let mut data_low = status & PortPin::DataOut.mask() != 0;
        let mut clock_low = status & PortPin::ClockOut.mask() != 0;

        let mut pull = self.gate_function().apply(atna_out, atn_asserted);

        if let Some(port) = port {
            if !port.is_output(PortPin::Atna) {
                pull = false;
            }
            if !port.is_output(PortPin::DataOut) {
                debug!("DATA OUT configured as input, reading as asserted");
                data_low = true;
            }
            if !port.is_output(PortPin::ClockOut) {
                debug!("CLOCK OUT configured as input, reading as asserted");
                clock_low = true;
            }
        }

        trace!("port out {status:#04X}: gate={pull} data={data_low} clock={clock_low}");
        ChipOutputEvent {
            atna_out,
            gate_pull: pull,
            data_low,
            clock_low,
        }
    }

    /// Take over the ATNA bit and gate result of a decoded write.
    pub fn commit(&mut self, event: ChipOutputEvent) {
        self.atna_out = event.atna_out;
        self.gate.pull_data_low = event.gate_pull;
    }

    /// Decode a port B output write and commit it.
    pub fn on_port_output(
        &mut self,
        status: u8,
        atn_asserted: bool,
        port: Option<ChipPortSnapshot>,
    ) -> ChipOutputEvent {
        let event = self.decode_port_output(status, atn_asserted, port);
        self.commit(event);
        event
    }

    /// Drop the gate pull if ATNA has been switched to an input.
    ///
    /// Some software (Maniac Mansion's loader) flips ATNA to input while the
    /// gate is active; a stale pull would then hold DATA low forever.
    /// Returns `true` if an active pull was cleared.
    pub fn apply_atna_guard(&mut self, direction_mask: u8) -> bool {
        if direction_mask & PortPin::Atna.mask() != 0 || !self.gate.pull_data_low {
            return false;
        }
        debug!("ATNA set to input, releasing gate pull on DATA");
        self.gate.pull_data_low = false;
        true
    }

    /// Forget the last port write and gate result.
    pub fn reset(&mut self) {
        self.atna_out = false;
        self.gate = GateState::default();
    }
}
