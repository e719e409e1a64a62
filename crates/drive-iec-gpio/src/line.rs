//! IEC bus line state as seen from the drive side of the GPIO header.
//!
//! Five open-collector lines: ATN, DATA, CLOCK, SRQ, RESET. A line reads
//! high only when nobody pulls it low. The host pulls through the cable;
//! the drive pulls either through a chip port output (DATA OUT, CLOCK OUT)
//! or through the ATNA gate that auto-acknowledges ATN on DATA.
//!
//! A GPIO pin is either an input or an output, never both. While the drive
//! holds DATA or CLOCK low the pin cannot be sampled, so the hardware sample
//! is replaced by "released" and the drive's own pull supplies the low
//! level. The resulting logical state is the wired-AND of every puller.
//!
//! Polarity: GPIO level registers report the raw pin. Depending on the
//! board wiring the raw level is either the bus level (asserted = 0) or its
//! inverse (asserted = 1). `sense_level` folds the configured inversion
//! into a single "asserted" boolean.

/// One of the five IEC bus signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IecLine {
    Atn,
    Data,
    Clock,
    Srq,
    Reset,
}

impl IecLine {
    /// Every line, in storage order.
    pub const ALL: [Self; 5] = [Self::Atn, Self::Data, Self::Clock, Self::Srq, Self::Reset];

    const fn index(self) -> usize {
        match self {
            Self::Atn => 0,
            Self::Data => 1,
            Self::Clock => 2,
            Self::Srq => 3,
            Self::Reset => 4,
        }
    }
}

/// Normalise a raw pin level to "line asserted" (pulled low on the bus).
///
/// Without inversion a low pin means asserted. With inversion a high pin
/// means asserted. Pure function of its inputs.
#[must_use]
pub const fn sense_level(raw_high: bool, invert_inputs: bool) -> bool {
    raw_high == invert_inputs
}

/// Per-line state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusLine {
    /// Last sampled level, polarity normalised. Forced high while the
    /// drive holds the pin as an output.
    pub sensed_high: bool,
    /// Drive asserts the line in software (ATNA gate for DATA, fast serial
    /// for SRQ).
    pub pulled_low_by_drive: bool,
    /// Drive asserts the line through a chip port output bit.
    pub pulled_low_by_chip_output: bool,
}

impl BusLine {
    const RELEASED: Self = Self {
        sensed_high: true,
        pulled_low_by_drive: false,
        pulled_low_by_chip_output: false,
    };

    /// Whether the drive itself is pulling this line for any reason.
    #[must_use]
    pub const fn drive_pulling(&self) -> bool {
        self.pulled_low_by_drive || self.pulled_low_by_chip_output
    }

    /// Effective wired-AND level: high only if nobody pulls low.
    #[must_use]
    pub const fn is_high(&self) -> bool {
        self.sensed_high && !self.drive_pulling()
    }

    /// Inverse of [`is_high`](Self::is_high).
    #[must_use]
    pub const fn asserted(&self) -> bool {
        !self.is_high()
    }
}

impl Default for BusLine {
    fn default() -> Self {
        Self::RELEASED
    }
}

/// Logical state of all five lines plus the RESET condition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusLineModel {
    lines: [BusLine; 5],
    invert_inputs: bool,
    ignore_reset: bool,
    resetting: bool,
}

impl BusLineModel {
    /// Create a model with every line released.
    #[must_use]
    pub fn new(invert_inputs: bool, ignore_reset: bool) -> Self {
        Self {
            lines: [BusLine::RELEASED; 5],
            invert_inputs,
            ignore_reset,
            resetting: false,
        }
    }

    /// State of one line.
    #[must_use]
    pub fn line(&self, line: IecLine) -> BusLine {
        self.lines[line.index()]
    }

    /// Whether the line is asserted (low) after wired-AND resolution.
    #[must_use]
    pub fn asserted(&self, line: IecLine) -> bool {
        self.line(line).asserted()
    }

    /// Whether the drive is currently pulling the line.
    #[must_use]
    pub fn drive_pulling(&self, line: IecLine) -> bool {
        self.line(line).drive_pulling()
    }

    /// Sample a line from its raw pin level.
    ///
    /// ATN and RESET are always read from hardware. DATA, CLOCK and SRQ are
    /// read only while the drive is not pulling them; otherwise the sample
    /// is forced to released because the pin is configured as an output.
    ///
    /// Returns `true` when the effective level changed. Calling again with
    /// the same raw level leaves the state untouched and returns `false`.
    pub fn sense(&mut self, line: IecLine, raw_high: bool) -> bool {
        let before = self.lines[line.index()].asserted();
        let forced = matches!(line, IecLine::Data | IecLine::Clock | IecLine::Srq)
            && self.drive_pulling(line);
        let state = &mut self.lines[line.index()];
        state.sensed_high = forced || !sense_level(raw_high, self.invert_inputs);
        if line == IecLine::Reset {
            self.resetting = !self.ignore_reset && state.asserted();
        }
        before != self.lines[line.index()].asserted()
    }

    /// Sample a line from a full GPIO level register.
    pub fn sense_from_levels(&mut self, line: IecLine, levels: u32, pin: u8) -> bool {
        self.sense(line, levels & (1 << pin) != 0)
    }

    /// RESET condition: asserted on the bus and not ignored by configuration.
    #[must_use]
    pub fn resetting(&self) -> bool {
        self.resetting
    }

    /// Set the software pull flag for a line.
    ///
    /// Only DATA (ATNA gate) and SRQ (fast serial) have a software pull.
    /// CLOCK is only ever pulled through the chip port; ATN and RESET are
    /// never driven. The call is ignored for those.
    pub fn set_pulled_low_by_drive(&mut self, line: IecLine, pulled: bool) {
        if matches!(line, IecLine::Data | IecLine::Srq) {
            self.lines[line.index()].pulled_low_by_drive = pulled;
        }
    }

    /// Set the chip-output pull flag for DATA or CLOCK.
    pub fn set_pulled_low_by_chip_output(&mut self, line: IecLine, pulled: bool) {
        if matches!(line, IecLine::Data | IecLine::Clock) {
            self.lines[line.index()].pulled_low_by_chip_output = pulled;
        }
    }

    /// Release every drive-side pull (session reset).
    pub fn release_all(&mut self) {
        for state in &mut self.lines {
            state.pulled_low_by_drive = false;
            state.pulled_low_by_chip_output = false;
        }
    }
}

impl Default for BusLineModel {
    fn default() -> Self {
        Self::new(false, false)
    }
}
