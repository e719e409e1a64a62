//! Per-session bus context and the per-cycle entry points.
//!
//! The enclosing emulation loop owns one [`BusContext`] for the lifetime of
//! a drive session and calls, each cycle:
//!
//! 1. one of the `read_*` methods: samples buttons, senses the bus and
//!    pushes ATN/DATA/CLOCK into the chip's port B inputs;
//! 2. after the chip has run, [`BusContext::port_output_changed`] whenever
//!    its port B output value changed;
//! 3. [`BusContext::refresh_outputs`] to drive the GPIO outputs.
//!
//! Skipping or reordering steps leaves the bus one cycle stale.

use log::{debug, info};

use crate::bridge::{ChipBridge, ChipOutputEvent};
use crate::chip::{ChipHandle, ChipKind, ChipPortSnapshot, CiaPort, PortPin, ViaPort};
use crate::config::{BusConfig, ConfigError};
use crate::gpio::GpioBank;
use crate::input::{Button, ButtonEvent, InputDebouncer, RotaryDirection, RotaryMapping};
use crate::line::{BusLineModel, IecLine};
use crate::output::{OutputDriver, OutputFrame, OutputState};

/// Bus, bridge, output and input state for one emulated drive session.
pub struct BusContext {
    config: BusConfig,
    lines: BusLineModel,
    bridge: ChipBridge,
    output: OutputDriver,
    input: InputDebouncer,
    led: bool,
    sound: bool,
    /// Level register from the most recent read.
    levels: u32,
}

impl BusContext {
    /// Create a session for the given drive variant (`None` = browse only).
    pub fn new(config: BusConfig, kind: Option<ChipKind>) -> Result<Self, ConfigError> {
        config.validate()?;
        info!(
            "IEC session: chip={kind:?} split_lines={} invert_in={} invert_out={}",
            config.split_lines, config.invert_inputs, config.invert_outputs
        );
        Ok(Self {
            lines: BusLineModel::new(config.invert_inputs, config.ignore_reset),
            bridge: ChipBridge::new(kind),
            output: OutputDriver::new(&config),
            input: InputDebouncer::new(config.repeat_thresholds),
            led: false,
            sound: false,
            levels: u32::MAX,
            config,
        })
    }

    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    #[must_use]
    pub fn lines(&self) -> &BusLineModel {
        &self.lines
    }

    #[must_use]
    pub fn bridge(&self) -> &ChipBridge {
        &self.bridge
    }

    /// Configure the output pins. Call once before the first cycle.
    pub fn init_outputs<G: GpioBank>(&self, gpio: &mut G) {
        self.output.init(gpio);
    }

    /// File browser cycle: all buttons, bus sensing, no chip.
    pub fn read_browse_mode<G: GpioBank>(&mut self, gpio: &mut G) -> Vec<ButtonEvent> {
        self.levels = gpio.read_levels();
        let events = self.input.sample_levels(
            self.levels,
            &self.config.pins.buttons,
            &Button::ALL,
            RotaryMapping::UpDown,
        );
        self.sense(IecLine::Atn);
        self.sense(IecLine::Data);
        self.sense(IecLine::Clock);
        self.sense_reset();
        events
    }

    /// Emulation-mode button scan on the levels from the latest read.
    pub fn read_buttons_emulation_mode(&mut self) -> Vec<ButtonEvent> {
        self.input.sample_levels(
            self.levels,
            &self.config.pins.buttons,
            &Button::EMULATION,
            RotaryMapping::NextPrev,
        )
    }

    /// 1541 cycle: sense the bus and feed VIA port B and CA1.
    pub fn read_emulation_1541<G: GpioBank>(&mut self, gpio: &mut G, via: &mut dyn ViaPort) {
        self.levels = gpio.read_levels();
        let mut chip = ChipHandle::Via(via);
        self.read_emulation(&mut chip);
    }

    /// 1581 cycle: emulation buttons, bus sensing including SRQ, feed CIA
    /// port B and FLAG.
    pub fn read_emulation_1581<G: GpioBank>(
        &mut self,
        gpio: &mut G,
        cia: &mut dyn CiaPort,
    ) -> Vec<ButtonEvent> {
        self.levels = gpio.read_levels();
        let events = self.read_buttons_emulation_mode();
        let mut chip = ChipHandle::Cia(cia);
        self.read_emulation(&mut chip);
        self.sense(IecLine::Srq);
        events
    }

    fn read_emulation(&mut self, chip: &mut ChipHandle<'_>) {
        self.bridge.attach(chip.kind());
        if self.sense(IecLine::Atn) {
            let atn = self.lines.asserted(IecLine::Atn);
            self.bridge.on_atn_transition(atn, Some(&mut *chip));
        }

        self.bridge.apply_atna_guard(chip.snapshot().direction_mask);
        self.sync_data_pull();

        self.sense(IecLine::Data);
        chip.set_port_input(PortPin::DataIn, self.lines.asserted(IecLine::Data));
        self.sense(IecLine::Clock);
        chip.set_port_input(PortPin::ClockIn, self.lines.asserted(IecLine::Clock));

        self.sense_reset();
    }

    /// Decode a chip port B write without committing it.
    ///
    /// Nothing changes until the event is passed to [`BusContext::apply`].
    #[must_use]
    pub fn on_port_output(&self, status: u8, port: Option<ChipPortSnapshot>) -> ChipOutputEvent {
        let atn = self.lines.asserted(IecLine::Atn);
        self.bridge.decode_port_output(status, atn, port)
    }

    /// Commit decoded pulls to the bridge and the line model.
    pub fn apply(&mut self, event: ChipOutputEvent) {
        self.bridge.commit(event);
        self.lines.set_pulled_low_by_chip_output(IecLine::Data, event.data_low);
        self.lines.set_pulled_low_by_chip_output(IecLine::Clock, event.clock_low);
        self.lines.set_pulled_low_by_drive(IecLine::Data, event.data_pulled());
    }

    /// Decode and commit a port B write.
    pub fn port_output_changed(
        &mut self,
        status: u8,
        port: Option<ChipPortSnapshot>,
    ) -> ChipOutputEvent {
        let event = self.on_port_output(status, port);
        self.apply(event);
        event
    }

    /// Drive the GPIO outputs from the current pulls and indicators.
    pub fn refresh_outputs<G: GpioBank>(&self, gpio: &mut G) -> OutputFrame {
        let state = OutputState {
            pull_data_low: self.lines.drive_pulling(IecLine::Data),
            pull_clock_low: self.lines.drive_pulling(IecLine::Clock),
            led: self.led,
            sound: self.sound,
        };
        self.output.refresh(&state, gpio)
    }

    pub fn set_led(&mut self, on: bool) {
        self.led = on;
    }

    pub fn set_sound(&mut self, on: bool) {
        self.sound = on;
    }

    /// Pull SRQ in software (1581 fast serial).
    pub fn set_srq_pulled(&mut self, pulled: bool) {
        self.lines.set_pulled_low_by_drive(IecLine::Srq, pulled);
    }

    /// RESET asserted on the bus and not ignored.
    #[must_use]
    pub fn resetting(&self) -> bool {
        self.lines.resetting()
    }

    /// Release every drive-side pull, as after a drive reset.
    pub fn reset(&mut self) {
        self.lines.release_all();
        self.bridge.reset();
    }

    /// Consume the pending rotary encoder direction.
    pub fn take_rotary(&mut self) -> Option<RotaryDirection> {
        self.input.take_rotary()
    }

    #[must_use]
    pub fn button_pressed(&self, button: Button) -> bool {
        self.input.pressed(button)
    }

    #[must_use]
    pub fn button_held(&self, button: Button) -> bool {
        self.input.held(button)
    }

    #[must_use]
    pub fn button_repeating(&self, button: Button) -> bool {
        self.input.repeating(button)
    }

    fn pin(&self, line: IecLine) -> u8 {
        let pins = &self.config.pins;
        match line {
            IecLine::Atn => pins.atn,
            IecLine::Data => pins.data,
            IecLine::Clock => pins.clock,
            IecLine::Srq => pins.srq,
            IecLine::Reset => pins.reset,
        }
    }

    fn sense(&mut self, line: IecLine) -> bool {
        let pin = self.pin(line);
        self.lines.sense_from_levels(line, self.levels, pin)
    }

    fn sense_reset(&mut self) {
        let was = self.lines.resetting();
        self.sense(IecLine::Reset);
        let now = self.lines.resetting();
        if was != now {
            info!("IEC RESET {}", if now { "asserted" } else { "released" });
        }
    }

    fn sync_data_pull(&mut self) {
        let data = self.lines.line(IecLine::Data);
        let pulled = self.bridge.gate().pull_data_low || data.pulled_low_by_chip_output;
        if data.pulled_low_by_drive != pulled {
            debug!("DATA drive pull {}", if pulled { "set" } else { "released" });
        }
        self.lines.set_pulled_low_by_drive(IecLine::Data, pulled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chip::fake::FakeChip;
    use crate::gpio::{MockGpio, PinFunction};

    const ALL_OUT: u8 = 0x1A;

    fn session(kind: Option<ChipKind>) -> (BusContext, MockGpio) {
        let ctx = BusContext::new(BusConfig::default(), kind).expect("default config is valid");
        let mut gpio = MockGpio::new();
        ctx.init_outputs(&mut gpio);
        (ctx, gpio)
    }

    fn port_write(ctx: &mut BusContext, chip: &mut FakeChip, status: u8) -> ChipOutputEvent {
        chip.output = status;
        let snapshot = ChipPortSnapshot {
            direction_mask: chip.ddr,
            output_value: status,
        };
        ctx.port_output_changed(status, Some(snapshot))
    }

    #[test]
    fn rejects_invalid_config() {
        let mut config = BusConfig::default();
        config.pins.clock = config.pins.data;
        assert!(BusContext::new(config, None).is_err());
    }

    #[test]
    fn atn_edge_reaches_via() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        let atn = ctx.config().pins.atn;

        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(via.atn_input.is_empty());

        gpio.set_external(atn, false);
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert_eq!(via.atn_input, vec![true]);
        assert!(via.input(PortPin::AtnIn));

        // No further edge, no further CA1 write
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert_eq!(via.atn_input.len(), 1);
    }

    #[test]
    fn gate_pulls_data_until_acknowledged() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        let pins = ctx.config().pins.clone();

        gpio.set_external(pins.atn, false);
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(ctx.lines().drive_pulling(IecLine::Data)); // ATNA=0, ATN=1

        ctx.refresh_outputs(&mut gpio);
        assert_eq!(gpio.function(pins.data), PinFunction::Output);

        port_write(&mut ctx, &mut via, 0x10); // ATNA=1 acknowledges
        assert!(!ctx.lines().drive_pulling(IecLine::Data));
        ctx.refresh_outputs(&mut gpio);
        assert_eq!(gpio.function(pins.data), PinFunction::Input);
    }

    #[test]
    fn forced_data_reads_asserted_on_port() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        port_write(&mut ctx, &mut via, 0x02); // DATA OUT
        ctx.read_emulation_1541(&mut gpio, &mut via); // Pin reads high
        assert!(via.input(PortPin::DataIn));
        assert!(ctx.lines().line(IecLine::Data).sensed_high);

        port_write(&mut ctx, &mut via, 0x00);
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(!via.input(PortPin::DataIn));
    }

    #[test]
    fn host_clock_reaches_port() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        gpio.set_external(ctx.config().pins.clock, false);
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(via.input(PortPin::ClockIn));
    }

    #[test]
    fn atna_to_input_drops_pull_next_cycle() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        port_write(&mut ctx, &mut via, 0x10); // ATNA=1, ATN released: XOR pulls
        assert!(ctx.lines().drive_pulling(IecLine::Data));

        via.ddr = 0x0A; // ATNA now input
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(!ctx.lines().drive_pulling(IecLine::Data));
    }

    #[test]
    fn cia_session_uses_flag_and_and_gate() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Cia8520));
        let mut cia = FakeChip::with_ddr(ALL_OUT);
        port_write(&mut ctx, &mut cia, 0x10);
        assert!(!ctx.lines().drive_pulling(IecLine::Data)); // 1 AND 0

        gpio.set_external(ctx.config().pins.atn, false);
        ctx.read_emulation_1581(&mut gpio, &mut cia);
        assert_eq!(cia.atn_input, vec![false]); // FLAG inverted
        assert!(ctx.lines().drive_pulling(IecLine::Data)); // 1 AND 1
    }

    #[test]
    fn srq_sensed_in_1581_mode() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Cia8520));
        let mut cia = FakeChip::with_ddr(ALL_OUT);
        gpio.set_external(ctx.config().pins.srq, false);
        ctx.read_emulation_1581(&mut gpio, &mut cia);
        assert!(ctx.lines().asserted(IecLine::Srq));

        ctx.set_srq_pulled(true);
        gpio.set_external(ctx.config().pins.srq, true);
        ctx.read_emulation_1581(&mut gpio, &mut cia);
        assert!(ctx.lines().line(IecLine::Srq).sensed_high);
        assert!(ctx.lines().asserted(IecLine::Srq));
    }

    #[test]
    fn reset_condition() {
        let (mut ctx, mut gpio) = session(None);
        gpio.set_external(ctx.config().pins.reset, false);
        ctx.read_browse_mode(&mut gpio);
        assert!(ctx.resetting());

        let config = BusConfig {
            ignore_reset: true,
            ..BusConfig::default()
        };
        let mut ignoring = BusContext::new(config, None).expect("valid");
        ignoring.read_browse_mode(&mut gpio);
        assert!(!ignoring.resetting());
    }

    #[test]
    fn browse_mode_buttons_and_rotary() {
        let config = BusConfig {
            repeat_thresholds: [1; 5],
            ..BusConfig::default()
        };
        let mut ctx = BusContext::new(config, None).expect("valid");
        let mut gpio = MockGpio::new();
        gpio.set_external(ctx.config().pins.buttons[Button::Up.index()], false);
        let events = ctx.read_browse_mode(&mut gpio);
        assert_eq!(events, vec![ButtonEvent::Pressed(Button::Up)]);
        assert!(ctx.button_pressed(Button::Up));
        assert_eq!(ctx.take_rotary(), Some(RotaryDirection::Up));
    }

    #[test]
    fn indicators_follow_setters() {
        let (mut ctx, mut gpio) = session(None);
        let pins = ctx.config().pins.clone();
        ctx.set_led(true);
        ctx.refresh_outputs(&mut gpio);
        assert!(gpio.latched(pins.led));
        assert!(!gpio.latched(pins.sound));
        ctx.set_led(false);
        ctx.set_sound(true);
        ctx.refresh_outputs(&mut gpio);
        assert!(!gpio.latched(pins.led));
        assert!(gpio.latched(pins.sound));
    }

    #[test]
    fn reset_releases_pulls() {
        let (mut ctx, _) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        port_write(&mut ctx, &mut via, 0x0A);
        assert!(ctx.lines().drive_pulling(IecLine::Clock));
        ctx.reset();
        assert!(!ctx.lines().drive_pulling(IecLine::Clock));
        assert!(!ctx.lines().drive_pulling(IecLine::Data));
        assert!(!ctx.bridge().atna_out());
    }

    #[test]
    fn gate_follows_chip_read_this_cycle() {
        // Built for a 1581 but driven as a 1541: the VIA's XOR gate applies.
        for kind in [Some(ChipKind::Cia8520), None] {
            let (mut ctx, mut gpio) = session(kind);
            let mut via = FakeChip::with_ddr(ALL_OUT);
            ctx.read_emulation_1541(&mut gpio, &mut via);
            assert_eq!(ctx.bridge().kind(), Some(ChipKind::Via6522));

            port_write(&mut ctx, &mut via, 0x10); // 1 XOR 0
            assert!(ctx.lines().drive_pulling(IecLine::Data), "{kind:?}");
        }

        // Built for a 1541 but driven as a 1581: AND gate.
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut cia = FakeChip::with_ddr(ALL_OUT);
        ctx.read_emulation_1581(&mut gpio, &mut cia);
        port_write(&mut ctx, &mut cia, 0x10); // 1 AND 0
        assert!(!ctx.lines().drive_pulling(IecLine::Data));
    }

    #[test]
    fn decoded_write_waits_for_apply() {
        let (mut ctx, mut gpio) = session(Some(ChipKind::Via6522));
        let mut via = FakeChip::with_ddr(ALL_OUT);
        ctx.read_emulation_1541(&mut gpio, &mut via);

        let port = ChipPortSnapshot {
            direction_mask: ALL_OUT,
            output_value: 0x10,
        };
        let event = ctx.on_port_output(0x10, Some(port));
        assert!(event.gate_pull);
        assert!(!ctx.bridge().gate().pull_data_low);
        assert!(!ctx.bridge().atna_out());

        // The next read must not pick the uncommitted pull up.
        ctx.read_emulation_1541(&mut gpio, &mut via);
        assert!(!ctx.lines().drive_pulling(IecLine::Data));
        ctx.refresh_outputs(&mut gpio);
        assert_eq!(gpio.function(ctx.config().pins.data), PinFunction::Input);

        ctx.apply(event);
        assert!(ctx.lines().drive_pulling(IecLine::Data));
        assert!(ctx.bridge().atna_out());
    }
}
