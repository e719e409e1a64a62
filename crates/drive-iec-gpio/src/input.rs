//! Front panel buttons and rotary encoder.
//!
//! Buttons short their GPIO to ground, so a pressed contact reads 0. Each
//! pin is debounced by requiring a run of identical samples before the
//! stable state changes; a held button then auto-repeats.
//!
//! A rotary encoder is wired across Up and Down: a detent produces an Up
//! press, and whether Down is held at that moment gives the direction.

/// Front panel button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Button {
    Enter,
    Up,
    Down,
    Back,
    Insert,
}

impl Button {
    pub const ALL: [Self; 5] = [Self::Enter, Self::Up, Self::Down, Self::Back, Self::Insert];

    /// Buttons sampled while a drive is being emulated.
    pub const EMULATION: [Self; 3] = [Self::Enter, Self::Up, Self::Down];

    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Enter => 0,
            Self::Up => 1,
            Self::Down => 2,
            Self::Back => 3,
            Self::Insert => 4,
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Enter => "Enter",
            Self::Up => "Up",
            Self::Down => "Down",
            Self::Back => "Back",
            Self::Insert => "Insert",
        }
    }
}

/// Debounced button event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Pressed(Button),
    Released(Button),
    Repeat(Button),
}

/// Direction decoded from the rotary encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotaryDirection {
    Up,
    Down,
    Next,
    Prev,
}

/// How an encoder detent is named in the current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotaryMapping {
    /// File browser: Up / Down.
    UpDown,
    /// Emulation: Next / Prev disk image.
    NextPrev,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transition {
    Pressed,
    Released,
    Repeat,
}

/// Debounce state for one contact. `true` means pressed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputPin {
    pub current_raw: bool,
    pub previous_raw: bool,
    /// Consecutive samples equal to `previous_raw`, including the latest.
    pub valid_streak: u32,
    /// Samples left until the next auto-repeat.
    pub repeat_counter: u32,
    pub repeat_threshold: u32,
    held: bool,
    pressed_edge: bool,
    repeat_edge: bool,
}

impl InputPin {
    #[must_use]
    pub fn new(repeat_threshold: u32) -> Self {
        Self {
            current_raw: false,
            previous_raw: false,
            valid_streak: 0,
            repeat_counter: 0,
            repeat_threshold,
            held: false,
            pressed_edge: false,
            repeat_edge: false,
        }
    }

    fn sample(&mut self, pressed: bool) -> Option<Transition> {
        self.pressed_edge = false;
        self.repeat_edge = false;
        self.current_raw = pressed;

        if pressed != self.previous_raw {
            self.previous_raw = pressed;
            self.valid_streak = 0;
        }
        self.valid_streak = self.valid_streak.saturating_add(1);

        if self.valid_streak == self.repeat_threshold && pressed != self.held {
            self.held = pressed;
            if pressed {
                self.pressed_edge = true;
                self.repeat_counter = self.repeat_threshold;
                return Some(Transition::Pressed);
            }
            return Some(Transition::Released);
        }

        if self.held && self.valid_streak > self.repeat_threshold {
            self.repeat_counter = self.repeat_counter.saturating_sub(1);
            if self.repeat_counter == 0 {
                self.repeat_counter = self.repeat_threshold;
                self.repeat_edge = true;
                return Some(Transition::Repeat);
            }
        }
        None
    }

    /// Debounced state.
    #[must_use]
    pub fn held(&self) -> bool {
        self.held
    }
}

/// Debouncer for all front panel buttons.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDebouncer {
    pins: [InputPin; 5],
    rotary: Option<RotaryDirection>,
}

impl InputDebouncer {
    #[must_use]
    pub fn new(repeat_thresholds: [u32; 5]) -> Self {
        Self {
            pins: repeat_thresholds.map(InputPin::new),
            rotary: None,
        }
    }

    /// Feed one raw sample. `raw_high` is the pin level; low means pressed.
    pub fn sample(&mut self, button: Button, raw_high: bool) -> Option<ButtonEvent> {
        self.pins[button.index()]
            .sample(!raw_high)
            .map(|transition| match transition {
                Transition::Pressed => ButtonEvent::Pressed(button),
                Transition::Released => ButtonEvent::Released(button),
                Transition::Repeat => ButtonEvent::Repeat(button),
            })
    }

    /// Sample `buttons` from a GPIO level register and decode the encoder.
    pub fn sample_levels(
        &mut self,
        levels: u32,
        pins: &[u8; 5],
        buttons: &[Button],
        mapping: RotaryMapping,
    ) -> Vec<ButtonEvent> {
        let events = buttons
            .iter()
            .filter_map(|&button| {
                let raw_high = levels & (1 << pins[button.index()]) != 0;
                self.sample(button, raw_high)
            })
            .collect();

        if self.pressed(Button::Up) {
            let down_held = self.held(Button::Down);
            self.rotary = Some(match (mapping, down_held) {
                (RotaryMapping::UpDown, true) => RotaryDirection::Down,
                (RotaryMapping::UpDown, false) => RotaryDirection::Up,
                (RotaryMapping::NextPrev, true) => RotaryDirection::Next,
                (RotaryMapping::NextPrev, false) => RotaryDirection::Prev,
            });
        }
        events
    }

    /// Became pressed on the latest sample.
    #[must_use]
    pub fn pressed(&self, button: Button) -> bool {
        self.pins[button.index()].pressed_edge
    }

    /// Auto-repeated on the latest sample.
    #[must_use]
    pub fn repeating(&self, button: Button) -> bool {
        self.pins[button.index()].repeat_edge
    }

    #[must_use]
    pub fn held(&self, button: Button) -> bool {
        self.pins[button.index()].held()
    }

    #[must_use]
    pub fn pin(&self, button: Button) -> &InputPin {
        &self.pins[button.index()]
    }

    /// Consume the pending encoder direction.
    pub fn take_rotary(&mut self) -> Option<RotaryDirection> {
        self.rotary.take()
    }
}
