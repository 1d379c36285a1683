// src/state/control.rs
//
// Named front-panel controls.
//
// Every slider on the panel is one variant here. Values are slider
// positions (0 = top), and each control has a fixed domain that the
// input side must respect before anything reaches the engine.

use std::fmt;

use crate::bus::LINE_COUNT;
use crate::error::{MuseError, Result};

/// Number of positions on the volume, tempo and pitch sliders.
pub const KNOB_POSITIONS: u8 = 50;

/// A single front-panel control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    /// START / RUN / OFF
    Transport,
    /// AUTO / HOLD / STEP
    Sequencing,
    /// REST / NORMAL
    Rest,
    Volume,
    Tempo,
    Pitch,
    IntervalA,
    IntervalB,
    IntervalC,
    IntervalD,
    ThemeW,
    ThemeX,
    ThemeY,
    ThemeZ,
}

impl Control {
    /// Every control, in panel order. A control's index here is its id.
    pub const ALL: [Control; 14] = [
        Control::Transport,
        Control::Sequencing,
        Control::Rest,
        Control::Volume,
        Control::Tempo,
        Control::Pitch,
        Control::IntervalA,
        Control::IntervalB,
        Control::IntervalC,
        Control::IntervalD,
        Control::ThemeW,
        Control::ThemeX,
        Control::ThemeY,
        Control::ThemeZ,
    ];

    /// The four interval switches, D last.
    pub const INTERVALS: [Control; 4] = [
        Control::IntervalA,
        Control::IntervalB,
        Control::IntervalC,
        Control::IntervalD,
    ];

    /// The four theme switches.
    pub const THEMES: [Control; 4] = [
        Control::ThemeW,
        Control::ThemeX,
        Control::ThemeY,
        Control::ThemeZ,
    ];

    /// Stable numeric id for bindings.
    pub fn id(self) -> u32 {
        Self::ALL
            .iter()
            .position(|c| *c == self)
            .map_or(0, |i| i as u32)
    }

    pub fn from_id(id: u32) -> Option<Self> {
        Self::ALL.get(id as usize).copied()
    }

    /// Number of positions on this control's slider.
    pub fn positions(self) -> u32 {
        match self {
            Control::Transport | Control::Sequencing => 3,
            Control::Rest => 2,
            Control::Volume | Control::Tempo | Control::Pitch => u32::from(KNOB_POSITIONS),
            _ => LINE_COUNT as u32,
        }
    }

    /// Check a raw value against the control's domain.
    pub fn validate(self, value: u32) -> Result<u8> {
        if value < self.positions() {
            Ok(value as u8)
        } else {
            Err(MuseError::InvalidControlValue {
                control: self,
                value,
            })
        }
    }

    /// Interval slot (0..4) if this is an interval switch.
    pub fn interval_slot(self) -> Option<usize> {
        Self::INTERVALS.iter().position(|c| *c == self)
    }

    /// Theme slot (0..4) if this is a theme switch.
    pub fn theme_slot(self) -> Option<usize> {
        Self::THEMES.iter().position(|c| *c == self)
    }

    /// Panel label.
    pub fn label(self) -> &'static str {
        match self {
            Control::Transport => "START/RUN/OFF",
            Control::Sequencing => "AUTO/HOLD/STEP",
            Control::Rest => "REST/NORMAL",
            Control::Volume => "VOLUME",
            Control::Tempo => "TEMPO",
            Control::Pitch => "PITCH",
            Control::IntervalA => "A",
            Control::IntervalB => "B",
            Control::IntervalC => "C",
            Control::IntervalD => "D",
            Control::ThemeW => "W",
            Control::ThemeX => "X",
            Control::ThemeY => "Y",
            Control::ThemeZ => "Z",
        }
    }
}

impl fmt::Display for Control {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}
