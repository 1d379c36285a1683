// src/transport.rs
//
// The two three-way switches at the top of the panel.

//
// ===============================
// MARK: START / RUN / OFF
// ===============================
//

/// Transport switch. START is momentary and springs back to RUN.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    Start,
    Run,
    #[default]
    Off,
}

impl RunMode {
    /// Slider position, top to bottom.
    pub fn position(self) -> u8 {
        match self {
            RunMode::Start => 0,
            RunMode::Run => 1,
            RunMode::Off => 2,
        }
    }

    pub fn from_position(position: u8) -> Option<Self> {
        match position {
            0 => Some(RunMode::Start),
            1 => Some(RunMode::Run),
            2 => Some(RunMode::Off),
            _ => None,
        }
    }

    /// Anything but OFF powers the oscillator.
    #[inline]
    pub fn is_on(self) -> bool {
        self != RunMode::Off
    }
}

//
// ===============================
// MARK: AUTO / HOLD / STEP
// ===============================
//

/// Sequencing switch. STEP is momentary and springs back to HOLD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutoMode {
    #[default]
    Auto,
    Hold,
    Step,
}

impl AutoMode {
    /// Slider position, top to bottom.
    pub fn position(self) -> u8 {
        match self {
            AutoMode::Auto => 0,
            AutoMode::Hold => 1,
            AutoMode::Step => 2,
        }
    }

    pub fn from_position(position: u8) -> Option<Self> {
        match position {
            0 => Some(AutoMode::Auto),
            1 => Some(AutoMode::Hold),
            2 => Some(AutoMode::Step),
            _ => None,
        }
    }
}
