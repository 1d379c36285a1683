// src/state/panel.rs
//
// Front panel state.
//
// The panel holds the switch and slider positions that are not part of
// the patch: transport, sequencing, volume, tempo and pitch.

use crate::transport::{AutoMode, RunMode};

/// Slider positions outside the patch matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Panel {
    /// START / RUN / OFF
    pub transport: RunMode,

    /// AUTO / HOLD / STEP
    pub sequencing: AutoMode,

    /// 0 (loud) to 49 (silent)
    pub volume: u8,

    /// 0 (fast) to 49 (slow)
    pub tempo: u8,

    /// 0 (high) to 49 (low)
    pub pitch: u8,
}

impl Panel {
    pub fn new() -> Self {
        Self {
            transport: RunMode::Off,
            sequencing: AutoMode::Auto,
            volume: 20,
            tempo: 25,
            pitch: 33,
        }
    }

    /// Output gain, 0.0 to 0.49. Silent while the transport is OFF.
    pub fn gain(&self) -> f32 {
        if self.transport.is_on() {
            0.01 * f32::from(49 - self.volume.min(49))
        } else {
            0.0
        }
    }
}

impl Default for Panel {
    fn default() -> Self {
        Self::new()
    }
}
