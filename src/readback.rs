// src/readback.rs
//
// Snapshot of an instrument for render and audio adapters.

use crate::bus::LineIndex;
use crate::decoder::{self, Pitch};
use crate::error::Result;
use crate::muse::Muse;
use crate::transport::{AutoMode, RunMode};

/// Everything a panel renderer or an oscillator needs for one frame.
///
/// Values only; holding a readback never keeps the instrument borrowed.
#[derive(Debug, Clone, PartialEq)]
pub struct Readback {
    /// Bus lamps, line `i` at bit `i`.
    pub lamps: u64,
    /// Note address DCBA, shown on the light-show lamps.
    pub light_show: u8,
    /// Current note, `None` for a rest.
    pub pitch: Option<Pitch>,
    /// Oscillator frequency (0 for a rest).
    pub frequency_hz: f64,
    /// Oscillator gain (0 when the transport is OFF).
    pub gain: f32,
    pub clock: u8,
    pub divide_by_six: u32,
    pub shift_register: u32,
    pub transport: RunMode,
    pub sequencing: AutoMode,
    /// Whether a periodic timer should be running for this instance.
    pub timer_armed: bool,
    /// Raw follower mode (0 independent, 1 unison, N divide).
    pub slave_mode: u32,
    pub followers: usize,
}

impl Readback {
    pub fn capture(muse: &Muse) -> Result<Self> {
        let engine = muse.engine();
        let bus = engine.bus();
        let panel = muse.panel();
        let pitch = engine.decode_pitch()?;

        Ok(Self {
            lamps: bus.lamps(),
            light_show: engine.decode_address()?,
            pitch,
            frequency_hz: decoder::frequency(pitch, panel.pitch, muse.config().reference_hz),
            gain: panel.gain(),
            clock: bus.clock,
            divide_by_six: bus.divide_by_six,
            shift_register: bus.shift_register,
            transport: panel.transport,
            sequencing: panel.sequencing,
            timer_armed: muse.timer_armed(),
            slave_mode: muse.sync().mode().raw(),
            followers: muse.sync().follower_count(),
        })
    }

    /// Whether a bus lamp is lit.
    pub fn lamp(&self, line: LineIndex) -> bool {
        line < 64 && (self.lamps >> line) & 0x1 == 1
    }
}
