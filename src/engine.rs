// src/engine.rs

use log::trace;

use crate::bus::{BusState, LineIndex};
use crate::decoder::{self, Pitch, RestSwitch};
use crate::error::Result;
use crate::patch::Patch;

/// Mask keeping the shift register at 31 bits (lines B1..=B31).
const REGISTER_MASK: u32 = 0x7FFF_FFFF;

/// The counter and shift-register state machine.
///
/// This struct is fully deterministic and knows nothing about time.
/// One call to [`ClockEngine::tick`] is one half-cycle of the Muse clock.
#[derive(Debug, Clone, Default)]
pub struct ClockEngine {
    /// Counters exposed on the bus
    bus: BusState,

    /// Interval/theme line selection and the rest switch
    patch: Patch,
}

impl ClockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance the clock one step and return the newly decoded note.
    ///
    /// The feedback bit is taken from the bus *before* the counters move.
    /// If a theme line is off the bus the engine is left untouched.
    pub fn tick(&mut self) -> Result<Option<Pitch>> {
        let feedback = self.feedback_bit()?;

        self.bus.clock = (self.bus.clock + 1) & 0x1F;

        // Falling edge of C 1/2
        if self.bus.clock & 0x1 == 0 {
            self.bus.divide_by_six = self.bus.divide_by_six.wrapping_add(1);
            if self.bus.divide_by_six & 0x3 == 0x2 {
                self.bus.divide_by_six = self.bus.divide_by_six.wrapping_add(1);
            }

            self.bus.shift_register =
                ((self.bus.shift_register << 1) | u32::from(feedback)) & REGISTER_MASK;
        }

        trace!(
            "tick: clock={} divide={} register={:#010x}",
            self.bus.clock, self.bus.divide_by_six, self.bus.shift_register
        );

        self.decode_pitch()
    }

    /// XNOR of the four theme lines.
    fn feedback_bit(&self) -> Result<u8> {
        let mut bit = 1;
        for &line in &self.patch.theme {
            bit ^= self.bus.read(line)?;
        }
        Ok(bit)
    }

    /// Return the counters to their power-on state (clock idling high).
    pub fn reset(&mut self) {
        self.bus = BusState::default();
    }

    /// Replace the patch and reset the counters.
    pub fn load_patch(&mut self, patch: Patch) {
        self.patch = patch;
        self.reset();
    }

    // -------------------------------
    // MARK: Queries
    // -------------------------------

    #[inline]
    pub fn bus(&self) -> &BusState {
        &self.bus
    }

    #[inline]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    #[inline]
    pub fn clock_bit(&self) -> u8 {
        self.bus.clock_bit()
    }

    /// Read one bus line.
    pub fn read(&self, line: LineIndex) -> Result<u8> {
        self.bus.read(line)
    }

    /// 4-bit note address (also drives the light show).
    pub fn decode_address(&self) -> Result<u8> {
        decoder::decode_address(&self.bus, &self.patch.interval)
    }

    pub fn decode_pitch(&self) -> Result<Option<Pitch>> {
        decoder::decode_pitch(&self.bus, &self.patch.interval, self.patch.rest)
    }

    // -------------------------------
    // MARK: Switch mutators
    // -------------------------------
    //
    // Callers validate the line against the bus before writing.

    pub fn set_interval(&mut self, slot: usize, line: LineIndex) {
        debug_assert!(line < crate::bus::LINE_COUNT);
        self.patch.interval[slot] = line;
    }

    pub fn set_theme(&mut self, slot: usize, line: LineIndex) {
        debug_assert!(line < crate::bus::LINE_COUNT);
        self.patch.theme[slot] = line;
    }

    pub fn set_rest(&mut self, rest: RestSwitch) {
        self.patch.rest = rest;
    }
}
