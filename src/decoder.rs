// src/decoder.rs
//
// Note decoding.
//
// The four interval switches pick four bus lines, which form the note
// address DCBA. CBA index a major scale and D raises the result an octave.

use crate::bus::{BusState, LineIndex};
use crate::error::Result;

/// Semitones above the tonic.
pub type Pitch = u8;

/// Diatonic major scale. Index 7 repeats the tonic an octave up, so
/// addresses 7 and 8 both sound a C.
pub const MAJOR_SCALE: [Pitch; 8] = [0, 2, 4, 5, 7, 9, 11, 12];

/// Position of the REST/NORMAL switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RestSwitch {
    /// The low tonic is silenced.
    Rest,
    /// The low tonic sounds like any other note.
    #[default]
    Normal,
}

impl RestSwitch {
    /// Slider position (0 = REST, 1 = NORMAL).
    pub fn position(self) -> u8 {
        match self {
            RestSwitch::Rest => 0,
            RestSwitch::Normal => 1,
        }
    }

    pub fn from_position(position: u8) -> Option<Self> {
        match position {
            0 => Some(RestSwitch::Rest),
            1 => Some(RestSwitch::Normal),
            _ => None,
        }
    }

    /// Preset flag: anything other than `REST` plays normally.
    pub fn from_flag(flag: &str) -> Self {
        if flag.trim().eq_ignore_ascii_case("REST") {
            RestSwitch::Rest
        } else {
            RestSwitch::Normal
        }
    }
}

/// Read the 4-bit note address. Bit `i` comes from `interval[i]`.
pub fn decode_address(bus: &BusState, interval: &[LineIndex; 4]) -> Result<u8> {
    let mut dcba = 0u8;
    for (i, &line) in interval.iter().enumerate() {
        dcba |= bus.read(line)? << i;
    }
    Ok(dcba)
}

/// Pitch of a note address, before the rest switch is applied.
#[inline]
pub fn pitch_for_address(dcba: u8) -> Pitch {
    MAJOR_SCALE[(dcba & 0x7) as usize] + 12 * ((dcba >> 3) & 0x1)
}

/// Decode the current note. `None` is a rest.
pub fn decode_pitch(
    bus: &BusState,
    interval: &[LineIndex; 4],
    rest: RestSwitch,
) -> Result<Option<Pitch>> {
    let pitch = pitch_for_address(decode_address(bus, interval)?);
    if pitch == 0 && rest == RestSwitch::Rest {
        return Ok(None);
    }
    Ok(Some(pitch))
}

/// Oscillator frequency for a decoded note.
///
/// `pitch_control` is the PITCH slider (0..=49); `reference_hz` is the
/// frequency of pitch 0 with the slider at 0. Rests are 0 Hz.
pub fn frequency(pitch: Option<Pitch>, pitch_control: u8, reference_hz: f64) -> f64 {
    match pitch {
        Some(pitch) => {
            let semitones = f64::from(pitch) - f64::from(pitch_control);
            reference_hz * 2f64.powf(semitones / 12.0)
        }
        None => 0.0,
    }
}
