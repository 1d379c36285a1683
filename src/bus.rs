// src/bus.rs
//
// The 40-line signal bus.
//
// Every interval and theme switch on the panel selects one of these lines.
// The bus itself holds no logic: it is an addressing function over the
// clock counter, the divide-by-6 counter and the shift register.

use crate::error::{MuseError, Result};

/// Index of a bus line, 0..=39.
pub type LineIndex = usize;

/// Number of addressable lines.
pub const LINE_COUNT: usize = 40;

/// Constant low.
pub const LINE_OFF: LineIndex = 0;
/// Constant high.
pub const LINE_ON: LineIndex = 1;
/// First clock line ("C 1/2"); lines 2..=6 are clock bits 0..=4.
pub const LINE_CLOCK: LineIndex = 2;
/// First divide-by-6 line ("C3"); lines 7..=8 are counter bits 2..=3.
pub const LINE_DIVIDE: LineIndex = 7;
/// First shift register line ("B1"); lines 9..=39 are register bits 0..=30.
pub const LINE_REGISTER: LineIndex = 9;

/// Switch labels, in bus order.
pub const LINE_NAMES: [&str; LINE_COUNT] = [
    "OFF", "ON", "C 1/2", "C1", "C2", "C4", "C8", "C3", "C6", "B1", "B2", "B3", "B4", "B5",
    "B6", "B7", "B8", "B9", "B10", "B11", "B12", "B13", "B14", "B15", "B16", "B17", "B18",
    "B19", "B20", "B21", "B22", "B23", "B24", "B25", "B26", "B27", "B28", "B29", "B30", "B31",
];

/// Label of a line, or `None` past the end of the bus.
pub fn line_name(line: LineIndex) -> Option<&'static str> {
    LINE_NAMES.get(line).copied()
}

/// Resolve a switch label to its line.
///
/// Matching ignores case and surrounding whitespace, and accepts the
/// compact spelling `C1/2` for "C 1/2".
pub fn line_for_name(name: &str) -> Result<LineIndex> {
    let normalized = name.trim().to_ascii_uppercase();
    let normalized = if normalized == "C1/2" {
        "C 1/2".to_string()
    } else {
        normalized
    };

    LINE_NAMES
        .iter()
        .position(|label| *label == normalized)
        .ok_or_else(|| MuseError::InvalidSwitchName {
            name: name.to_string(),
        })
}

/// The counter state the bus is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusState {
    /// 5-bit binary counter; bit 0 is the primary clock phase.
    pub clock: u8,

    /// Divide-by-6 counter, read through bits 2 and 3 only.
    pub divide_by_six: u32,

    /// 31-bit shift register.
    pub shift_register: u32,
}

impl Default for BusState {
    /// Power-on state: the clock idles high.
    fn default() -> Self {
        Self {
            clock: 1,
            divide_by_six: 0,
            shift_register: 0,
        }
    }
}

impl BusState {
    /// Read one line as 0 or 1.
    pub fn read(&self, line: LineIndex) -> Result<u8> {
        let bit = match line {
            LINE_OFF => 0,
            LINE_ON => 1,
            2..=6 => (self.clock >> (line - LINE_CLOCK)) as u32,
            7..=8 => self.divide_by_six >> (line - LINE_DIVIDE + 2),
            9..=39 => self.shift_register >> (line - LINE_REGISTER),
            _ => return Err(MuseError::OutOfRangeLine { line }),
        };
        Ok((bit & 0x1) as u8)
    }

    /// Current clock phase ("C 1/2").
    #[inline]
    pub fn clock_bit(&self) -> u8 {
        self.clock & 0x1
    }

    /// All 40 lines packed into a mask, line `i` at bit `i`.
    pub fn lamps(&self) -> u64 {
        (0..LINE_COUNT).fold(0u64, |mask, line| {
            // Every index in 0..LINE_COUNT is on the bus.
            let bit = self.read(line).unwrap_or(0);
            mask | (u64::from(bit) << line)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_lines() {
        let bus = BusState::default();
        assert_eq!(bus.read(LINE_OFF).unwrap(), 0);
        assert_eq!(bus.read(LINE_ON).unwrap(), 1);
    }

    #[test]
    fn test_clock_lines_follow_counter_bits() {
        let bus = BusState {
            clock: 0b10110,
            ..Default::default()
        };
        let lines: Vec<u8> = (2..=6).map(|l| bus.read(l).unwrap()).collect();
        assert_eq!(lines, vec![0, 1, 1, 0, 1]);
    }

    #[test]
    fn test_divide_lines_read_bits_two_and_three() {
        let bus = BusState {
            divide_by_six: 0b1011,
            ..Default::default()
        };
        assert_eq!(bus.read(7).unwrap(), 0);
        assert_eq!(bus.read(8).unwrap(), 1);
    }

    #[test]
    fn test_register_lines_lsb_first() {
        let bus = BusState {
            shift_register: 0x4000_0001,
            ..Default::default()
        };
        assert_eq!(bus.read(9).unwrap(), 1);
        assert_eq!(bus.read(10).unwrap(), 0);
        assert_eq!(bus.read(39).unwrap(), 1);
    }

    #[test]
    fn test_out_of_range_line_is_rejected() {
        let bus = BusState::default();
        assert!(matches!(
            bus.read(40),
            Err(MuseError::OutOfRangeLine { line: 40 })
        ));
    }

    #[test]
    fn test_lamps_mask() {
        let bus = BusState::default();
        // ON and C 1/2 are lit after power-on.
        assert_eq!(bus.lamps(), 0b110);
    }

    #[test]
    fn test_name_lookup() {
        assert_eq!(line_for_name("OFF").unwrap(), 0);
        assert_eq!(line_for_name("c1/2").unwrap(), 2);
        assert_eq!(line_for_name("C 1/2").unwrap(), 2);
        assert_eq!(line_for_name("C6").unwrap(), 8);
        assert_eq!(line_for_name("b17").unwrap(), 25);
        assert_eq!(line_for_name("B31").unwrap(), 39);
        assert!(matches!(
            line_for_name("Z99"),
            Err(MuseError::InvalidSwitchName { .. })
        ));
        assert_eq!(line_name(8), Some("C6"));
        assert_eq!(line_name(40), None);
    }
}
