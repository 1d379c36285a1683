//! Patch panel configuration and the preset table.
//!
//! A patch is the position of the eight matrix switches plus the rest
//! switch. Presets name those positions symbolically ("B17", "C 1/2",
//! "OFF") and are resolved onto bus lines here. This is the only path by
//! which text from outside the program selects bus lines, so every name is
//! checked before the engine is touched.

use std::fmt;
use std::str::FromStr;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::bus::{self, LINE_OFF, LineIndex};
use crate::decoder::RestSwitch;
use crate::engine::ClockEngine;
use crate::error::{MuseError, Result};

// ── Patch ───────────────────────────────────────────────────

/// Resolved matrix switch positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Patch {
    /// Lines feeding note address bits A, B, C, D.
    pub interval: [LineIndex; 4],
    /// Lines feeding the shift register feedback (W, X, Y, Z).
    pub theme: [LineIndex; 4],
    /// REST / NORMAL switch.
    pub rest: RestSwitch,
}

impl Default for Patch {
    fn default() -> Self {
        Self {
            interval: [LINE_OFF; 4],
            theme: [LINE_OFF; 4],
            rest: RestSwitch::Normal,
        }
    }
}

impl Patch {
    /// Resolve switch names into a patch.
    ///
    /// Fails on the first unknown name.
    pub fn from_names<S: AsRef<str>>(
        interval: &[S; 4],
        theme: &[S; 4],
        rest_flag: &str,
    ) -> Result<Self> {
        Ok(Self {
            interval: resolve_quad(interval)?,
            theme: resolve_quad(theme)?,
            rest: RestSwitch::from_flag(rest_flag),
        })
    }
}

fn resolve_quad<S: AsRef<str>>(names: &[S; 4]) -> Result<[LineIndex; 4]> {
    let mut lines = [LINE_OFF; 4];
    for (line, name) in lines.iter_mut().zip(names) {
        *line = bus::line_for_name(name.as_ref())?;
    }
    Ok(lines)
}

impl ClockEngine {
    /// Load a preset given as switch names, then reset the counters.
    ///
    /// All eight names are resolved before anything changes. An unknown
    /// name leaves the engine exactly as it was.
    pub fn apply_preset<S: AsRef<str>>(
        &mut self,
        interval: &[S; 4],
        theme: &[S; 4],
        rest_flag: &str,
    ) -> Result<()> {
        let patch = Patch::from_names(interval, theme, rest_flag)?;
        debug!(
            "apply_preset: interval={:?} theme={:?} rest={:?}",
            patch.interval, patch.theme, patch.rest
        );
        self.load_patch(patch);
        Ok(())
    }
}

// ── Presets ─────────────────────────────────────────────────

/// A named composition.
///
/// Presets are kept symbolic so they can be shown, edited and serialized
/// as they appear on the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preset {
    /// Composition title (may be empty).
    #[serde(default)]
    pub name: String,
    /// Interval switch names, A to D.
    pub interval: [String; 4],
    /// Theme switch names, W to Z.
    pub theme: [String; 4],
    /// `REST` or `NORM`.
    #[serde(default = "default_rest_flag")]
    pub rest: String,
}

fn default_rest_flag() -> String {
    "NORM".to_string()
}

impl Preset {
    /// Resolve this preset to bus lines.
    pub fn patch(&self) -> Result<Patch> {
        Patch::from_names(&self.interval, &self.theme, &self.rest)
    }
}

impl FromStr for Preset {
    type Err = MuseError;

    /// Parse `"Name: a b c d w x y z rest"`. The name is optional.
    fn from_str(text: &str) -> Result<Self> {
        let (name, switches) = match text.split_once(':') {
            Some((name, switches)) => (name.trim(), switches),
            None => ("", text),
        };

        let tokens: Vec<String> = switches
            .split_whitespace()
            .map(|token| match token.to_ascii_uppercase().as_str() {
                "C1/2" => "C 1/2".to_string(),
                upper => upper.to_string(),
            })
            .collect();

        let malformed = || MuseError::MalformedPreset {
            text: text.to_string(),
        };
        let [a, b, c, d, w, x, y, z, rest]: [String; 9] =
            tokens.try_into().map_err(|_| malformed())?;

        Ok(Self {
            name: name.to_string(),
            interval: [a, b, c, d],
            theme: [w, x, y, z],
            rest,
        })
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.name.is_empty() {
            write!(f, "{}: ", self.name)?;
        }
        // Tokens are whitespace-separated, so "C 1/2" goes out as its alias.
        let switches = self.interval.iter().chain(&self.theme);
        for (i, name) in switches.enumerate() {
            let name = if name.trim().eq_ignore_ascii_case("C 1/2") {
                "C1/2"
            } else {
                name.as_str()
            };
            if i > 0 {
                f.write_str(" ")?;
            }
            f.write_str(name)?;
        }
        write!(f, " {}", self.rest)
    }
}

/// Published compositions: name, four intervals, four themes, rest flag.
pub const BUILTIN_PRESETS: [&str; 20] = [
    "Michael's Tune:    b7  b8  b5  off   off  b4 b23 off norm",
    "Muser's Waltz:    b10  b8  b7  off    on  c4  b1  b2 norm",
    "Scale:             c1  c2  c4  off   off off off off norm",
    "Ed's Rhythm Piece: b6  b6  b6   c2   off off  b1 b31 norm",
    "The Crazy Cuckoo:  c1  b1 b31   c8   off off  b1 b31 norm",
    "Birds 1:           b1  b2  b3   c4   b30 b31 b31 b31 norm",
    "Birds 2:          b28 b29 b30  b30   b30 b31 b31 b31 norm",
    "Dorian Muse:       on  b1  b3   c8    b1 b16 off off norm",
    "Mesopotamia:       c2  b5  b9  off    c8  b9 b24  c4 norm",
    "Swiss Yodeler:     b8  c1 b16  off   b22 b21 b16 off norm",
    "Ron's Rhapsody:    b6  b9  b6 c1/2   b31  c4 off  c8 rest",
    "Christmas Bells:  b31 b30 b29  b28   b28 b29 b30 b31 norm",
    "Marvin's Yodel:    b2 b17  b9  b25   b16 off b15  c1 rest",
    "Federal Row:      b14  b5 b12   b2   b21 b24  c2 off norm",
    "Al's Surprise:     b1  b5  b7 c1/2    c8  b1  b7 b11 norm",
    "Meditation:        b1 b31 b14  off   off off b16 b31 norm",
    "Flat Baroque:      c1 b15  b1 c1/2   b30 b29 b24 off rest",
    "Polka:             b1 b13 b11 c1/2    c8 b11  b7  b1 rest",
    "Rhyming Couplets:  b1  b2  c4   c8   off off b31  c4 norm",
    "Yodle:             c8  b2  b5   b6   off off  b1 b31 norm",
];

/// The built-in preset table, parsed.
pub fn builtin_presets() -> Vec<Preset> {
    BUILTIN_PRESETS
        .iter()
        .filter_map(|line| line.parse().ok())
        .collect()
}

/// Look up a built-in preset by name, ignoring case.
pub fn builtin_preset(name: &str) -> Option<Preset> {
    builtin_presets()
        .into_iter()
        .find(|preset| preset.name.eq_ignore_ascii_case(name))
}

/// Decode a preset table from a JSON array and check every switch name.
pub fn presets_from_json(json: &str) -> Result<Vec<Preset>> {
    let presets: Vec<Preset> = serde_json::from_str(json)?;
    for preset in &presets {
        preset.patch()?;
    }
    Ok(presets)
}
