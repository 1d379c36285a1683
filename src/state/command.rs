// Commands from input adapters to an instrument.
//
// Commands are the only way a UI mutates an instrument. Queries go
// through the read-only accessors and the readback snapshot.

use super::Control;
use crate::decoder::Pitch;
use crate::patch::Preset;

/// A command for one Muse instance.
///
/// Commands are:
/// - Immutable once created
/// - Executed synchronously, one at a time, per instance
/// - Applied atomically (a rejected command changes nothing)
#[derive(Debug, Clone)]
pub enum Command {
    // ═══════════════════════════════════════════
    // Panel
    // ═══════════════════════════════════════════
    /// Move a slider or switch to a position.
    SetControl { control: Control, value: u32 },

    /// Let go of a control (momentary START and STEP spring back).
    ReleaseControl { control: Control },

    // ═══════════════════════════════════════════
    // Clock
    // ═══════════════════════════════════════════
    /// Advance the clock once, as a timer tick would.
    Step,

    /// Return the counters to power-on and clear the melody.
    Reset,

    // ═══════════════════════════════════════════
    // Presets
    // ═══════════════════════════════════════════
    /// Load a preset without touching the transport.
    ApplyPreset { preset: Preset },

    /// Load a preset and start it running.
    PlayPreset { preset: Preset },

    // ═══════════════════════════════════════════
    // Sync
    // ═══════════════════════════════════════════
    /// Set the follower clock mode (0 independent, 1 unison, N divide).
    SetSlaveMode { mode: u32 },
}

/// Response from an instrument after executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResult {
    /// Command succeeded.
    Ok,

    /// Command advanced the clock; carries the decoded note of the last step.
    Stepped { pitch: Option<Pitch> },
}
