// src/event.rs

use crate::decoder::Pitch;
use crate::state::Control;
use crate::sync::FollowerId;

/// ===============================
/// Instrument notifications
/// ===============================

/// Something an adapter may want to redraw or re-voice.
///
/// These events:
/// - are emitted after the instrument's state is fully updated
/// - are delivered over `mpsc` channels, one per subscriber
/// - carry values, never references into the instrument
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MuseEvent {
    /// The clock advanced.
    Stepped { pitch: Option<Pitch>, clock_bit: u8 },

    /// Counters returned to power-on and the melody was cleared.
    Reset,

    /// The matrix switches or the rest switch changed.
    PatchChanged,

    /// A panel control moved.
    ControlChanged { control: Control, value: u8 },

    /// A follower was linked to this master.
    FollowerAttached { follower: FollowerId },

    /// This instance stopped following its master, or lost a follower.
    Detached,
}
