// src/lib.rs
//
// Library entry point for Rust, FFI (iOS/Swift) and WebAssembly consumers.

mod bridge;
mod bus;
mod config;
mod decoder;
mod engine;
mod error;
mod event;
mod history;
mod muse;
mod patch;
mod readback;
mod scheduler;
mod state;
mod sync;
mod transport;

#[cfg(test)]
mod test;

#[cfg(feature = "ios")]
pub mod ffi;

#[cfg(feature = "web")]
pub mod wasm;

// Re-export key types for Rust consumers
pub use bridge::{SharedMuse, attach, shared, spawn_follower};
pub use bus::{BusState, LINE_COUNT, LINE_NAMES, LineIndex, line_for_name, line_name};
pub use config::MuseConfig;
pub use decoder::{MAJOR_SCALE, Pitch, RestSwitch, frequency, pitch_for_address};
pub use engine::ClockEngine;
pub use error::{MuseError, Result};
pub use event::MuseEvent;
pub use history::MelodyHistory;
pub use muse::Muse;
pub use patch::{BUILTIN_PRESETS, Patch, Preset, builtin_preset, builtin_presets, presets_from_json};
pub use readback::Readback;
pub use scheduler::{StepScheduler, tick_period};
pub use state::{Command, CommandResult, Control, KNOB_POSITIONS, Panel};
pub use sync::{ClockFollower, ClockMaster, FollowerId, SlaveMode, SyncController};
pub use transport::{AutoMode, RunMode};
