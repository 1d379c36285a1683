// src/error.rs
//
// Errors surfaced by the engine, the patch panel and the sync bridge.

use thiserror::Error;

use crate::state::Control;

/// Error raised by any Muse operation.
///
/// Nothing is retried. Every error is returned synchronously to the caller
/// of the operation that triggered it.
#[derive(Debug, Error)]
pub enum MuseError {
    /// A bus line outside [0, 39] was read.
    #[error("bus line {line} is out of range (expected 0..=39)")]
    OutOfRangeLine { line: usize },

    /// A preset referenced a switch position that is not on the panel.
    #[error("unknown switch name '{name}'")]
    InvalidSwitchName { name: String },

    /// A control was given a value outside its domain.
    #[error("value {value} is out of range for {control}")]
    InvalidControlValue { control: Control, value: u32 },

    /// Preset text that does not have four interval names, four theme names
    /// and a rest flag.
    #[error("malformed preset '{text}'")]
    MalformedPreset { text: String },

    /// A preset table or configuration document could not be decoded.
    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    /// A master/follower link that the bridge refuses to make.
    #[error("cannot link instances: {reason}")]
    InvalidSyncLink { reason: &'static str },
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MuseError>;
