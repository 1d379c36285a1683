// src/config.rs
//
// Per-instance configuration.

use serde::{Deserialize, Serialize};

use crate::error::Result;

// Default configuration
const DEFAULT_HISTORY_LEN: usize = 133;
const DEFAULT_TEMPO_BASE_MS: f64 = 100.0;
const DEFAULT_REFERENCE_HZ: f64 = 880.0;

/// Configuration for creating an instrument.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuseConfig {
    /// Notes kept in the melody history (`None` = unbounded).
    pub history_len: Option<usize>,

    /// Base constant of the tick period, `0.5 * (base + tempo^2)` ms.
    pub tempo_base_ms: f64,

    /// Frequency of pitch 0 with the PITCH slider at the top.
    pub reference_hz: f64,
}

impl Default for MuseConfig {
    fn default() -> Self {
        Self {
            history_len: Some(DEFAULT_HISTORY_LEN),
            tempo_base_ms: DEFAULT_TEMPO_BASE_MS,
            reference_hz: DEFAULT_REFERENCE_HZ,
        }
    }
}

impl MuseConfig {
    /// Parse a configuration document. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
