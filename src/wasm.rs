//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { muse_init, MuseWeb } from './muse.js';
//!
//! await init();
//! muse_init();
//!
//! const muse = new MuseWeb();
//! muse.play_preset("Scale: c1 c2 c4 off off off off off norm");
//!
//! // From requestAnimationFrame: run due ticks, then redraw
//! let last = performance.now();
//! function frame(now) {
//!     muse.advance(now - last);
//!     last = now;
//!     oscillator.frequency.value = muse.frequency();
//!     gain.gain.value = muse.gain();
//!     requestAnimationFrame(frame);
//! }
//! ```

use std::time::Duration;

use wasm_bindgen::prelude::*;

use crate::bridge::{SharedMuse, shared, spawn_follower};
use crate::config::MuseConfig;
use crate::muse::Muse;
use crate::patch::{BUILTIN_PRESETS, Preset};
use crate::readback::Readback;
use crate::scheduler::StepScheduler;
use crate::state::Control;
use crate::sync::SlaveMode;

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn muse_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

/// Number of built-in presets.
#[wasm_bindgen]
pub fn preset_count() -> u32 {
    BUILTIN_PRESETS.len() as u32
}

/// Text of a built-in preset, or an empty string past the end.
#[wasm_bindgen]
pub fn preset_text(index: u32) -> String {
    BUILTIN_PRESETS
        .get(index as usize)
        .map(|text| text.to_string())
        .unwrap_or_default()
}

fn control(id: u32) -> Result<Control, JsError> {
    Control::from_id(id).ok_or_else(|| JsError::new(&format!("unknown control id {}", id)))
}

// ═══════════════════════════════════════════════════════════════════════════
// Readback Data
// ═══════════════════════════════════════════════════════════════════════════

/// Snapshot of an instrument for panel lamps and the oscillator.
#[wasm_bindgen]
#[derive(Clone, Copy, Default)]
pub struct MuseReadback {
    /// Bus lamps 0..=31 (line `i` at bit `i`).
    pub lamps_low: u32,
    /// Bus lamps 32..=39 (line `32 + i` at bit `i`).
    pub lamps_high: u32,
    /// Note address DCBA.
    pub light_show: u8,
    /// Current note, or -1 for a rest.
    pub pitch: i32,
    pub frequency_hz: f64,
    pub gain: f32,
    pub clock: u8,
    pub divide_by_six: u32,
    pub shift_register: u32,
    pub timer_armed: bool,
    pub slave_mode: u32,
    pub followers: u32,
}

impl From<Readback> for MuseReadback {
    fn from(r: Readback) -> Self {
        Self {
            lamps_low: r.lamps as u32,
            lamps_high: (r.lamps >> 32) as u32,
            light_show: r.light_show,
            pitch: r.pitch.map(i32::from).unwrap_or(-1),
            frequency_hz: r.frequency_hz,
            gain: r.gain,
            clock: r.clock,
            divide_by_six: r.divide_by_six,
            shift_register: r.shift_register,
            timer_armed: r.timer_armed,
            slave_mode: r.slave_mode,
            followers: r.followers as u32,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Instrument
// ═══════════════════════════════════════════════════════════════════════════

/// One Muse with its own tick timer.
#[wasm_bindgen]
pub struct MuseWeb {
    inner: SharedMuse,
    scheduler: StepScheduler,
}

impl MuseWeb {
    fn wrap(inner: SharedMuse) -> MuseWeb {
        MuseWeb {
            inner,
            scheduler: StepScheduler::new(),
        }
    }
}

#[wasm_bindgen]
impl MuseWeb {
    /// Create an instrument with the default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new() -> MuseWeb {
        Self::wrap(shared(Muse::default()))
    }

    /// Create an instrument from a JSON configuration document.
    pub fn with_config(json: &str) -> Result<MuseWeb, JsError> {
        let config = MuseConfig::from_json(json)?;
        Ok(Self::wrap(shared(Muse::new(config))))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Clock
    // ─────────────────────────────────────────────────────────────────────────

    /// Run the ticks that fell due in `elapsed_ms`. Returns the tick count.
    pub fn advance(&mut self, elapsed_ms: f64) -> Result<u32, JsError> {
        let dt = Duration::from_secs_f64(elapsed_ms.max(0.0) / 1000.0);
        let steps = self.scheduler.advance(&mut self.inner.borrow_mut(), dt)?;
        Ok(steps as u32)
    }

    /// Advance the clock once. Returns the new note, or -1 for a rest.
    pub fn step(&mut self) -> Result<i32, JsError> {
        let pitch = self.inner.borrow_mut().step()?;
        Ok(pitch.map(i32::from).unwrap_or(-1))
    }

    pub fn reset(&mut self) {
        self.inner.borrow_mut().reset();
    }

    /// Whether the tick timer is currently running.
    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Panel
    // ─────────────────────────────────────────────────────────────────────────

    /// Move a control (see `Control` ids).
    pub fn set_control(&mut self, id: u32, value: u32) -> Result<(), JsError> {
        self.inner.borrow_mut().set_control(control(id)?, value)?;
        Ok(())
    }

    /// Let go of a momentary control.
    pub fn release_control(&mut self, id: u32) -> Result<(), JsError> {
        self.inner.borrow_mut().release_control(control(id)?)?;
        Ok(())
    }

    pub fn get_control(&self, id: u32) -> Result<u8, JsError> {
        Ok(self.inner.borrow().control(control(id)?))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Presets
    // ─────────────────────────────────────────────────────────────────────────

    /// Load a preset given as `"Name: a b c d w x y z rest"`.
    pub fn apply_preset(&mut self, text: &str) -> Result<(), JsError> {
        let preset: Preset = text.parse()?;
        self.inner.borrow_mut().apply_preset(&preset)?;
        Ok(())
    }

    /// Load a preset and start it playing.
    pub fn play_preset(&mut self, text: &str) -> Result<(), JsError> {
        let preset: Preset = text.parse()?;
        self.inner.borrow_mut().play_preset(&preset)?;
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Sync
    // ─────────────────────────────────────────────────────────────────────────

    /// Create a follower playing this instrument's patch in unison.
    pub fn spawn_follower(&self) -> Result<MuseWeb, JsError> {
        Ok(Self::wrap(spawn_follower(&self.inner)?))
    }

    /// Set the follower clock mode (0 independent, 1 unison, N divide).
    pub fn set_slave_mode(&mut self, mode: u32) {
        self.inner
            .borrow_mut()
            .set_slave_mode(SlaveMode::from_raw(mode));
    }

    /// Stop following the master.
    pub fn unplug(&mut self) {
        self.inner.borrow_mut().unplug();
    }

    /// Release every follower.
    pub fn unplug_all(&mut self) {
        self.inner.borrow_mut().unplug_all();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Readback
    // ─────────────────────────────────────────────────────────────────────────

    pub fn get_readback(&self) -> Result<MuseReadback, JsError> {
        Ok(self.inner.borrow().readback()?.into())
    }

    /// Read one bus line (0 or 1).
    pub fn read_line(&self, line: u32) -> Result<u8, JsError> {
        Ok(self.inner.borrow().engine().read(line as usize)?)
    }

    pub fn frequency(&self) -> Result<f64, JsError> {
        Ok(self.inner.borrow().frequency()?)
    }

    pub fn gain(&self) -> f32 {
        self.inner.borrow().gain()
    }

    /// Melody history, oldest first; rests are -1.
    pub fn history(&self) -> Vec<i32> {
        self.inner
            .borrow()
            .history()
            .iter()
            .map(|note| note.map(i32::from).unwrap_or(-1))
            .collect()
    }
}

impl Default for MuseWeb {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for MuseWeb {
    fn drop(&mut self) {
        if let Ok(mut muse) = self.inner.try_borrow_mut() {
            muse.unplug_all();
            muse.unplug();
        }
    }
}
