// C-compatible FFI bindings for Swift/iOS integration.
//
// Safety requirements:
// - All pointers must be non-null unless documented otherwise
// - All handles must be created by this module and not fabricated
// - String parameters must be valid UTF-8 (Swift strings are always valid)
// - Caller must call muse_destroy for each handle returned by this module
// - Handles are not thread-safe; use each one from a single thread

use std::ffi::{CStr, c_char};
use std::time::Duration;

use crate::bridge::{SharedMuse, shared, spawn_follower};
use crate::config::MuseConfig;
use crate::muse::Muse;
use crate::patch::Preset;
use crate::readback::Readback;
use crate::scheduler::StepScheduler;
use crate::state::Control;
use crate::sync::SlaveMode;

use log::{LevelFilter, error, warn};
use oslog::OsLogger;

// Logger subsystem identifier
const LOG_SUBSYSTEM: &str = "com.muse.engine";

/// Returned in place of a note for a rest.
pub const MUSE_REST: i32 = -1;

/// Returned when a call failed (details go to the log).
pub const MUSE_ERROR: i32 = -2;

// ═══════════════════════════════════════════════════════════════════════════
// Logger Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the oslog logger.
///
/// This should be called once at application startup before using any other
/// FFI functions. It sets up unified logging that will appear in Console.app
/// and Xcode's debug console.
#[unsafe(no_mangle)]
pub extern "C" fn muse_init_logger() {
    OsLogger::new(LOG_SUBSYSTEM)
        .level_filter(LevelFilter::Debug)
        .init()
        .ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Opaque Handle Types
// ═══════════════════════════════════════════════════════════════════════════

/// Opaque handle to one instrument and its tick timer.
pub struct MuseHandle {
    inner: SharedMuse,
    scheduler: StepScheduler,
}

impl MuseHandle {
    fn boxed(inner: SharedMuse) -> *mut MuseHandle {
        Box::into_raw(Box::new(MuseHandle {
            inner,
            scheduler: StepScheduler::new(),
        }))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// FFI Result Types
// ═══════════════════════════════════════════════════════════════════════════

/// Snapshot of an instrument for panel lamps and the oscillator.
#[repr(C)]
#[derive(Default)]
pub struct MuseReadback {
    /// Bus lamps, line `i` at bit `i`.
    pub lamps: u64,
    /// Note address DCBA.
    pub light_show: u8,
    /// Current note, or `MUSE_REST`.
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
            lamps: r.lamps,
            light_show: r.light_show,
            pitch: r.pitch.map(i32::from).unwrap_or(MUSE_REST),
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

/// Borrow a C string as UTF-8, or `None` when null or invalid.
///
/// # Safety
/// `text` must be null or a valid null-terminated string.
unsafe fn utf8<'a>(text: *const c_char) -> Option<&'a str> {
    if text.is_null() {
        return None;
    }
    unsafe { CStr::from_ptr(text) }.to_str().ok()
}

// ═══════════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════════

/// Create an instrument with the default configuration.
///
/// Returns an opaque pointer that must be freed with `muse_destroy`.
#[unsafe(no_mangle)]
pub extern "C" fn muse_create() -> *mut MuseHandle {
    MuseHandle::boxed(shared(Muse::default()))
}

/// Create an instrument from a JSON configuration document.
///
/// A null or unreadable document falls back to the defaults.
///
/// # Safety
/// `config_json` must be a valid null-terminated UTF-8 string or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_create_with_config(config_json: *const c_char) -> *mut MuseHandle {
    let config = match unsafe { utf8(config_json) } {
        Some(json) => MuseConfig::from_json(json).unwrap_or_else(|e| {
            warn!("muse_create_with_config: {}, using defaults", e);
            MuseConfig::default()
        }),
        None => MuseConfig::default(),
    };
    MuseHandle::boxed(shared(Muse::new(config)))
}

/// Destroy an instrument. Its followers are released and it leaves its
/// master.
///
/// # Safety
/// `muse` must be a valid pointer returned by this module, or NULL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_destroy(muse: *mut MuseHandle) {
    if muse.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(muse) };
    if let Ok(mut inner) = handle.inner.try_borrow_mut() {
        inner.unplug_all();
        inner.unplug();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Clock
// ═══════════════════════════════════════════════════════════════════════════

/// Advance the clock once. Returns the new note, `MUSE_REST` or `MUSE_ERROR`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_step(muse: *mut MuseHandle) -> i32 {
    if muse.is_null() {
        return MUSE_ERROR;
    }
    match unsafe { (*muse).inner.borrow_mut().step() } {
        Ok(pitch) => pitch.map(i32::from).unwrap_or(MUSE_REST),
        Err(e) => {
            error!("muse_step: {}", e);
            MUSE_ERROR
        }
    }
}

/// Return the counters to power-on and clear the melody.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_reset(muse: *mut MuseHandle) {
    if muse.is_null() {
        return;
    }
    unsafe { (*muse).inner.borrow_mut().reset() };
}

/// Run the ticks that fell due in `elapsed_ms`. Returns the tick count.
///
/// Call this from the display link or any other periodic callback.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_advance(muse: *mut MuseHandle, elapsed_ms: f64) -> u32 {
    if muse.is_null() {
        return 0;
    }
    let handle = unsafe { &mut *muse };
    let dt = Duration::from_secs_f64(elapsed_ms.max(0.0) / 1000.0);
    match handle.scheduler.advance(&mut handle.inner.borrow_mut(), dt) {
        Ok(steps) => steps as u32,
        Err(e) => {
            error!("muse_advance: {}", e);
            0
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Panel
// ═══════════════════════════════════════════════════════════════════════════

/// Move a control. Returns false for an unknown control or a value out of
/// range, leaving the instrument unchanged.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_set_control(muse: *mut MuseHandle, control_id: u32, value: u32) -> bool {
    if muse.is_null() {
        return false;
    }
    let Some(control) = Control::from_id(control_id) else {
        warn!("muse_set_control: unknown control id {}", control_id);
        return false;
    };
    match unsafe { (*muse).inner.borrow_mut().set_control(control, value) } {
        Ok(()) => true,
        Err(e) => {
            warn!("muse_set_control: {}", e);
            false
        }
    }
}

/// Let go of a momentary control (START, STEP).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_release_control(muse: *mut MuseHandle, control_id: u32) -> bool {
    if muse.is_null() {
        return false;
    }
    let Some(control) = Control::from_id(control_id) else {
        return false;
    };
    match unsafe { (*muse).inner.borrow_mut().release_control(control) } {
        Ok(()) => true,
        Err(e) => {
            error!("muse_release_control: {}", e);
            false
        }
    }
}

/// Current position of a control, or -1 for an unknown control.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_get_control(muse: *const MuseHandle, control_id: u32) -> i32 {
    if muse.is_null() {
        return -1;
    }
    match Control::from_id(control_id) {
        Some(control) => i32::from(unsafe { (*muse).inner.borrow().control(control) }),
        None => -1,
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Presets
// ═══════════════════════════════════════════════════════════════════════════

fn load_preset(muse: &MuseHandle, text: Option<&str>, play: bool) -> bool {
    let Some(text) = text else {
        warn!("preset text is null or not UTF-8");
        return false;
    };
    let result = text.parse::<Preset>().and_then(|preset| {
        let mut inner = muse.inner.borrow_mut();
        if play {
            inner.play_preset(&preset)
        } else {
            inner.apply_preset(&preset)
        }
    });
    match result {
        Ok(()) => true,
        Err(e) => {
            warn!("preset rejected: {}", e);
            false
        }
    }
}

/// Load a preset given as `"Name: a b c d w x y z rest"`.
///
/// # Safety
/// `text` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_apply_preset(muse: *mut MuseHandle, text: *const c_char) -> bool {
    if muse.is_null() {
        return false;
    }
    unsafe { load_preset(&*muse, utf8(text), false) }
}

/// Load a preset and start it playing.
///
/// # Safety
/// `text` must be a valid null-terminated UTF-8 string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_play_preset(muse: *mut MuseHandle, text: *const c_char) -> bool {
    if muse.is_null() {
        return false;
    }
    unsafe { load_preset(&*muse, utf8(text), true) }
}

// ═══════════════════════════════════════════════════════════════════════════
// Sync
// ═══════════════════════════════════════════════════════════════════════════

/// Create a follower playing this instrument's patch in unison.
///
/// Returns NULL if the link is refused. The follower must be freed with
/// `muse_destroy`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_spawn_follower(muse: *mut MuseHandle) -> *mut MuseHandle {
    if muse.is_null() {
        return std::ptr::null_mut();
    }
    match spawn_follower(unsafe { &(*muse).inner }) {
        Ok(follower) => MuseHandle::boxed(follower),
        Err(e) => {
            warn!("muse_spawn_follower: {}", e);
            std::ptr::null_mut()
        }
    }
}

/// Set the follower clock mode (0 independent, 1 unison, N divide).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_set_slave_mode(muse: *mut MuseHandle, mode: u32) {
    if muse.is_null() {
        return;
    }
    unsafe {
        (*muse)
            .inner
            .borrow_mut()
            .set_slave_mode(SlaveMode::from_raw(mode))
    };
}

/// Stop following the master.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_unplug(muse: *mut MuseHandle) {
    if muse.is_null() {
        return;
    }
    unsafe { (*muse).inner.borrow_mut().unplug() };
}

/// Release every follower.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_unplug_all(muse: *mut MuseHandle) {
    if muse.is_null() {
        return;
    }
    unsafe { (*muse).inner.borrow_mut().unplug_all() };
}

// ═══════════════════════════════════════════════════════════════════════════
// Readback
// ═══════════════════════════════════════════════════════════════════════════

/// Snapshot for rendering. A failed capture returns zeroed fields.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_get_readback(muse: *const MuseHandle) -> MuseReadback {
    if muse.is_null() {
        return MuseReadback::default();
    }
    match unsafe { (*muse).inner.borrow().readback() } {
        Ok(readback) => readback.into(),
        Err(e) => {
            error!("muse_get_readback: {}", e);
            MuseReadback::default()
        }
    }
}

/// Read one bus line. Returns 0 or 1, or -1 for a line off the bus.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_read_line(muse: *const MuseHandle, line: u32) -> i32 {
    if muse.is_null() {
        return -1;
    }
    match unsafe { (*muse).inner.borrow().engine().read(line as usize) } {
        Ok(bit) => i32::from(bit),
        Err(e) => {
            warn!("muse_read_line: {}", e);
            -1
        }
    }
}

/// Number of notes in the melody history.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_history_len(muse: *const MuseHandle) -> u32 {
    if muse.is_null() {
        return 0;
    }
    unsafe { (*muse).inner.borrow().history().len() as u32 }
}

/// Copy up to `capacity` history notes, oldest first, into `out`.
/// Rests are written as `MUSE_REST`. Returns the number written.
///
/// # Safety
/// `out` must point to at least `capacity` writable `i32`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn muse_copy_history(
    muse: *const MuseHandle,
    out: *mut i32,
    capacity: u32,
) -> u32 {
    if muse.is_null() || out.is_null() {
        return 0;
    }
    let inner = unsafe { (*muse).inner.borrow() };
    let out = unsafe { std::slice::from_raw_parts_mut(out, capacity as usize) };
    let mut written = 0;
    for (slot, note) in out.iter_mut().zip(inner.history().iter()) {
        *slot = note.map(i32::from).unwrap_or(MUSE_REST);
        written += 1;
    }
    written
}
