// src/muse.rs
//
// One Muse instrument.
//
// This module ties the clock engine to the front panel, the melody
// history and the sync controller. It is the single dispatch point for an
// instance: timer ticks, manual steps, panel changes and master edges all
// come through here, one at a time.

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use log::{debug, error, info, warn};

use crate::{
    config::MuseConfig,
    decoder::{self, Pitch},
    engine::ClockEngine,
    error::{MuseError, Result},
    event::MuseEvent,
    history::MelodyHistory,
    patch::Preset,
    readback::Readback,
    scheduler,
    state::{Command, CommandResult, Control, Panel},
    sync::{ClockFollower, ClockMaster, FollowerId, SlaveMode, SyncController},
    transport::{AutoMode, RunMode},
};

/// A complete instrument: engine, panel, history and sync state.
///
/// Every mutation goes through a method here, so an instance never sees
/// two ticks in flight.
#[derive(Debug)]
pub struct Muse {
    /// Counters, shift register and patch.
    engine: ClockEngine,

    /// Transport, sequencing and slider positions.
    panel: Panel,

    /// Notes played since the last reset.
    history: MelodyHistory,

    /// Follower mode, divider, followers and master link.
    sync: SyncController,

    config: MuseConfig,

    /// Event subscribers.
    listeners: Vec<Sender<MuseEvent>>,

    /// Bumped whenever the periodic timer has to be re-armed.
    timer_epoch: u64,

    /// The instrument this one follows, for forwarding spawn requests.
    leader: Option<Weak<RefCell<Muse>>>,
}

impl Default for Muse {
    fn default() -> Self {
        Self::new(MuseConfig::default())
    }
}

impl Muse {
    pub fn new(config: MuseConfig) -> Self {
        Self {
            engine: ClockEngine::new(),
            panel: Panel::new(),
            history: MelodyHistory::new(config.history_len),
            sync: SyncController::new(),
            config,
            listeners: Vec::new(),
            timer_epoch: 0,
            leader: None,
        }
    }

    // ═════════════════════════════════════════════════════════════
    // Clock
    // ═════════════════════════════════════════════════════════════

    /// Advance the clock once.
    ///
    /// The new note is recorded, then the new clock phase goes out to every
    /// follower. This does not return until all of them have reacted.
    pub fn step(&mut self) -> Result<Option<Pitch>> {
        let pitch = self.engine.tick()?;
        self.history.push(pitch);

        let clock_bit = self.engine.clock_bit();
        self.broadcast(clock_bit);

        self.sync.on_tick();
        self.notify(MuseEvent::Stepped { pitch, clock_bit });
        Ok(pitch)
    }

    /// Send a clock edge to the followers, in registration order.
    ///
    /// A follower that fails to tick does not stop the broadcast.
    fn broadcast(&mut self, clock_bit: u8) {
        for follower in self.sync.live_followers() {
            match follower.try_borrow_mut() {
                Ok(mut follower) => {
                    if let Err(e) = follower.slave_step(clock_bit) {
                        error!("follower failed to step: {}", e);
                    }
                }
                Err(_) => warn!("follower is already stepping, skipping edge"),
            }
        }
    }

    /// Return the counters to power-on and clear the melody.
    pub fn reset(&mut self) {
        self.engine.reset();
        self.history.clear();
        debug!("reset");
        self.notify(MuseEvent::Reset);
    }

    // ═════════════════════════════════════════════════════════════
    // Panel
    // ═════════════════════════════════════════════════════════════

    /// Current position of a control.
    pub fn control(&self, control: Control) -> u8 {
        let patch = self.engine.patch();
        match control {
            Control::Transport => self.panel.transport.position(),
            Control::Sequencing => self.panel.sequencing.position(),
            Control::Rest => patch.rest.position(),
            Control::Volume => self.panel.volume,
            Control::Tempo => self.panel.tempo,
            Control::Pitch => self.panel.pitch,
            _ => {
                let line = control
                    .interval_slot()
                    .map(|slot| patch.interval[slot])
                    .or_else(|| control.theme_slot().map(|slot| patch.theme[slot]))
                    .unwrap_or(0);
                line as u8
            }
        }
    }

    /// Move a control, with the side effects of moving it on the panel.
    ///
    /// Values outside the control's domain are rejected. Setting a control
    /// to the position it already has does nothing.
    pub fn set_control(&mut self, control: Control, value: u32) -> Result<()> {
        let value = control.validate(value)?;
        if self.control(control) == value {
            return Ok(());
        }
        let invalid = || MuseError::InvalidControlValue {
            control,
            value: u32::from(value),
        };

        match control {
            Control::Transport => {
                let mode = RunMode::from_position(value).ok_or_else(invalid)?;
                self.panel.transport = mode;
                self.timer_epoch += 1;
                // START is the reset pulse; dropping to OFF also clears.
                if mode != RunMode::Run {
                    self.reset();
                }
            }
            Control::Sequencing => {
                let mode = AutoMode::from_position(value).ok_or_else(invalid)?;
                self.panel.sequencing = mode;
                match mode {
                    AutoMode::Auto => self.timer_epoch += 1,
                    AutoMode::Hold => {}
                    AutoMode::Step => {
                        self.step()?;
                    }
                }
            }
            Control::Rest => {
                let rest = decoder::RestSwitch::from_position(value).ok_or_else(invalid)?;
                self.engine.set_rest(rest);
                self.notify(MuseEvent::PatchChanged);
            }
            Control::Volume => self.panel.volume = value,
            Control::Tempo => {
                self.panel.tempo = value;
                self.timer_epoch += 1;
            }
            Control::Pitch => self.panel.pitch = value,
            _ => {
                if let Some(slot) = control.interval_slot() {
                    self.engine.set_interval(slot, usize::from(value));
                } else if let Some(slot) = control.theme_slot() {
                    self.engine.set_theme(slot, usize::from(value));
                }
                self.notify(MuseEvent::PatchChanged);
            }
        }

        self.notify(MuseEvent::ControlChanged { control, value });
        Ok(())
    }

    /// Let go of a control. START springs back to RUN; STEP springs back
    /// to HOLD and, if that leaves the clock low, ticks once more so the
    /// clock idles high.
    pub fn release_control(&mut self, control: Control) -> Result<()> {
        match control {
            Control::Transport if self.panel.transport == RunMode::Start => {
                self.panel.transport = RunMode::Run;
                self.notify(MuseEvent::ControlChanged {
                    control,
                    value: RunMode::Run.position(),
                });
            }
            Control::Sequencing if self.panel.sequencing == AutoMode::Step => {
                self.panel.sequencing = AutoMode::Hold;
                if self.engine.clock_bit() == 0 {
                    self.step()?;
                }
                self.notify(MuseEvent::ControlChanged {
                    control,
                    value: AutoMode::Hold.position(),
                });
            }
            _ => {}
        }
        Ok(())
    }

    // ═════════════════════════════════════════════════════════════
    // Presets
    // ═════════════════════════════════════════════════════════════

    /// Load a preset. The counters and the melody are reset; an unknown
    /// switch name leaves everything as it was.
    pub fn apply_preset(&mut self, preset: &Preset) -> Result<()> {
        self.engine
            .apply_preset(&preset.interval, &preset.theme, &preset.rest)?;
        if !preset.name.is_empty() {
            debug!("loaded preset '{}'", preset.name);
        }
        self.history.clear();
        self.notify(MuseEvent::PatchChanged);
        self.notify(MuseEvent::Reset);
        Ok(())
    }

    /// Load a preset and start it playing (RUN, AUTO).
    pub fn play_preset(&mut self, preset: &Preset) -> Result<()> {
        self.apply_preset(preset)?;
        self.panel.transport = RunMode::Run;
        self.panel.sequencing = AutoMode::Auto;
        self.timer_epoch += 1;
        self.notify(MuseEvent::ControlChanged {
            control: Control::Transport,
            value: RunMode::Run.position(),
        });
        self.notify(MuseEvent::ControlChanged {
            control: Control::Sequencing,
            value: AutoMode::Auto.position(),
        });
        Ok(())
    }

    /// Take the patch and the pitch setting of another instance.
    pub fn copy_patch_from(&mut self, other: &Muse) {
        self.engine.load_patch(*other.engine.patch());
        self.panel.pitch = other.panel.pitch;
        self.history.clear();
        self.notify(MuseEvent::PatchChanged);
    }

    // ═════════════════════════════════════════════════════════════
    // Sync
    // ═════════════════════════════════════════════════════════════

    /// Choose how this instance follows its master's clock.
    pub fn set_slave_mode(&mut self, mode: SlaveMode) {
        self.sync.set_mode(mode);
        self.timer_epoch += 1;
    }

    /// Stop following the master, and tell the master.
    ///
    /// On an instance with no master link this only resets the mode.
    pub fn unplug(&mut self) {
        let had_master = self.sync.has_master();
        if let Some((id, master)) = self.sync.take_master() {
            match master.try_borrow_mut() {
                Ok(mut master) => master.detach(id),
                Err(_) => warn!("master is busy, {} left registered", id),
            }
            info!("unplugged {} from its master", id);
        }
        self.sync.set_mode(SlaveMode::Independent);
        self.leader = None;
        if had_master {
            self.timer_epoch += 1;
            self.notify(MuseEvent::Detached);
        }
    }

    /// Release every follower (this master is going away).
    pub fn unplug_all(&mut self) {
        for follower in self.sync.take_followers() {
            match follower.try_borrow_mut() {
                Ok(mut follower) => follower.release(),
                Err(_) => warn!("follower is busy, cannot release it"),
            }
        }
    }

    // ═════════════════════════════════════════════════════════════
    // Commands
    // ═════════════════════════════════════════════════════════════

    /// Execute one command.
    pub fn execute(&mut self, command: Command) -> Result<CommandResult> {
        match command {
            Command::SetControl { control, value } => self.set_control(control, value)?,
            Command::ReleaseControl { control } => self.release_control(control)?,
            Command::Step => {
                let pitch = self.step()?;
                return Ok(CommandResult::Stepped { pitch });
            }
            Command::Reset => self.reset(),
            Command::ApplyPreset { preset } => self.apply_preset(&preset)?,
            Command::PlayPreset { preset } => self.play_preset(&preset)?,
            Command::SetSlaveMode { mode } => self.set_slave_mode(SlaveMode::from_raw(mode)),
        }
        Ok(CommandResult::Ok)
    }

    // ═════════════════════════════════════════════════════════════
    // Notifications
    // ═════════════════════════════════════════════════════════════

    /// Subscribe to this instance's events.
    ///
    /// Dropping the receiver unsubscribes.
    pub fn subscribe(&mut self) -> Receiver<MuseEvent> {
        let (tx, rx) = mpsc::channel();
        self.listeners.push(tx);
        rx
    }

    pub(crate) fn notify(&mut self, event: MuseEvent) {
        self.listeners.retain(|tx| tx.send(event.clone()).is_ok());
    }

    // ═════════════════════════════════════════════════════════════
    // Queries
    // ═════════════════════════════════════════════════════════════

    pub fn engine(&self) -> &ClockEngine {
        &self.engine
    }

    pub fn panel(&self) -> &Panel {
        &self.panel
    }

    pub fn history(&self) -> &MelodyHistory {
        &self.history
    }

    pub fn sync(&self) -> &SyncController {
        &self.sync
    }

    pub(crate) fn sync_mut(&mut self) -> &mut SyncController {
        &mut self.sync
    }

    /// Record the instrument this one now follows.
    pub(crate) fn set_leader(&mut self, leader: &Rc<RefCell<Muse>>) {
        self.leader = Some(Rc::downgrade(leader));
        self.timer_epoch += 1;
    }

    /// The instrument this one follows, if it is still alive.
    pub(crate) fn leader(&self) -> Option<Rc<RefCell<Muse>>> {
        self.leader.as_ref().and_then(Weak::upgrade)
    }

    pub fn config(&self) -> &MuseConfig {
        &self.config
    }

    /// Current note.
    pub fn pitch(&self) -> Result<Option<Pitch>> {
        self.engine.decode_pitch()
    }

    /// Oscillator frequency for the current note.
    pub fn frequency(&self) -> Result<f64> {
        Ok(decoder::frequency(
            self.pitch()?,
            self.panel.pitch,
            self.config.reference_hz,
        ))
    }

    pub fn gain(&self) -> f32 {
        self.panel.gain()
    }

    /// Whether the periodic timer should run for this instance.
    ///
    /// An instance driven by a live master takes its ticks from the
    /// master's edges instead.
    pub fn timer_armed(&self) -> bool {
        self.panel.transport.is_on()
            && self.panel.sequencing == AutoMode::Auto
            && self.sync.master().is_none()
    }

    /// Re-arm counter read by the scheduler.
    #[inline]
    pub fn timer_epoch(&self) -> u64 {
        self.timer_epoch
    }

    /// Period between timer ticks at the current tempo.
    pub fn tick_period(&self) -> Duration {
        scheduler::tick_period(self.panel.tempo, self.config.tempo_base_ms)
    }

    pub fn readback(&self) -> Result<Readback> {
        Readback::capture(self)
    }
}

impl ClockFollower for Muse {
    fn slave_step(&mut self, clock_bit: u8) -> Result<()> {
        let own = self.engine.clock_bit();
        if self.sync.on_edge(clock_bit, own, self.panel.sequencing) {
            self.step()?;
        }
        Ok(())
    }

    fn release(&mut self) {
        let _ = self.sync.take_master();
        self.sync.set_mode(SlaveMode::Independent);
        self.leader = None;
        self.timer_epoch += 1;
        info!("released by master");
        self.notify(MuseEvent::Detached);
    }
}

impl ClockMaster for Muse {
    fn detach(&mut self, follower: FollowerId) {
        if self.sync.remove_follower(follower) {
            info!("detached {}", follower);
            self.notify(MuseEvent::Detached);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::builtin_preset;

    fn scale() -> Preset {
        builtin_preset("Scale").unwrap()
    }

    #[test]
    fn test_new_instance_defaults() {
        let muse = Muse::default();
        assert_eq!(muse.panel().transport, RunMode::Off);
        assert_eq!(muse.panel().sequencing, AutoMode::Auto);
        assert_eq!(muse.control(Control::Rest), 1);
        for control in Control::INTERVALS.iter().chain(&Control::THEMES) {
            assert_eq!(muse.control(*control), 0);
        }
        assert_eq!(muse.gain(), 0.0);
        assert!(!muse.timer_armed());
    }

    #[test]
    fn test_step_records_history() {
        let mut muse = Muse::default();
        muse.apply_preset(&scale()).unwrap();
        for _ in 0..4 {
            muse.step().unwrap();
        }
        // Scale: A=C1, B=C2, C=C4, so the address counts clock >> 1.
        assert_eq!(
            muse.history().to_vec(),
            vec![Some(2), Some(2), Some(4), Some(4)]
        );
    }

    #[test]
    fn test_control_validation() {
        let mut muse = Muse::default();
        assert!(matches!(
            muse.set_control(Control::Volume, 50),
            Err(MuseError::InvalidControlValue { .. })
        ));
        assert!(muse.set_control(Control::Transport, 3).is_err());
        assert!(muse.set_control(Control::ThemeW, 40).is_err());
        assert_eq!(muse.panel().volume, 20);

        muse.set_control(Control::ThemeW, 39).unwrap();
        assert_eq!(muse.engine().patch().theme[0], 39);
        assert_eq!(muse.control(Control::ThemeW), 39);
    }

    #[test]
    fn test_manual_step_idles_high() {
        let mut muse = Muse::default();
        muse.set_control(Control::Sequencing, 2).unwrap();
        assert_eq!(muse.engine().bus().clock, 2);
        assert_eq!(muse.engine().clock_bit(), 0);

        muse.release_control(Control::Sequencing).unwrap();
        assert_eq!(muse.panel().sequencing, AutoMode::Hold);
        assert_eq!(muse.engine().bus().clock, 3);
        assert_eq!(muse.engine().clock_bit(), 1);
        assert_eq!(muse.history().len(), 2);
    }

    #[test]
    fn test_transport_start_resets_and_springs_to_run() {
        let mut muse = Muse::default();
        muse.apply_preset(&scale()).unwrap();
        muse.step().unwrap();
        muse.step().unwrap();

        muse.set_control(Control::Transport, 0).unwrap();
        assert_eq!(muse.engine().bus().clock, 1);
        assert!(muse.history().is_empty());

        muse.release_control(Control::Transport).unwrap();
        assert_eq!(muse.panel().transport, RunMode::Run);
        assert!(muse.timer_armed());
        assert!(muse.gain() > 0.0);
    }

    #[test]
    fn test_transport_off_resets() {
        let mut muse = Muse::default();
        muse.set_control(Control::Transport, 1).unwrap();
        muse.step().unwrap();
        muse.set_control(Control::Transport, 2).unwrap();
        assert_eq!(muse.engine().bus().clock, 1);
        assert_eq!(muse.gain(), 0.0);
    }

    #[test]
    fn test_play_preset_arms_timer() {
        let mut muse = Muse::default();
        let epoch = muse.timer_epoch();
        muse.play_preset(&scale()).unwrap();
        assert!(muse.timer_armed());
        assert!(muse.timer_epoch() > epoch);
        assert_eq!(muse.engine().patch().interval, [3, 4, 5, 0]);
    }

    #[test]
    fn test_bad_preset_keeps_patch() {
        let mut muse = Muse::default();
        muse.apply_preset(&scale()).unwrap();
        let bad: Preset = "b1 b2 q7 off off off off off norm".parse().unwrap();
        assert!(matches!(
            muse.apply_preset(&bad),
            Err(MuseError::InvalidSwitchName { .. })
        ));
        assert_eq!(muse.engine().patch().interval, [3, 4, 5, 0]);
    }

    #[test]
    fn test_events() {
        let mut muse = Muse::default();
        let rx = muse.subscribe();
        muse.step().unwrap();
        muse.set_control(Control::Volume, 10).unwrap();
        muse.reset();

        let events: Vec<MuseEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                MuseEvent::Stepped {
                    pitch: Some(0),
                    clock_bit: 0
                },
                MuseEvent::ControlChanged {
                    control: Control::Volume,
                    value: 10
                },
                MuseEvent::Reset,
            ]
        );

        drop(rx);
        muse.step().unwrap();
        assert!(muse.listeners.is_empty());
    }

    #[test]
    fn test_execute() {
        let mut muse = Muse::default();
        assert_eq!(
            muse.execute(Command::Step).unwrap(),
            CommandResult::Stepped { pitch: Some(0) }
        );
        assert_eq!(
            muse.execute(Command::PlayPreset { preset: scale() }).unwrap(),
            CommandResult::Ok
        );
        assert_eq!(muse.panel().transport, RunMode::Run);
        muse.execute(Command::SetSlaveMode { mode: 3 }).unwrap();
        assert_eq!(muse.sync().mode(), SlaveMode::Divide(3));
        // Nothing drives it, so it keeps its own timer.
        assert!(muse.timer_armed());
        assert!(muse
            .execute(Command::SetControl {
                control: Control::Pitch,
                value: 99
            })
            .is_err());
    }

    #[test]
    fn test_frequency_and_readback() {
        let mut muse = Muse::default();
        muse.play_preset(&scale()).unwrap();
        muse.set_control(Control::Pitch, 0).unwrap();
        // Reset state: C1=0, C2=0, C4=0 -> address 0 -> tonic.
        assert_eq!(muse.frequency().unwrap(), 880.0);

        let readback = muse.readback().unwrap();
        assert_eq!(readback.pitch, Some(0));
        assert_eq!(readback.light_show, 0);
        assert!(readback.lamp(1));
        assert!(readback.lamp(2));
        assert!(!readback.lamp(0));
        assert!(readback.timer_armed);
        assert_eq!(readback.transport, RunMode::Run);
    }

    #[test]
    fn test_unplug_without_master_is_quiet() {
        let mut muse = Muse::default();
        muse.set_slave_mode(SlaveMode::Divide(2));
        let rx = muse.subscribe();
        let epoch = muse.timer_epoch();

        muse.unplug();
        assert_eq!(muse.sync().mode(), SlaveMode::Independent);
        assert_eq!(muse.timer_epoch(), epoch);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_follower_of_dropped_master_runs_its_own_timer() {
        let master = crate::bridge::shared(Muse::default());
        let follower = crate::bridge::spawn_follower(&master).unwrap();
        follower
            .borrow_mut()
            .set_control(Control::Transport, u32::from(RunMode::Run.position()))
            .unwrap();
        assert!(!follower.borrow().timer_armed());

        drop(master);
        let f = follower.borrow();
        assert!(f.sync().has_master());
        assert_eq!(f.sync().mode(), SlaveMode::Unison);
        assert!(f.timer_armed());
    }
}
