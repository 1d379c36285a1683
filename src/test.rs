// End-to-end checks across instruments, the sync bridge and the scheduler.

use std::time::Duration;

use crate::bridge::{SharedMuse, attach, shared, spawn_follower};
use crate::muse::Muse;
use crate::patch::builtin_preset;
use crate::scheduler::StepScheduler;
use crate::state::Control;
use crate::sync::SlaveMode;
use crate::transport::AutoMode;

fn pair(mode: u32) -> (SharedMuse, SharedMuse) {
    let master = shared(Muse::default());
    let follower = shared(Muse::default());
    follower
        .borrow_mut()
        .set_slave_mode(SlaveMode::from_raw(mode));
    attach(&master, &follower).unwrap();
    (master, follower)
}

/// Step the master `n` times, recording the master tick numbers (1-based)
/// on which the follower moved. Every follower tick must clear its divider.
fn drive(master: &SharedMuse, follower: &SharedMuse, n: usize) -> Vec<usize> {
    let mut moved = Vec::new();
    for tick in 1..=n {
        let before = follower.borrow().engine().bus().clock;
        master.borrow_mut().step().unwrap();
        let f = follower.borrow();
        if f.engine().bus().clock != before {
            assert_eq!(f.sync().divider(), 0, "divider kept after tick {}", tick);
            moved.push(tick);
        }
    }
    moved
}

// --------------------------------
// Follower modes
// --------------------------------

#[test]
fn unison_follower_stays_phase_locked() {
    let master = shared(Muse::default());
    master
        .borrow_mut()
        .apply_preset(&builtin_preset("Birds 1").unwrap())
        .unwrap();
    let follower = spawn_follower(&master).unwrap();

    for _ in 0..100 {
        master.borrow_mut().step().unwrap();
        let m = master.borrow();
        let f = follower.borrow();
        assert_eq!(f.engine().bus(), m.engine().bus());
        assert_eq!(f.pitch().unwrap(), m.pitch().unwrap());
    }
    assert_eq!(follower.borrow().history().to_vec(), master.borrow().history().to_vec());
}

#[test]
fn unison_follower_realigns_after_manual_step() {
    let (master, follower) = pair(1);
    // Knock the follower half a cycle out of phase.
    follower.borrow_mut().step().unwrap();
    assert_eq!(follower.borrow().engine().clock_bit(), 0);

    master.borrow_mut().step().unwrap();
    // Master is low, follower already low: no tick.
    assert_eq!(follower.borrow().engine().bus().clock, 2);

    master.borrow_mut().step().unwrap();
    assert_eq!(follower.borrow().engine().bus().clock, 3);
    assert_eq!(
        follower.borrow().engine().clock_bit(),
        master.borrow().engine().clock_bit()
    );
}

#[test]
fn even_divider_ticks_on_falling_edges() {
    let (master, follower) = pair(2);
    let moved = drive(&master, &follower, 20);

    assert_eq!(moved, vec![3, 5, 7, 9, 11, 13, 15, 17, 19]);
    assert_eq!(follower.borrow().engine().bus().clock, 10);
    assert_eq!(follower.borrow().sync().divider(), 1);
}

#[test]
fn odd_divider_ignores_phase() {
    let (master, follower) = pair(3);
    let moved = drive(&master, &follower, 20);

    assert_eq!(moved, vec![3, 6, 9, 12, 15, 18]);
    assert_eq!(follower.borrow().engine().bus().clock, 7);
}

#[test]
fn divider_resets_after_every_follower_tick() {
    let (master, follower) = pair(4);
    let moved = drive(&master, &follower, 40);

    // Four edges per tick, and only on a low master phase.
    assert_eq!(moved, vec![5, 9, 13, 17, 21, 25, 29, 33, 37]);
    assert_eq!(follower.borrow().sync().divider(), 3);
}

#[test]
fn hold_follower_ignores_edges() {
    let (master, follower) = pair(1);
    follower
        .borrow_mut()
        .set_control(Control::Sequencing, 1)
        .unwrap();
    assert_eq!(follower.borrow().panel().sequencing, AutoMode::Hold);

    drive(&master, &follower, 10);
    assert_eq!(follower.borrow().engine().bus().clock, 1);
    assert_eq!(follower.borrow().sync().divider(), 0);

    // Back to AUTO: the next edge lines it up again.
    follower
        .borrow_mut()
        .set_control(Control::Sequencing, 0)
        .unwrap();
    master.borrow_mut().step().unwrap();
    assert_eq!(
        follower.borrow().engine().clock_bit(),
        master.borrow().engine().clock_bit()
    );
}

#[test]
fn follower_events_arrive_during_master_step() {
    let (master, follower) = pair(1);
    let rx = follower.borrow_mut().subscribe();
    master.borrow_mut().step().unwrap();
    assert_eq!(rx.try_iter().count(), 1);
}

// --------------------------------
// Unplugging
// --------------------------------

#[test]
fn unplug_from_follower_side() {
    let (master, follower) = pair(1);
    follower.borrow_mut().unplug();

    assert_eq!(master.borrow().sync().follower_count(), 0);
    assert_eq!(follower.borrow().sync().mode(), SlaveMode::Independent);
    assert!(!follower.borrow().sync().has_master());

    drive(&master, &follower, 4);
    assert_eq!(follower.borrow().engine().bus().clock, 1);

    // Free to follow again.
    attach(&master, &follower).unwrap();
}

#[test]
fn unplug_all_from_master_side() {
    let master = shared(Muse::default());
    let a = spawn_follower(&master).unwrap();
    let b = spawn_follower(&master).unwrap();
    assert_eq!(master.borrow().sync().follower_count(), 2);

    master.borrow_mut().unplug_all();
    assert_eq!(master.borrow().sync().follower_count(), 0);
    for follower in [&a, &b] {
        let f = follower.borrow();
        assert_eq!(f.sync().mode(), SlaveMode::Independent);
        assert!(!f.sync().has_master());
    }
}

#[test]
fn dropped_follower_is_pruned() {
    let master = shared(Muse::default());
    let kept = spawn_follower(&master).unwrap();
    let dropped = spawn_follower(&master).unwrap();
    drop(dropped);

    master.borrow_mut().step().unwrap();
    assert_eq!(master.borrow().sync().follower_count(), 1);
    assert_eq!(kept.borrow().engine().bus().clock, 2);
}

#[test]
fn dropped_master_hands_follower_its_own_timer() {
    let master = shared(Muse::default());
    master
        .borrow_mut()
        .play_preset(&builtin_preset("Polka").unwrap())
        .unwrap();
    let follower = spawn_follower(&master).unwrap();
    follower
        .borrow_mut()
        .set_control(Control::Transport, 1)
        .unwrap();

    let mut timer = StepScheduler::new();
    assert_eq!(timer.advance(&mut follower.borrow_mut(), Duration::from_secs(1)).unwrap(), 0);

    drop(master);
    timer.advance(&mut follower.borrow_mut(), Duration::ZERO).unwrap();
    assert!(timer.is_running());
    assert_eq!(timer.advance(&mut follower.borrow_mut(), TEMPO_25).unwrap(), 1);
}

#[test]
fn dropped_master_leaves_follower_usable() {
    let master = shared(Muse::default());
    let follower = spawn_follower(&master).unwrap();
    drop(master);

    follower.borrow_mut().unplug();
    assert_eq!(follower.borrow().sync().mode(), SlaveMode::Independent);
    follower.borrow_mut().step().unwrap();

    let other = shared(Muse::default());
    attach(&other, &follower).unwrap();
}

// --------------------------------
// Scheduler
// --------------------------------

const TEMPO_25: Duration = Duration::from_micros(362_500);

#[test]
fn scheduler_idle_while_off() {
    let mut muse = Muse::default();
    let mut scheduler = StepScheduler::new();
    assert_eq!(scheduler.advance(&mut muse, Duration::from_secs(5)).unwrap(), 0);
    assert!(!scheduler.is_running());
    assert_eq!(muse.engine().bus().clock, 1);
}

#[test]
fn scheduler_runs_after_play_preset() {
    let mut muse = Muse::default();
    let mut scheduler = StepScheduler::new();
    muse.play_preset(&builtin_preset("Scale").unwrap()).unwrap();

    assert_eq!(scheduler.advance(&mut muse, Duration::from_secs(1)).unwrap(), 2);
    assert_eq!(scheduler.period(), Some(TEMPO_25));
    assert_eq!(muse.engine().bus().clock, 3);

    // 275 ms carried over
    assert_eq!(scheduler.advance(&mut muse, Duration::from_millis(100)).unwrap(), 1);
}

#[test]
fn scheduler_follows_tempo_changes() {
    let mut muse = Muse::default();
    let mut scheduler = StepScheduler::new();
    muse.play_preset(&builtin_preset("Scale").unwrap()).unwrap();
    scheduler.advance(&mut muse, Duration::ZERO).unwrap();

    muse.set_control(Control::Tempo, 0).unwrap();
    assert_eq!(scheduler.advance(&mut muse, Duration::from_millis(120)).unwrap(), 2);
    assert_eq!(scheduler.period(), Some(Duration::from_millis(50)));
}

#[test]
fn scheduler_parks_hold_on_high_phase() {
    let mut muse = Muse::default();
    let mut scheduler = StepScheduler::new();
    muse.play_preset(&builtin_preset("Scale").unwrap()).unwrap();

    assert_eq!(scheduler.advance(&mut muse, Duration::from_millis(400)).unwrap(), 1);
    assert_eq!(muse.engine().clock_bit(), 0);

    muse.set_control(Control::Sequencing, 1).unwrap();
    // One more tick brings the clock high, then the timer stops.
    assert_eq!(scheduler.advance(&mut muse, Duration::from_millis(800)).unwrap(), 1);
    assert_eq!(muse.engine().clock_bit(), 1);
    assert!(!scheduler.is_running());
    assert_eq!(scheduler.advance(&mut muse, Duration::from_secs(2)).unwrap(), 0);

    // AUTO re-arms.
    muse.set_control(Control::Sequencing, 0).unwrap();
    assert_eq!(scheduler.advance(&mut muse, TEMPO_25).unwrap(), 1);
    assert!(scheduler.is_running());
}

#[test]
fn scheduler_stops_on_transport_off() {
    let mut muse = Muse::default();
    let mut scheduler = StepScheduler::new();
    muse.play_preset(&builtin_preset("Scale").unwrap()).unwrap();
    scheduler.advance(&mut muse, Duration::from_secs(1)).unwrap();

    muse.set_control(Control::Transport, 2).unwrap();
    assert_eq!(scheduler.advance(&mut muse, Duration::from_secs(1)).unwrap(), 0);
    assert!(!scheduler.is_running());
    scheduler.cancel();
    scheduler.cancel();
    assert!(!scheduler.is_running());
}

#[test]
fn scheduled_master_drives_follower() {
    let master = shared(Muse::default());
    master
        .borrow_mut()
        .play_preset(&builtin_preset("Polka").unwrap())
        .unwrap();
    let follower = spawn_follower(&master).unwrap();

    let mut master_timer = StepScheduler::new();
    let mut follower_timer = StepScheduler::new();
    let dt = Duration::from_millis(16);
    for _ in 0..250 {
        master_timer.advance(&mut master.borrow_mut(), dt).unwrap();
        follower_timer.advance(&mut follower.borrow_mut(), dt).unwrap();
    }

    assert!(!follower_timer.is_running());
    let m = master.borrow();
    let f = follower.borrow();
    assert!(m.history().len() >= 10);
    assert_eq!(f.engine().bus(), m.engine().bus());
}
