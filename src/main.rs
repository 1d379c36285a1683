// src/main.rs

use std::time::Duration;

use muse::{Muse, MuseConfig, StepScheduler, builtin_preset, shared, spawn_follower};

/// ===============================
/// Main
/// ===============================

fn main() -> muse::Result<()> {
    let frame = Duration::from_millis(16);
    let frames = 500;

    // --------------------------------
    // Master + follower
    // --------------------------------

    let master = shared(Muse::new(MuseConfig::default()));
    let Some(preset) = builtin_preset("Christmas Bells") else {
        eprintln!("preset table is missing 'Christmas Bells'");
        return Ok(());
    };
    master.borrow_mut().play_preset(&preset)?;

    let follower = spawn_follower(&master)?;

    let mut scheduler = StepScheduler::new();

    // --------------------------------
    // Run a few seconds of wall time
    // --------------------------------

    println!("Playing '{}' with a unison follower…", preset.name);

    for _ in 0..frames {
        let steps = scheduler.advance(&mut master.borrow_mut(), frame)?;
        if steps == 0 {
            continue;
        }

        let m = master.borrow();
        let f = follower.borrow();
        let readback = m.readback()?;
        let note = match readback.pitch {
            Some(pitch) => format!("{:>2}", pitch),
            None => "--".to_string(),
        };
        println!(
            "clock {:>2} | note {} | {:7.2} Hz | light show {:04b} | follower clock {:>2}",
            readback.clock,
            note,
            readback.frequency_hz,
            readback.light_show,
            f.engine().bus().clock,
        );
    }

    println!(
        "Played {} notes.",
        master.borrow().history().len()
    );
    Ok(())
}
