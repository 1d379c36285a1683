// src/state/mod.rs
//
// Input-side state for UI interaction.
//
// This module contains the structures an input adapter works with:
// the named controls, the panel positions they map to, and the commands
// that carry changes into an instrument.
//
// Key principles:
// - Controls form a closed set; there is no string addressing
// - Every value is validated against its control's domain
// - Mutations happen through Commands

mod command;
mod control;
mod panel;

pub use command::*;
pub use control::*;
pub use panel::*;
