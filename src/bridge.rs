//! Linking instruments into master/follower groups.
//!
//! Instruments are shared as [`SharedMuse`] handles. A link is made here
//! and nowhere else, so the rules about who may follow whom live in one
//! place:
//!
//! - an instance cannot follow itself
//! - a follower cannot drive other instances, and a master cannot follow
//! - a follower has at most one master
//!
//! Asking a follower to spawn another follower spawns it on the follower's
//! own master, so groups stay one level deep.
//!
//! # Usage
//!
//! ```ignore
//! let master = shared(Muse::default());
//! let follower = spawn_follower(&master)?;
//!
//! // Every master step now reaches the follower.
//! master.borrow_mut().step()?;
//!
//! // Either side can break the link.
//! follower.borrow_mut().unplug();
//! ```

use std::cell::RefCell;
use std::rc::Rc;

use log::{debug, info};

use crate::error::{MuseError, Result};
use crate::event::MuseEvent;
use crate::muse::Muse;
use crate::sync::{FollowerId, FollowerPort, MasterPort, SlaveMode};

/// Handle to an instrument shared between a host and its sync partners.
pub type SharedMuse = Rc<RefCell<Muse>>;

/// Wrap an instrument for sharing.
pub fn shared(muse: Muse) -> SharedMuse {
    Rc::new(RefCell::new(muse))
}

fn refuse(reason: &'static str) -> MuseError {
    MuseError::InvalidSyncLink { reason }
}

/// Make `follower` follow `master`.
///
/// A follower with no mode yet is put in unison. Nothing changes if the
/// link is refused.
pub fn attach(master: &SharedMuse, follower: &SharedMuse) -> Result<FollowerId> {
    if Rc::ptr_eq(master, follower) {
        return Err(refuse("an instance cannot follow itself"));
    }

    let mut m = master
        .try_borrow_mut()
        .map_err(|_| refuse("master is busy"))?;
    let mut f = follower
        .try_borrow_mut()
        .map_err(|_| refuse("follower is busy"))?;

    if m.sync().master().is_some() {
        return Err(refuse("a follower cannot drive other instances"));
    }
    if f.sync().master().is_some() {
        return Err(refuse("follower already has a master"));
    }
    if f.sync().follower_count() > 0 {
        return Err(refuse("a master cannot follow another instance"));
    }

    let follower_port: FollowerPort = follower.clone();
    let master_port: MasterPort = master.clone();

    let id = m.sync_mut().add_follower(&follower_port);
    f.sync_mut().set_master(id, &master_port);
    f.set_leader(master);
    if !f.sync().mode().is_follower() {
        f.set_slave_mode(SlaveMode::Unison);
    }

    info!("attached {} in mode {}", id, f.sync().mode().raw());
    m.notify(MuseEvent::FollowerAttached { follower: id });
    Ok(id)
}

/// Create a new instance that plays the master's patch in unison.
///
/// The follower starts with the transport OFF; it is driven by the
/// master's edges, not by a timer of its own. When `master` is itself a
/// follower, the new instance joins `master`'s own master instead.
pub fn spawn_follower(master: &SharedMuse) -> Result<SharedMuse> {
    let leader = master
        .try_borrow()
        .map_err(|_| refuse("master is busy"))?
        .leader();
    if let Some(root) = leader {
        debug!("forwarding spawn to the root master");
        return spawn_follower(&root);
    }

    let follower = {
        let m = master
            .try_borrow()
            .map_err(|_| refuse("master is busy"))?;
        let mut follower = Muse::new(m.config().clone());
        follower.copy_patch_from(&m);
        follower
    };

    let follower = shared(follower);
    attach(master, &follower)?;
    Ok(follower)
}
