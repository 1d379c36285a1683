//! Master/follower clock synchronization.
//!
//! A master broadcasts its clock phase after every tick. Each follower
//! decides on its own whether that edge makes it tick, depending on its
//! [`SlaveMode`]. There is no acknowledgement: a lost or doubled edge just
//! shifts the follower's phase until the next edge realigns it.
//!
//! Links are weak in both directions. A master holds weak handles to its
//! followers and prunes the ones that have been dropped; a follower holds
//! one weak handle to its master's [`ClockMaster`] interface.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use log::warn;

use crate::error::Result;
use crate::transport::AutoMode;

/// How a follower derives its clock from the master's edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlaveMode {
    /// Not following anyone.
    #[default]
    Independent,
    /// Phase-locked to the master's C 1/2.
    Unison,
    /// One tick per N master edges. Even N lines up on the master's
    /// falling edge.
    Divide(u32),
}

impl SlaveMode {
    /// Decode the raw selector: 0 independent, 1 unison, N divide-by-N.
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => SlaveMode::Independent,
            1 => SlaveMode::Unison,
            n => SlaveMode::Divide(n),
        }
    }

    pub fn raw(self) -> u32 {
        match self {
            SlaveMode::Independent => 0,
            SlaveMode::Unison => 1,
            SlaveMode::Divide(n) => n,
        }
    }

    #[inline]
    pub fn is_follower(self) -> bool {
        self != SlaveMode::Independent
    }
}

/// Identifier a master hands out to each follower it registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FollowerId(pub u64);

impl fmt::Display for FollowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "follower#{}", self.0)
    }
}

/// What a master may call on a follower.
pub trait ClockFollower {
    /// Receive the master's clock phase after one of its ticks.
    fn slave_step(&mut self, clock_bit: u8) -> Result<()>;

    /// The master is going away; stop following.
    fn release(&mut self);
}

/// What a follower may call on its master.
pub trait ClockMaster {
    /// Forget a follower.
    fn detach(&mut self, follower: FollowerId);
}

/// Shared handle to a follower.
pub type FollowerPort = Rc<RefCell<dyn ClockFollower>>;

/// Shared handle to a master.
pub type MasterPort = Rc<RefCell<dyn ClockMaster>>;

struct FollowerLink {
    id: FollowerId,
    port: Weak<RefCell<dyn ClockFollower>>,
}

struct MasterLink {
    id: FollowerId,
    port: Weak<RefCell<dyn ClockMaster>>,
}

/// Sync state of one instance: its own follower mode and divider, the
/// followers it drives, and the master it follows.
#[derive(Default)]
pub struct SyncController {
    mode: SlaveMode,

    /// Edges received since this instance last ticked.
    divider: u32,

    /// Followers, in registration order.
    followers: Vec<FollowerLink>,

    master: Option<MasterLink>,

    next_id: u64,
}

impl fmt::Debug for SyncController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncController")
            .field("mode", &self.mode)
            .field("divider", &self.divider)
            .field("followers", &self.followers.len())
            .field("master", &self.master.as_ref().map(|m| m.id))
            .finish()
    }
}

impl SyncController {
    pub fn new() -> Self {
        Self::default()
    }

    // -------------------------------
    // MARK: Follower side
    // -------------------------------

    #[inline]
    pub fn mode(&self) -> SlaveMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: SlaveMode) {
        self.mode = mode;
    }

    #[inline]
    pub fn divider(&self) -> u32 {
        self.divider
    }

    /// Decide whether a received master edge makes this instance tick.
    ///
    /// Only an instance in AUTO reacts; HOLD and STEP are under local
    /// control and ignore the master entirely.
    pub fn on_edge(&mut self, clock_bit: u8, own_clock_bit: u8, sequencing: AutoMode) -> bool {
        if sequencing != AutoMode::Auto {
            return false;
        }
        self.divider = self.divider.saturating_add(1);

        match self.mode {
            SlaveMode::Independent => false,
            SlaveMode::Unison => clock_bit != own_clock_bit,
            SlaveMode::Divide(n) if n % 2 == 0 => clock_bit == 0 && self.divider >= n,
            SlaveMode::Divide(n) => self.divider >= n,
        }
    }

    /// Called whenever this instance ticks, whatever the cause.
    #[inline]
    pub fn on_tick(&mut self) {
        self.divider = 0;
    }

    /// Record the master this instance follows.
    pub fn set_master(&mut self, id: FollowerId, port: &MasterPort) {
        self.master = Some(MasterLink {
            id,
            port: Rc::downgrade(port),
        });
    }

    /// Forget the master, returning its handle if it is still alive.
    pub fn take_master(&mut self) -> Option<(FollowerId, MasterPort)> {
        let link = self.master.take()?;
        link.port.upgrade().map(|port| (link.id, port))
    }

    /// Handle to the master, if it is still alive.
    pub fn master(&self) -> Option<MasterPort> {
        self.master.as_ref().and_then(|link| link.port.upgrade())
    }

    #[inline]
    pub fn has_master(&self) -> bool {
        self.master.is_some()
    }

    // -------------------------------
    // MARK: Master side
    // -------------------------------

    /// Register a follower. Edges go out in registration order.
    pub fn add_follower(&mut self, port: &FollowerPort) -> FollowerId {
        self.next_id += 1;
        let id = FollowerId(self.next_id);
        self.followers.push(FollowerLink {
            id,
            port: Rc::downgrade(port),
        });
        id
    }

    /// Remove a follower. Returns false if it was not registered.
    pub fn remove_follower(&mut self, id: FollowerId) -> bool {
        let before = self.followers.len();
        self.followers.retain(|link| link.id != id);
        self.followers.len() != before
    }

    /// Followers that are still alive, in registration order.
    ///
    /// Dropped followers are pruned here.
    pub fn live_followers(&mut self) -> Vec<FollowerPort> {
        let mut live = Vec::with_capacity(self.followers.len());
        self.followers.retain(|link| match link.port.upgrade() {
            Some(port) => {
                live.push(port);
                true
            }
            None => {
                warn!("pruning dropped {}", link.id);
                false
            }
        });
        live
    }

    /// Unregister every follower, returning the live ones.
    pub fn take_followers(&mut self) -> Vec<FollowerPort> {
        self.followers
            .drain(..)
            .filter_map(|link| link.port.upgrade())
            .collect()
    }

    pub fn follower_count(&self) -> usize {
        self.followers
            .iter()
            .filter(|link| link.port.strong_count() > 0)
            .count()
    }

    pub fn follower_ids(&self) -> Vec<FollowerId> {
        self.followers.iter().map(|link| link.id).collect()
    }
}
