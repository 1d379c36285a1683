// src/scheduler.rs

use std::time::Duration;

use log::debug;

use crate::error::Result;
use crate::muse::Muse;
use crate::transport::AutoMode;

/// Shortest period the scheduler will run at.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Tick period for a TEMPO slider position: `0.5 * (base + tempo^2)` ms.
pub fn tick_period(tempo: u8, base_ms: f64) -> Duration {
    // 0.5 ms == 500 us
    let micros = (base_ms + f64::from(tempo).powi(2)) * 500.0;
    Duration::from_micros(micros.max(0.0).round() as u64).max(MIN_PERIOD)
}

/// Drives an instrument's periodic ticks from elapsed wall time.
///
/// This struct owns no timer of its own. The host calls
/// [`StepScheduler::advance`] from whatever periodic callback it has, and
/// the scheduler decides how many ticks are due.
///
/// Arming follows the panel. The timer runs only while the transport is
/// on, sequencing is AUTO and the instance is not a follower. It is
/// re-evaluated only when the instrument signals a re-arm (transport or
/// tempo change, entering AUTO, playing a preset). Switching to HOLD
/// therefore leaves it running until it reaches a high clock phase, where
/// it parks.
#[derive(Debug, Default)]
pub struct StepScheduler {
    /// Active period, `None` when stopped
    period: Option<Duration>,

    /// Time accumulated toward the next tick
    elapsed: Duration,

    /// Instrument re-arm counter last acted on
    epoch: Option<u64>,
}

impl StepScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_running(&self) -> bool {
        self.period.is_some()
    }

    #[inline]
    pub fn period(&self) -> Option<Duration> {
        self.period
    }

    /// Re-evaluate arming and period against the instrument's panel.
    pub fn sync(&mut self, muse: &Muse) {
        self.epoch = Some(muse.timer_epoch());
        if muse.timer_armed() {
            self.period = Some(muse.tick_period());
            self.elapsed = Duration::ZERO;
        } else {
            self.cancel();
        }
    }

    /// Stop the timer. Stopping a stopped timer does nothing.
    pub fn cancel(&mut self) {
        self.period = None;
        self.elapsed = Duration::ZERO;
    }

    /// Account for `dt` of wall time and run every tick that fell due.
    ///
    /// Returns the number of ticks taken.
    pub fn advance(&mut self, muse: &mut Muse, dt: Duration) -> Result<usize> {
        // A dropped master arms the follower without touching its epoch.
        let stale = self.epoch != Some(muse.timer_epoch());
        if stale || (self.period.is_none() && muse.timer_armed()) {
            self.sync(muse);
        }
        if self.period.is_none() {
            return Ok(0);
        }

        self.elapsed += dt;
        let mut steps = 0;

        while let Some(period) = self.period {
            if self.elapsed < period {
                break;
            }
            self.elapsed -= period;

            // HOLD parks on a high clock phase
            if muse.panel().sequencing == AutoMode::Hold && muse.engine().clock_bit() == 1 {
                debug!("hold reached a high clock phase, stopping timer");
                self.cancel();
                break;
            }

            muse.step()?;
            steps += 1;
        }

        Ok(steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_formula() {
        assert_eq!(tick_period(25, 100.0), Duration::from_micros(362_500));
        assert_eq!(tick_period(0, 100.0), Duration::from_millis(50));
        assert_eq!(tick_period(49, 50.0), Duration::from_micros(1_225_500));
        assert_eq!(tick_period(0, 0.0), MIN_PERIOD);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = StepScheduler::new();
        scheduler.cancel();
        scheduler.cancel();
        assert!(!scheduler.is_running());
    }
}
