//! Periodic timers: light sweep, aggressive sweep, guard refresh.
//!
//! The intervals are owned by the coordinator loop and polled from its
//! `select!`; dropping the sweeper cancels them.

use mediashade_core::TimerConfig;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Which timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Light,
    Aggressive,
    GuardRefresh,
}

pub struct PeriodicSweeper {
    light: Interval,
    aggressive: Interval,
    guard_refresh: Interval,
}

impl PeriodicSweeper {
    /// Start all three timers. The first tick of each comes one full period
    /// from now; the initial sweep has already run by then.
    pub fn new(timers: &TimerConfig) -> Self {
        Self {
            light: periodic(timers.light_sweep()),
            aggressive: periodic(timers.aggressive_sweep()),
            guard_refresh: periodic(timers.guard_refresh()),
        }
    }

    /// Wait for the next timer to fire. Cancel-safe.
    pub async fn tick(&mut self) -> Tick {
        tokio::select! {
            _ = self.light.tick() => Tick::Light,
            _ = self.aggressive.tick() => Tick::Aggressive,
            _ = self.guard_refresh.tick() => Tick::GuardRefresh,
        }
    }
}

fn periodic(period: std::time::Duration) -> Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    // A stalled loop should not come back to a burst of sweeps.
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}
