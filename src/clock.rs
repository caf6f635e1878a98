// Time source for the blocking delays between gesture legs and monitor ticks

use std::time::Duration;

pub trait Clock {
    /// Block the calling thread for `duration`
    fn sleep(&mut self, duration: Duration);
}

/// Real wall-clock sleeping
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn sleep(&mut self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Deterministic clock: records every requested delay and returns at once
#[derive(Debug, Clone, Default)]
pub struct VirtualClock {
    sleeps: Vec<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every delay requested so far, oldest first
    pub fn sleeps(&self) -> &[Duration] {
        &self.sleeps
    }

    /// Total virtual time elapsed
    pub fn elapsed(&self) -> Duration {
        self.sleeps.iter().sum()
    }
}

impl Clock for VirtualClock {
    fn sleep(&mut self, duration: Duration) {
        self.sleeps.push(duration);
    }
}
