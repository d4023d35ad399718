//! Per-direction entry lane bookkeeping

use super::config::{DemandProfile, LaneSpawnConfig};
use super::types::{Cell, Direction};

/// Queueing state of one entry lane
#[derive(Debug, Clone)]
pub struct LaneState {
    pub direction: Direction,
    pub entry: Cell,
    pub interval: usize,
    /// 0 means no cap
    pub max_vehicles: usize,
    pub spawned: usize,
    pub queued: usize,
    pub max_queue_observed: usize,
    pub profile: DemandProfile,
}

impl LaneState {
    pub fn new(direction: Direction, config: &LaneSpawnConfig, profile: DemandProfile) -> Self {
        Self {
            direction,
            entry: config.entry(),
            interval: usize::try_from(config.step_interval).unwrap_or(0),
            max_vehicles: usize::try_from(config.max_vehicles).unwrap_or(0),
            spawned: 0,
            queued: 0,
            max_queue_observed: 0,
            profile,
        }
    }

    /// New arrivals for the 0-based `step`.
    ///
    /// A non-empty demand profile takes precedence over the fixed interval.
    pub fn arrivals_for_step(&self, step: usize) -> usize {
        if !self.profile.is_empty() {
            return self.profile.get(&(step + 1)).copied().unwrap_or(0);
        }
        if self.interval == 0 {
            return 0;
        }
        usize::from((step + 1) % self.interval == 0)
    }

    /// Add arrivals to the queue and return the new queue length
    pub fn enqueue(&mut self, arrivals: usize) -> usize {
        self.queued += arrivals;
        self.max_queue_observed = self.max_queue_observed.max(self.queued);
        self.queued
    }

    pub fn cap_reached(&self) -> bool {
        self.max_vehicles > 0 && self.spawned >= self.max_vehicles
    }
}
