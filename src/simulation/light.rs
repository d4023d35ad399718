//! Two-phase traffic light at the intersection cell

use serde::{Deserialize, Serialize};

use super::config::SignalConfig;
use super::types::Axis;

/// Light state: which road currently has green, plus a step timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficLight {
    pub vertical_green: bool,
    pub timer: u64,
}

impl Default for TrafficLight {
    fn default() -> Self {
        Self::new()
    }
}

impl TrafficLight {
    /// Vertical green, timer at zero
    pub fn new() -> Self {
        Self {
            vertical_green: true,
            timer: 0,
        }
    }

    /// Whether vehicles travelling on `axis` may enter the intersection
    pub fn is_green_for(&self, axis: Axis) -> bool {
        match axis {
            Axis::Vertical => self.vertical_green,
            Axis::Horizontal => !self.vertical_green,
        }
    }

    /// Advance one step and recompute the phase from the timer.
    ///
    /// A non-positive cycle length leaves the phase untouched.
    pub fn advance(&mut self, signal: &SignalConfig) {
        self.timer += 1;
        let cycle =
            i64::from(signal.vertical_green_steps) + i64::from(signal.horizontal_green_steps);
        if cycle <= 0 {
            return;
        }
        let step_in_cycle = (self.timer as i64 - 1) % cycle;
        self.vertical_green = step_in_cycle < i64::from(signal.vertical_green_steps);
    }
}
