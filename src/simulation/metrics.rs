//! Running counters for a simulation run and the final metrics they produce

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::lane::LaneState;
use super::movement::BlockReason;
use super::types::{Direction, DirectionMap};

/// Aggregate outcome of a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub scenario_name: String,
    pub steps: usize,
    pub vehicles_spawned: usize,
    pub vehicles_completed: usize,
    pub active_vehicles: usize,
    pub blocked_by_signal: usize,
    pub blocked_by_traffic: usize,
    pub potential_collisions: usize,
    pub total_distance: usize,
    /// Cells moved per vehicle-step
    pub average_network_speed: f64,
    pub average_wait_per_trip: f64,
    pub average_trip_duration: f64,
    pub throughput_per_100_steps: f64,
    pub max_queue_overall: usize,
    pub direction_stats: BTreeMap<Direction, DirStats>,
}

/// Per-direction breakdown of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DirStats {
    pub spawned: usize,
    pub completed: usize,
    pub average_wait: f64,
    pub average_duration: f64,
    pub max_queue: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct DirectionTotals {
    spawned: usize,
    completed: usize,
    wait_ended: usize,
    trip_ended: usize,
}

/// Counters the engine updates while it steps
#[derive(Debug, Clone, Default)]
pub struct MetricsAggregator {
    total_vehicle_steps: usize,
    total_distance: usize,
    total_wait_ended: usize,
    total_trip_ended: usize,
    blocked_signal: usize,
    blocked_traffic: usize,
    potential_collisions: usize,
    max_queue_overall: usize,
    per_direction: DirectionMap<DirectionTotals>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_spawn(&mut self, direction: Direction) {
        self.per_direction[direction].spawned += 1;
    }

    pub fn record_queue_length(&mut self, queued: usize) {
        self.max_queue_overall = self.max_queue_overall.max(queued);
    }

    pub fn record_collisions(&mut self, cells: usize) {
        self.potential_collisions += cells;
    }

    /// One vehicle took part in one step, moving or not
    pub fn record_vehicle_step(&mut self) {
        self.total_vehicle_steps += 1;
    }

    pub fn record_move(&mut self) {
        self.total_distance += 1;
    }

    pub fn record_completion(&mut self, direction: Direction, trip_duration: usize, waited: usize) {
        self.total_trip_ended += trip_duration;
        self.total_wait_ended += waited;
        let totals = &mut self.per_direction[direction];
        totals.completed += 1;
        totals.trip_ended += trip_duration;
        totals.wait_ended += waited;
    }

    pub fn record_block(&mut self, reason: BlockReason) {
        match reason {
            BlockReason::Signal => self.blocked_signal += 1,
            BlockReason::Traffic => self.blocked_traffic += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.per_direction.iter().map(|(_, totals)| totals.completed).sum()
    }

    pub fn spawned(&self) -> usize {
        self.per_direction.iter().map(|(_, totals)| totals.spawned).sum()
    }

    pub fn blocked_by_signal(&self) -> usize {
        self.blocked_signal
    }

    pub fn blocked_by_traffic(&self) -> usize {
        self.blocked_traffic
    }

    pub fn potential_collisions(&self) -> usize {
        self.potential_collisions
    }

    pub fn max_queue_overall(&self) -> usize {
        self.max_queue_overall
    }

    pub fn average_network_speed(&self) -> f64 {
        ratio(self.total_distance, self.total_vehicle_steps)
    }

    /// Completed trips per 100 steps out of `steps` simulated
    pub fn throughput_per_100_steps(&self, steps: usize) -> f64 {
        ratio(self.completed(), steps) * 100.0
    }

    /// Fold the counters into a report for `steps` simulated steps
    pub fn finish(
        &self,
        scenario_name: &str,
        steps: usize,
        active_vehicles: usize,
        lanes: &DirectionMap<Option<LaneState>>,
    ) -> Metrics {
        let completed = self.completed();

        let direction_stats = lanes
            .iter()
            .filter_map(|(direction, lane)| {
                let lane = lane.as_ref()?;
                let totals = self.per_direction[direction];
                Some((
                    direction,
                    DirStats {
                        spawned: totals.spawned,
                        completed: totals.completed,
                        average_wait: ratio(totals.wait_ended, totals.completed),
                        average_duration: ratio(totals.trip_ended, totals.completed),
                        max_queue: lane.max_queue_observed,
                    },
                ))
            })
            .collect();

        Metrics {
            scenario_name: scenario_name.to_string(),
            steps,
            vehicles_spawned: active_vehicles + completed,
            vehicles_completed: completed,
            active_vehicles,
            blocked_by_signal: self.blocked_signal,
            blocked_by_traffic: self.blocked_traffic,
            potential_collisions: self.potential_collisions,
            total_distance: self.total_distance,
            average_network_speed: self.average_network_speed(),
            average_wait_per_trip: ratio(self.total_wait_ended, completed),
            average_trip_duration: ratio(self.total_trip_ended, completed),
            throughput_per_100_steps: self.throughput_per_100_steps(steps),
            max_queue_overall: self.max_queue_overall,
            direction_stats,
        }
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}
