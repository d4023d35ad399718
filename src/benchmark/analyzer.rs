//! Safety and ride-quality signals derived from a recorded timeline
//!
//! Speeds are measured in cells per step from consecutive snapshots of the
//! same vehicle. From those the analyzer derives hard brakes, mean absolute
//! jerk and the minimum time-to-collision between lane neighbours.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::simulation::{Cell, Direction, Report, StepSnapshot, Vehicle, VehicleId};

/// Reported when no pair of vehicles was ever observed closing in
pub const NO_CLOSING_TTC: f64 = 1_000_000.0;

/// Deceleration (cells/step²) at or beyond which a step counts as a hard brake
pub const HARD_BRAKE_DECEL: f64 = -1.0;

/// Aggregate benchmark outcome of one scenario run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scorecard {
    pub scenario_name: String,
    pub vehicles_completed: usize,
    #[serde(rename = "throughput_per_100_steps")]
    pub throughput_per_100: f64,
    #[serde(rename = "average_delay_steps")]
    pub average_delay: f64,
    pub potential_collisions: usize,
    #[serde(rename = "min_ttc_steps")]
    pub min_ttc: f64,
    pub mean_abs_jerk: f64,
    pub hard_brakes: usize,
}

impl Scorecard {
    /// Score a run from its metrics and captured timeline
    pub fn from_report(report: &Report) -> Self {
        let analysis = analyze_timeline(&report.timeline);
        Self {
            scenario_name: report.metrics.scenario_name.clone(),
            vehicles_completed: report.metrics.vehicles_completed,
            throughput_per_100: report.metrics.throughput_per_100_steps,
            average_delay: report.metrics.average_wait_per_trip,
            potential_collisions: report.metrics.potential_collisions,
            min_ttc: analysis.min_ttc,
            mean_abs_jerk: analysis.mean_abs_jerk,
            hard_brakes: analysis.hard_brakes,
        }
    }
}

/// Signals computed from a timeline alone
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimelineAnalysis {
    pub min_ttc: f64,
    pub mean_abs_jerk: f64,
    pub hard_brakes: usize,
}

impl Default for TimelineAnalysis {
    fn default() -> Self {
        Self {
            min_ttc: NO_CLOSING_TTC,
            mean_abs_jerk: 0.0,
            hard_brakes: 0,
        }
    }
}

/// Last observation of a vehicle
#[derive(Debug, Clone, Copy)]
struct MotionState {
    cell: Cell,
    speed: f64,
    accel: f64,
}

/// Walk the timeline in order and derive TTC, jerk and hard brakes.
///
/// The result depends only on the snapshots; analysing the same timeline
/// twice gives the same answer.
pub fn analyze_timeline(timeline: &[StepSnapshot]) -> TimelineAnalysis {
    if timeline.is_empty() {
        return TimelineAnalysis::default();
    }

    let mut states: HashMap<VehicleId, MotionState> = HashMap::new();
    let mut min_ttc = OrderedFloat(NO_CLOSING_TTC);
    let mut jerk_sum = 0.0;
    let mut jerk_samples = 0usize;
    let mut hard_brakes = 0;

    for snapshot in timeline {
        let mut speeds: HashMap<VehicleId, f64> = HashMap::with_capacity(snapshot.vehicles.len());
        for vehicle in &snapshot.vehicles {
            let cell = vehicle.cell();
            let previous = states.get(&vehicle.id).copied();

            let speed = previous.map_or(0.0, |prev| f64::from(cell.manhattan(prev.cell)));
            let accel = speed - previous.map_or(0.0, |prev| prev.speed);

            if let Some(prev) = previous {
                if accel <= HARD_BRAKE_DECEL {
                    hard_brakes += 1;
                }
                jerk_sum += (accel - prev.accel).abs();
                jerk_samples += 1;
            }

            speeds.insert(vehicle.id, speed);
            states.insert(vehicle.id, MotionState { cell, speed, accel });
        }

        min_ttc = min_ttc.min(OrderedFloat(min_ttc_step(&snapshot.vehicles, &speeds)));
    }

    let mean_abs_jerk = if jerk_samples > 0 {
        jerk_sum / jerk_samples as f64
    } else {
        0.0
    };

    TimelineAnalysis {
        min_ttc: min_ttc.into_inner(),
        mean_abs_jerk,
        hard_brakes,
    }
}

/// Minimum time-to-collision between adjacent vehicles of the same lane.
///
/// Vehicles share a lane when they travel the same direction on the same
/// row or column. When no pair in the step is closing, the smallest
/// headway (gap + 1) is returned instead; with no pairs at all the result
/// is [`NO_CLOSING_TTC`]. Missing speeds count as zero.
pub fn min_ttc_step(vehicles: &[Vehicle], speeds: &HashMap<VehicleId, f64>) -> f64 {
    let mut lanes: BTreeMap<(Direction, i32), Vec<&Vehicle>> = BTreeMap::new();
    for vehicle in vehicles {
        lanes
            .entry((vehicle.direction, lane_coordinate(vehicle)))
            .or_default()
            .push(vehicle);
    }

    let speed_of = |vehicle: &Vehicle| speeds.get(&vehicle.id).copied().unwrap_or(0.0);

    let mut min_ttc: Option<OrderedFloat<f64>> = None;
    let mut min_headway: Option<OrderedFloat<f64>> = None;
    for lane in lanes.values_mut().filter(|lane| lane.len() >= 2) {
        // Leader first
        lane.sort_by_key(|vehicle| (Reverse(progress(vehicle)), vehicle.id));

        for pair in lane.windows(2) {
            let (leader, follower) = (pair[0], pair[1]);
            let gap = (progress(leader) - progress(follower) - 1).max(0);
            let headway = OrderedFloat(f64::from(gap + 1));
            min_headway = Some(min_headway.map_or(headway, |current| current.min(headway)));

            let relative_speed = speed_of(follower) - speed_of(leader);
            if relative_speed <= 0.0 {
                continue;
            }
            let ttc = OrderedFloat(f64::from(gap + 1) / relative_speed);
            min_ttc = Some(min_ttc.map_or(ttc, |current| current.min(ttc)));
        }
    }

    min_ttc
        .or(min_headway)
        .map_or(NO_CLOSING_TTC, OrderedFloat::into_inner)
}

/// The coordinate that stays fixed while a vehicle travels
fn lane_coordinate(vehicle: &Vehicle) -> i32 {
    match vehicle.direction {
        Direction::Up | Direction::Down => vehicle.x,
        Direction::Left | Direction::Right => vehicle.y,
    }
}

/// Distance travelled along the direction of travel; larger is further ahead
fn progress(vehicle: &Vehicle) -> i32 {
    match vehicle.direction {
        Direction::Right => vehicle.x,
        Direction::Left => -vehicle.x,
        Direction::Down => vehicle.y,
        Direction::Up => -vehicle.y,
    }
}
