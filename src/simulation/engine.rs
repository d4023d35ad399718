//! Step-by-step simulation of one signalised grid intersection
//!
//! Each step runs three phases in order: spawn queued arrivals, resolve and
//! apply moves, then advance the traffic light. Lanes are always visited in
//! `Direction` order, so a run is a pure function of its config.

use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::thread;
use std::time::Duration;

use super::config::{load_demand_profile, Config, DemandProfile};
use super::lane::LaneState;
use super::light::TrafficLight;
use super::metrics::{Metrics, MetricsAggregator};
use super::movement::{resolve_moves, BlockReason, MoveResolution};
use super::render::{render_frame, RenderStats};
use super::report::{unix_timestamp, Report, StepSnapshot};
use super::types::{Cell, Direction, DirectionMap, Vehicle, VehicleId};

/// How a run should be observed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Record a snapshot after every step
    pub capture_timeline: bool,
    /// Draw the terminal dashboard after every step
    pub render: bool,
}

/// What happened during a single step
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepOutcome {
    /// 1-based index of the step just completed
    pub step: usize,
    pub spawned: usize,
    pub moved: usize,
    pub exited: usize,
    pub blocked_by_signal: usize,
    pub blocked_by_traffic: usize,
    pub potential_collisions: usize,
}

/// The simulation engine. Owns the grid state for one run.
pub struct SimulationEngine {
    config: Config,
    vehicles: Vec<Vehicle>,
    light: TrafficLight,
    lanes: DirectionMap<Option<LaneState>>,
    next_vehicle_id: u64,
    steps_done: usize,
    metrics: MetricsAggregator,
}

impl SimulationEngine {
    /// Build an engine for a validated config.
    ///
    /// Fails if any lane's demand profile cannot be loaded.
    pub fn new(config: Config) -> Result<Self> {
        let mut lanes: DirectionMap<Option<LaneState>> = DirectionMap::default();
        for (&direction, lane) in &config.spawn.lanes {
            let profile = match lane.profile_csv.as_ref().filter(|p| !p.as_os_str().is_empty()) {
                Some(path) => {
                    let column = lane
                        .profile_column
                        .as_deref()
                        .filter(|column| !column.is_empty())
                        .unwrap_or(direction.as_str());
                    load_demand_profile(path, column)
                        .with_context(|| format!("load demand profile for lane {direction}"))?
                }
                None => DemandProfile::new(),
            };
            lanes[direction] = Some(LaneState::new(direction, lane, profile));
        }

        Ok(Self {
            config,
            vehicles: Vec::new(),
            light: TrafficLight::new(),
            lanes,
            next_vehicle_id: 0,
            steps_done: 0,
            metrics: MetricsAggregator::new(),
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Vehicles currently on the grid, in spawn order
    pub fn vehicles(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn light(&self) -> &TrafficLight {
        &self.light
    }

    pub fn lane(&self, direction: Direction) -> Option<&LaneState> {
        self.lanes[direction].as_ref()
    }

    /// Number of steps simulated so far
    pub fn steps_done(&self) -> usize {
        self.steps_done
    }

    /// Run the configured number of steps and build the report
    pub fn run(&mut self, options: RunOptions) -> Report {
        let total_steps = self.config.steps;
        info!(
            "Running scenario '{}' for {} steps on a {}x{} grid",
            self.config.name, total_steps, self.config.grid.width, self.config.grid.height
        );

        let mut timeline = Vec::new();
        if options.capture_timeline {
            timeline.reserve(total_steps);
        }

        while self.steps_done < total_steps {
            self.step();

            if options.capture_timeline {
                timeline.push(self.snapshot());
            }
            if options.render {
                print!("{}", self.render());
                if self.config.render.delay_ms > 0 {
                    thread::sleep(Duration::from_millis(self.config.render.delay_ms as u64));
                }
            }
        }

        let metrics = self.metrics();
        info!("=== SIMULATION COMPLETE ===");
        info!("Scenario: {}", metrics.scenario_name);
        info!("Total vehicles spawned: {}", metrics.vehicles_spawned);
        info!("Total vehicles completed: {}", metrics.vehicles_completed);
        info!("Active vehicles: {}", metrics.active_vehicles);
        info!("Potential collisions: {}", metrics.potential_collisions);
        info!("Throughput/100 steps: {:.2}", metrics.throughput_per_100_steps);

        Report {
            config_name: self.config.name.clone(),
            generated: unix_timestamp(),
            metrics,
            timeline,
        }
    }

    /// Advance the simulation by one step
    pub fn step(&mut self) -> StepOutcome {
        let step = self.steps_done;
        let spawned = self.spawn_vehicles(step);
        let mut outcome = self.move_vehicles(step);
        self.light.advance(&self.config.signal);
        self.steps_done += 1;

        outcome.step = self.steps_done;
        outcome.spawned = spawned;
        if outcome.potential_collisions > 0 || outcome.exited > 0 {
            debug!(
                "step {}: spawned={} moved={} exited={} collisions={}",
                outcome.step, spawned, outcome.moved, outcome.exited, outcome.potential_collisions
            );
        }
        outcome
    }

    /// Copy of the current grid state, labelled with the last completed step
    pub fn snapshot(&self) -> StepSnapshot {
        StepSnapshot {
            step: self.steps_done,
            vertical_green: self.light.vertical_green,
            vehicles: self.vehicles.clone(),
        }
    }

    /// Metrics for the steps simulated so far
    pub fn metrics(&self) -> Metrics {
        self.metrics
            .finish(&self.config.name, self.steps_done, self.vehicles.len(), &self.lanes)
    }

    /// Draw the current state as a terminal frame
    pub fn render(&self) -> String {
        let mut stats = RenderStats {
            scenario_name: self.config.name.clone(),
            step: self.steps_done,
            total_steps: self.config.steps,
            vertical_green: self.light.vertical_green,
            spawned_vehicles: self.metrics.spawned(),
            completed_vehicles: self.metrics.completed(),
            active_vehicles: self.vehicles.len(),
            blocked_by_signal: self.metrics.blocked_by_signal(),
            blocked_by_traffic: self.metrics.blocked_by_traffic(),
            potential_collisions: self.metrics.potential_collisions(),
            max_queue_overall: self.metrics.max_queue_overall(),
            average_network_speed: self.metrics.average_network_speed(),
            throughput_per_100_steps: self.metrics.throughput_per_100_steps(self.steps_done),
            ..Default::default()
        };
        for (direction, lane) in self.lanes.iter() {
            if let Some(lane) = lane {
                stats.lane_queue[direction] = lane.queued;
            }
        }
        for vehicle in &self.vehicles {
            stats.lane_active[vehicle.direction] += 1;
        }
        render_frame(&self.config.grid, &self.vehicles, &self.light, &stats)
    }

    /// Queue this step's arrivals and drain each lane onto its entry cell.
    /// Returns the number of vehicles created.
    fn spawn_vehicles(&mut self, step: usize) -> usize {
        let mut created = 0;
        for direction in Direction::ALL {
            let Some(mut lane) = self.lanes[direction].take() else {
                continue;
            };

            let arrivals = lane.arrivals_for_step(step);
            if arrivals > 0 {
                let queued = lane.enqueue(arrivals);
                self.metrics.record_queue_length(queued);
            }

            while lane.queued > 0 {
                if lane.cap_reached() {
                    warn!(
                        "lane {direction} reached its cap of {} vehicles; dropping {} queued arrival(s)",
                        lane.max_vehicles, lane.queued
                    );
                    lane.queued = 0;
                    break;
                }
                if self.is_occupied(lane.entry) {
                    break;
                }

                self.next_vehicle_id += 1;
                self.vehicles.push(Vehicle::new(
                    VehicleId(self.next_vehicle_id),
                    lane.entry,
                    direction,
                    step + 1,
                ));
                lane.queued -= 1;
                lane.spawned += 1;
                self.metrics.record_spawn(direction);
                created += 1;
            }

            self.lanes[direction] = Some(lane);
        }
        created
    }

    fn is_occupied(&self, cell: Cell) -> bool {
        self.vehicles.iter().any(|vehicle| vehicle.cell() == cell)
    }

    /// Resolve this step's moves and apply them to the vehicle list
    fn move_vehicles(&mut self, step: usize) -> StepOutcome {
        let MoveResolution {
            plans,
            potential_collisions,
        } = resolve_moves(&self.vehicles, &self.config.grid, &self.light);
        self.metrics.record_collisions(potential_collisions);

        let mut outcome = StepOutcome {
            potential_collisions,
            ..Default::default()
        };

        let vehicles = std::mem::take(&mut self.vehicles);
        let mut remaining = Vec::with_capacity(vehicles.len());
        for (mut vehicle, plan) in vehicles.into_iter().zip(plans) {
            self.metrics.record_vehicle_step();

            match plan.blocked {
                None => {
                    vehicle.moved_steps += 1;
                    self.metrics.record_move();
                    outcome.moved += 1;
                    if plan.exits_grid {
                        let trip_duration = (step + 1) - vehicle.spawn_step + 1;
                        self.metrics.record_completion(
                            vehicle.direction,
                            trip_duration,
                            vehicle.wait_steps,
                        );
                        outcome.exited += 1;
                        continue;
                    }
                    vehicle.set_cell(plan.target);
                }
                Some(reason) => {
                    vehicle.wait_steps += 1;
                    self.metrics.record_block(reason);
                    match reason {
                        BlockReason::Signal => outcome.blocked_by_signal += 1,
                        BlockReason::Traffic => outcome.blocked_by_traffic += 1,
                    }
                }
            }
            remaining.push(vehicle);
        }
        self.vehicles = remaining;
        outcome
    }
}
