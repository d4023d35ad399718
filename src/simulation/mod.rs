//! Discrete-step traffic simulation of one signalised intersection
//!
//! This module contains the engine, its configuration and the reports it
//! produces. It has no knowledge of the benchmark layer built on top of it.

mod config;
mod engine;
mod lane;
mod light;
mod metrics;
mod movement;
mod render;
mod report;
mod types;

pub use config::{
    load_config, load_demand_profile, Config, DemandProfile, GridConfig, LaneSpawnConfig,
    RenderConfig, SignalConfig, SpawnConfig, DEFAULT_GREEN_STEPS, DEFAULT_GRID_HEIGHT,
    DEFAULT_GRID_WIDTH, DEFAULT_SCENARIO_NAME, DEFAULT_STEPS, MIN_GRID_SIZE,
};
pub use engine::{RunOptions, SimulationEngine, StepOutcome};
pub use lane::LaneState;
pub use light::TrafficLight;
pub use metrics::{DirStats, Metrics, MetricsAggregator};
pub use movement::{resolve_moves, BlockReason, MovePlan, MoveResolution};
pub use render::{draw_cells, render_frame, RenderStats};
pub use report::{unix_timestamp, write_json, write_report, Report, StepSnapshot};
pub use types::{Axis, Cell, Direction, DirectionMap, Vehicle, VehicleId};
