//! Scenario configuration and demand profiles
//!
//! Configs are JSON files. Relative paths inside a config are resolved
//! against the directory containing it.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::types::{Axis, Cell, Direction};

pub const DEFAULT_SCENARIO_NAME: &str = "default";
pub const DEFAULT_STEPS: usize = 100;
pub const DEFAULT_GRID_WIDTH: i32 = 20;
pub const DEFAULT_GRID_HEIGHT: i32 = 10;
pub const DEFAULT_GREEN_STEPS: i32 = 5;

/// Smallest grid that still has a distinct intersection cell
pub const MIN_GRID_SIZE: i32 = 3;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub name: String,
    pub steps: usize,
    pub grid: GridConfig,
    pub signal: SignalConfig,
    pub spawn: SpawnConfig,
    pub render: RenderConfig,
    pub report_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
}

impl GridConfig {
    /// The cell where the vertical and horizontal roads cross
    pub fn intersection(&self) -> Cell {
        Cell::new(self.width / 2, self.height / 2)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < self.width && cell.y >= 0 && cell.y < self.height
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalConfig {
    pub vertical_green_steps: i32,
    pub horizontal_green_steps: i32,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnConfig {
    pub lanes: BTreeMap<Direction, LaneSpawnConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneSpawnConfig {
    pub entry_x: i32,
    pub entry_y: i32,
    /// One arrival every `step_interval` steps; 0 disables fixed arrivals
    pub step_interval: i32,
    /// Cap on vehicles ever spawned from this lane; 0 means uncapped
    pub max_vehicles: i32,
    pub profile_csv: Option<PathBuf>,
    pub profile_column: Option<String>,
}

impl LaneSpawnConfig {
    pub fn entry(&self) -> Cell {
        Cell::new(self.entry_x, self.entry_y)
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enabled: bool,
    pub delay_ms: i64,
}

/// Load, default, resolve and validate a scenario config
pub fn load_config(path: impl AsRef<Path>) -> Result<Config> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let mut config: Config = serde_json::from_str(&data)
        .with_context(|| format!("parse config {}", path.display()))?;

    config.apply_defaults();
    if let Some(base_dir) = path.parent() {
        config.resolve_paths(base_dir);
    }
    config.validate()?;
    Ok(config)
}

impl Config {
    /// Fill unset or non-positive fields with their defaults
    pub fn apply_defaults(&mut self) {
        if self.name.is_empty() {
            self.name = DEFAULT_SCENARIO_NAME.to_string();
        }
        if self.steps == 0 {
            self.steps = DEFAULT_STEPS;
        }
        if self.grid.width <= 0 {
            self.grid.width = DEFAULT_GRID_WIDTH;
        }
        if self.grid.height <= 0 {
            self.grid.height = DEFAULT_GRID_HEIGHT;
        }
        if self.signal.vertical_green_steps <= 0 {
            self.signal.vertical_green_steps = DEFAULT_GREEN_STEPS;
        }
        if self.signal.horizontal_green_steps <= 0 {
            self.signal.horizontal_green_steps = DEFAULT_GREEN_STEPS;
        }
        if self.spawn.lanes.is_empty() {
            let center = self.grid.intersection();
            self.spawn.lanes.insert(
                Direction::Up,
                LaneSpawnConfig {
                    entry_x: center.x,
                    entry_y: self.grid.height - 1,
                    step_interval: 3,
                    ..Default::default()
                },
            );
            self.spawn.lanes.insert(
                Direction::Right,
                LaneSpawnConfig {
                    entry_x: 0,
                    entry_y: center.y,
                    step_interval: 4,
                    ..Default::default()
                },
            );
        }
        if self.render.delay_ms < 0 {
            self.render.delay_ms = 0;
        }
    }

    /// Make relative report and profile paths relative to `base_dir`
    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if base_dir.as_os_str().is_empty() {
            return;
        }
        if let Some(report_path) = &mut self.report_path {
            resolve_against(report_path, base_dir);
        }
        for lane in self.spawn.lanes.values_mut() {
            if let Some(profile) = &mut lane.profile_csv {
                resolve_against(profile, base_dir);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.grid.width < MIN_GRID_SIZE || self.grid.height < MIN_GRID_SIZE {
            bail!("grid must be at least {MIN_GRID_SIZE}x{MIN_GRID_SIZE}");
        }
        if self.signal.vertical_green_steps <= 0 || self.signal.horizontal_green_steps <= 0 {
            bail!("signal green durations must be > 0");
        }
        if self.spawn.lanes.is_empty() {
            bail!("spawn lanes cannot be empty");
        }

        let center = self.grid.intersection();
        for (direction, lane) in &self.spawn.lanes {
            if !self.grid.contains(lane.entry()) {
                bail!("lane {direction} entry is outside grid");
            }
            if lane.step_interval < 0 {
                bail!("lane {direction} step_interval must be >= 0");
            }
            if lane.max_vehicles < 0 {
                bail!("lane {direction} max_vehicles must be >= 0");
            }
            match direction.axis() {
                Axis::Vertical if lane.entry_x != center.x => {
                    bail!(
                        "lane {direction} entry_x must equal center road x={}",
                        center.x
                    );
                }
                Axis::Horizontal if lane.entry_y != center.y => {
                    bail!(
                        "lane {direction} entry_y must equal center road y={}",
                        center.y
                    );
                }
                _ => {}
            }
        }
        Ok(())
    }
}

fn resolve_against(path: &mut PathBuf, base_dir: &Path) {
    if !path.as_os_str().is_empty() && path.is_relative() {
        *path = base_dir.join(&*path);
    }
}

/// Arrivals per 1-based step, read from one column of a CSV file
pub type DemandProfile = BTreeMap<usize, usize>;

/// Read the `step` column and `column` from a CSV demand profile.
///
/// Header names are matched case-insensitively. Rows that are too short or
/// hold non-integer values are skipped.
pub fn load_demand_profile(path: impl AsRef<Path>, column: &str) -> Result<DemandProfile> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("open profile {}", path.display()))?;

    let mut rows = data
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| line.split(',').map(str::trim).collect::<Vec<_>>());

    let header = rows.next().context("profile csv is empty")?;
    let wanted = column.trim().to_lowercase();
    let step_idx = header
        .iter()
        .position(|name| name.to_lowercase() == "step")
        .context("profile csv missing 'step' column")?;
    let value_idx = header
        .iter()
        .position(|name| name.to_lowercase() == wanted)
        .with_context(|| format!("profile csv missing column {column:?}"))?;

    let mut profile = DemandProfile::new();
    for row in rows {
        let (Some(step), Some(count)) = (row.get(step_idx), row.get(value_idx)) else {
            continue;
        };
        if let (Ok(step), Ok(count)) = (step.parse::<usize>(), count.parse::<usize>()) {
            profile.insert(step, count);
        }
    }
    Ok(profile)
}
