//! Run reports, the per-step timeline and JSON persistence

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use super::metrics::Metrics;
use super::types::Vehicle;

/// Immutable copy of the grid after one step's moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    /// 1-based step index
    pub step: usize,
    #[serde(rename = "light_green_vertical")]
    pub vertical_green: bool,
    pub vehicles: Vec<Vehicle>,
}

/// Result of one simulation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub config_name: String,
    /// Seconds since the Unix epoch
    pub generated: u64,
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub timeline: Vec<StepSnapshot>,
}

/// Current wall-clock time as Unix seconds, 0 if the clock is before the epoch
pub fn unix_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs())
        .unwrap_or(0)
}

/// Serialize `value` as pretty JSON at `path`, creating parent directories
pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("report path is empty");
    }
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create report directory {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(value).context("marshal report")?;
    fs::write(path, data).with_context(|| format!("write report {}", path.display()))?;
    Ok(())
}

pub fn write_report(path: impl AsRef<Path>, report: &Report) -> Result<()> {
    write_json(path.as_ref(), report)
}
