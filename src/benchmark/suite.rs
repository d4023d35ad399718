//! Benchmark definition files and the baseline/candidate run driver

use anyhow::{bail, Context, Result};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use super::analyzer::Scorecard;
use super::regression::{evaluate, BenchmarkResult, Thresholds};
use crate::simulation::{load_config, write_json, write_report, RunOptions, SimulationEngine};

pub const DEFAULT_BENCHMARK_NAME: &str = "deterministic-benchmark";

/// A baseline/candidate pair of scenario configs and the tolerances between them
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BenchmarkSuite {
    pub name: String,
    pub baseline_config: PathBuf,
    pub candidate_config: PathBuf,
    pub thresholds: Thresholds,
    pub report_path: Option<PathBuf>,
}

/// Load, default, resolve and validate a benchmark definition
pub fn load_suite(path: impl AsRef<Path>) -> Result<BenchmarkSuite> {
    let path = path.as_ref();
    let data = fs::read_to_string(path)
        .with_context(|| format!("read benchmark definition {}", path.display()))?;
    let mut suite: BenchmarkSuite = serde_json::from_str(&data)
        .with_context(|| format!("parse benchmark definition {}", path.display()))?;

    suite.apply_defaults();
    if let Some(base_dir) = path.parent() {
        suite.resolve_paths(base_dir);
    }
    suite.validate()?;
    Ok(suite)
}

impl BenchmarkSuite {
    pub fn apply_defaults(&mut self) {
        if self.name.is_empty() {
            self.name = DEFAULT_BENCHMARK_NAME.to_string();
        }
        self.thresholds = self.thresholds.normalized();
    }

    pub fn resolve_paths(&mut self, base_dir: &Path) {
        if base_dir.as_os_str().is_empty() {
            return;
        }
        for path in [&mut self.baseline_config, &mut self.candidate_config] {
            if !path.as_os_str().is_empty() && path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
        if let Some(report_path) = &mut self.report_path {
            if report_path.is_relative() {
                *report_path = base_dir.join(&*report_path);
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.baseline_config.as_os_str().is_empty() {
            bail!("baseline_config is required");
        }
        if self.candidate_config.as_os_str().is_empty() {
            bail!("candidate_config is required");
        }
        if self.thresholds.min_throughput_ratio <= 0.0 {
            bail!("threshold min_throughput_ratio must be > 0");
        }
        Ok(())
    }
}

/// Run both scenarios, compare them and persist the result if requested
pub fn run_benchmark(suite: &BenchmarkSuite) -> Result<BenchmarkResult> {
    info!("Running benchmark '{}'", suite.name);
    let baseline = run_scenario(&suite.baseline_config).context("run baseline scenario")?;
    let candidate = run_scenario(&suite.candidate_config).context("run candidate scenario")?;

    let result = evaluate(&suite.name, &suite.thresholds, baseline, candidate);
    for check in result.failed_checks() {
        warn!(
            "check {} failed: {} (baseline={:.3} candidate={:.3})",
            check.name, check.rule, check.baseline, check.candidate
        );
    }
    info!(
        "Benchmark '{}' {}",
        result.name,
        if result.passed { "passed" } else { "failed" }
    );

    if let Some(path) = &suite.report_path {
        write_result(path, &result)?;
    }
    Ok(result)
}

/// Simulate one scenario with its timeline captured and score it
pub fn run_scenario(config_path: &Path) -> Result<Scorecard> {
    let config = load_config(config_path)
        .with_context(|| format!("load config {}", config_path.display()))?;
    let report_path = config.report_path.clone();
    let name = config.name.clone();

    let mut engine = SimulationEngine::new(config)
        .with_context(|| format!("create engine for {name:?}"))?;
    let report = engine.run(RunOptions {
        capture_timeline: true,
        render: false,
    });

    if let Some(path) = report_path {
        write_report(&path, &report)
            .with_context(|| format!("write scenario report {}", path.display()))?;
    }
    Ok(Scorecard::from_report(&report))
}

pub fn write_result(path: impl AsRef<Path>, result: &BenchmarkResult) -> Result<()> {
    write_json(path.as_ref(), result).context("write benchmark report")
}
