//! Baseline vs candidate regression checks

use serde::{Deserialize, Serialize};

use super::analyzer::Scorecard;
use crate::simulation::unix_timestamp;

pub const DEFAULT_MIN_THROUGHPUT_RATIO: f64 = 0.98;

/// Tolerances a candidate must stay within relative to the baseline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub max_collision_increase: i64,
    pub max_delay_increase: f64,
    pub min_throughput_ratio: f64,
    pub max_jerk_increase: f64,
    pub max_min_ttc_drop: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            max_collision_increase: 0,
            max_delay_increase: 0.0,
            min_throughput_ratio: DEFAULT_MIN_THROUGHPUT_RATIO,
            max_jerk_increase: 0.0,
            max_min_ttc_drop: 0.0,
        }
    }
}

impl Thresholds {
    /// Replace a non-positive throughput ratio with the default and clamp
    /// negative tolerances to zero
    pub fn normalized(self) -> Self {
        Self {
            max_collision_increase: self.max_collision_increase.max(0),
            max_delay_increase: self.max_delay_increase.max(0.0),
            min_throughput_ratio: if self.min_throughput_ratio > 0.0 {
                self.min_throughput_ratio
            } else {
                DEFAULT_MIN_THROUGHPUT_RATIO
            },
            max_jerk_increase: self.max_jerk_increase.max(0.0),
            max_min_ttc_drop: self.max_min_ttc_drop.max(0.0),
        }
    }
}

/// Outcome of one named check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub rule: String,
    pub baseline: f64,
    pub candidate: f64,
    pub passed: bool,
}

impl CheckResult {
    fn new(name: &str, rule: String, baseline: f64, candidate: f64, passed: bool) -> Self {
        Self {
            name: name.to_string(),
            rule,
            baseline,
            candidate,
            passed,
        }
    }
}

/// Verdict of a baseline vs candidate comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub name: String,
    /// Seconds since the Unix epoch
    pub generated: u64,
    pub baseline: Scorecard,
    pub candidate: Scorecard,
    pub checks: Vec<CheckResult>,
    pub passed: bool,
}

impl BenchmarkResult {
    pub fn failed_checks(&self) -> impl Iterator<Item = &CheckResult> {
        self.checks.iter().filter(|check| !check.passed)
    }
}

/// Run the five regression checks. Never fails; the verdict is in
/// [`BenchmarkResult::passed`].
pub fn evaluate(
    name: &str,
    thresholds: &Thresholds,
    baseline: Scorecard,
    candidate: Scorecard,
) -> BenchmarkResult {
    let t = thresholds.normalized();

    let checks = vec![
        CheckResult::new(
            "throughput",
            format!("candidate throughput >= baseline * {:.3}", t.min_throughput_ratio),
            baseline.throughput_per_100,
            candidate.throughput_per_100,
            candidate.throughput_per_100 >= baseline.throughput_per_100 * t.min_throughput_ratio,
        ),
        CheckResult::new(
            "average_delay",
            format!("candidate delay <= baseline + {:.3}", t.max_delay_increase),
            baseline.average_delay,
            candidate.average_delay,
            candidate.average_delay <= baseline.average_delay + t.max_delay_increase,
        ),
        CheckResult::new(
            "potential_collisions",
            format!("candidate collisions <= baseline + {}", t.max_collision_increase),
            baseline.potential_collisions as f64,
            candidate.potential_collisions as f64,
            candidate.potential_collisions as i64
                <= baseline.potential_collisions as i64 + t.max_collision_increase,
        ),
        CheckResult::new(
            "mean_abs_jerk",
            format!("candidate mean abs jerk <= baseline + {:.3}", t.max_jerk_increase),
            baseline.mean_abs_jerk,
            candidate.mean_abs_jerk,
            candidate.mean_abs_jerk <= baseline.mean_abs_jerk + t.max_jerk_increase,
        ),
        CheckResult::new(
            "min_ttc",
            format!("candidate min TTC >= baseline - {:.3}", t.max_min_ttc_drop),
            baseline.min_ttc,
            candidate.min_ttc,
            candidate.min_ttc >= baseline.min_ttc - t.max_min_ttc_drop,
        ),
    ];

    let passed = checks.iter().all(|check| check.passed);

    BenchmarkResult {
        name: name.to_string(),
        generated: unix_timestamp(),
        baseline,
        candidate,
        checks,
        passed,
    }
}
