//! Deterministic baseline vs candidate benchmarking
//!
//! Runs two scenario configs, scores each captured timeline and checks the
//! candidate against the baseline with configurable tolerances.

mod analyzer;
mod regression;
mod suite;

pub use analyzer::{
    analyze_timeline, min_ttc_step, Scorecard, TimelineAnalysis, HARD_BRAKE_DECEL, NO_CLOSING_TTC,
};
pub use regression::{
    evaluate, BenchmarkResult, CheckResult, Thresholds, DEFAULT_MIN_THROUGHPUT_RATIO,
};
pub use suite::{
    load_suite, run_benchmark, run_scenario, write_result, BenchmarkSuite, DEFAULT_BENCHMARK_NAME,
};
