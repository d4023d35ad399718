use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};

use traffic_flow::benchmark::{self, BenchmarkResult, Scorecard};
use traffic_flow::simulation::{self, Report, RunOptions, SimulationEngine};

#[derive(Parser)]
#[command(name = "traffic_flow")]
#[command(about = "Grid intersection traffic simulator with deterministic regression benchmarks")]
struct Cli {
    /// Path to a simulation config JSON
    #[arg(long, default_value = "configs/baseline.json")]
    config: PathBuf,

    /// Comma-separated config paths to run and compare
    #[arg(long, value_delimiter = ',', num_args = 1.., conflicts_with = "benchmark")]
    compare: Vec<PathBuf>,

    /// Path to a deterministic benchmark definition JSON
    #[arg(long)]
    benchmark: Option<PathBuf>,

    /// Disable terminal rendering
    #[arg(long)]
    no_render: bool,

    /// Include the per-step timeline in the report JSON
    #[arg(long)]
    timeline: bool,

    /// Report output path override for single config mode
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("warn,traffic_flow=info"),
    )
    .init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Some(path) = &cli.benchmark {
        return run_benchmark(path);
    }

    if !cli.compare.is_empty() {
        let paths: Vec<PathBuf> = cli
            .compare
            .into_iter()
            .filter(|path| !path.as_os_str().is_empty())
            .collect();
        if paths.len() < 2 {
            bail!("compare mode requires at least two config paths");
        }
        return run_compare(&paths);
    }

    let config = simulation::load_config(&cli.config)?;
    let render = config.render.enabled && !cli.no_render;
    let report_path = cli.out.or_else(|| config.report_path.clone());

    let mut engine = SimulationEngine::new(config)?;
    let report = engine.run(RunOptions {
        capture_timeline: cli.timeline,
        render,
    });
    print_report(&report);

    if let Some(path) = report_path {
        simulation::write_report(&path, &report)?;
        println!("\nReport written to {}", path.display());
    }
    Ok(())
}

fn run_benchmark(path: &Path) -> Result<()> {
    let suite = benchmark::load_suite(path)?;
    let result = benchmark::run_benchmark(&suite)?;
    print_benchmark(&result);

    if let Some(report_path) = &suite.report_path {
        println!("\nBenchmark report written to {}", report_path.display());
    }
    if !result.passed {
        bail!("benchmark failed regression checks");
    }
    Ok(())
}

fn run_compare(paths: &[PathBuf]) -> Result<()> {
    let mut reports = Vec::with_capacity(paths.len());
    for path in paths {
        let config = simulation::load_config(path)
            .with_context(|| format!("load {}", path.display()))?;
        let report_path = config.report_path.clone();
        let mut engine = SimulationEngine::new(config)
            .with_context(|| format!("build engine for {}", path.display()))?;
        let report = engine.run(RunOptions::default());
        if let Some(report_path) = report_path {
            simulation::write_report(&report_path, &report)
                .with_context(|| format!("write report {}", report_path.display()))?;
        }
        reports.push(report);
    }
    print_comparison(&reports);
    Ok(())
}

fn print_report(report: &Report) {
    let m = &report.metrics;
    println!("Scenario: {}", m.scenario_name);
    println!(
        "Spawned: {} | Completed: {} | Active: {}",
        m.vehicles_spawned, m.vehicles_completed, m.active_vehicles
    );
    println!(
        "Avg speed: {:.3} | Avg wait: {:.2} | Avg trip: {:.2}",
        m.average_network_speed, m.average_wait_per_trip, m.average_trip_duration
    );
    println!(
        "Throughput/100 steps: {:.2} | Max queue: {} | Potential collisions: {}",
        m.throughput_per_100_steps, m.max_queue_overall, m.potential_collisions
    );
    println!(
        "Blocked by signal: {} | Blocked by traffic: {}",
        m.blocked_by_signal, m.blocked_by_traffic
    );
    for (direction, stats) in &m.direction_stats {
        println!(
            "  {direction} -> spawned={} completed={} avg_wait={:.2} avg_trip={:.2} max_queue={}",
            stats.spawned, stats.completed, stats.average_wait, stats.average_duration, stats.max_queue
        );
    }
}

fn print_comparison(reports: &[Report]) {
    println!("Comparison:");
    println!("Scenario | Completed | Throughput/100 | Avg Wait | Avg Trip | Collisions");
    for report in reports {
        let m = &report.metrics;
        println!(
            "{} | {} | {:.2} | {:.2} | {:.2} | {}",
            m.scenario_name,
            m.vehicles_completed,
            m.throughput_per_100_steps,
            m.average_wait_per_trip,
            m.average_trip_duration,
            m.potential_collisions
        );
    }
}

fn print_scorecard_row(label: &str, card: &Scorecard) {
    println!(
        "{label}({}) | {} | {:.2} | {:.2} | {} | {:.2} | {:.3} | {}",
        card.scenario_name,
        card.vehicles_completed,
        card.throughput_per_100,
        card.average_delay,
        card.potential_collisions,
        card.min_ttc,
        card.mean_abs_jerk,
        card.hard_brakes
    );
}

fn print_benchmark(result: &BenchmarkResult) {
    println!("Benchmark: {}", result.name);
    println!("Scorecard:");
    println!(
        "Case | Completed | Throughput/100 | Avg Delay | Collisions | Min TTC | Mean Abs Jerk | Hard Brakes"
    );
    print_scorecard_row("baseline", &result.baseline);
    print_scorecard_row("candidate", &result.candidate);

    println!("\nChecks:");
    for check in &result.checks {
        println!(
            "- {}: {} (baseline={:.3} candidate={:.3}) -> {}",
            check.name,
            check.rule,
            check.baseline,
            check.candidate,
            if check.passed { "PASS" } else { "FAIL" }
        );
    }
    println!(
        "\nOverall: {}",
        if result.passed { "PASS" } else { "FAIL" }
    );
}
