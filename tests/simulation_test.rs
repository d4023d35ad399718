use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::process::Command;

use traffic_flow::simulation::{
    draw_cells, load_config, load_demand_profile, resolve_moves, write_report, BlockReason, Cell, Config,
    Direction, GridConfig, LaneSpawnConfig, RunOptions, SignalConfig, SimulationEngine,
    SpawnConfig, TrafficLight, Vehicle, VehicleId,
};

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("traffic_flow_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

fn lane(entry_x: i32, entry_y: i32, step_interval: i32, max_vehicles: i32) -> LaneSpawnConfig {
    LaneSpawnConfig {
        entry_x,
        entry_y,
        step_interval,
        max_vehicles,
        ..Default::default()
    }
}

fn scenario(
    name: &str,
    steps: usize,
    signal: (i32, i32),
    lanes: Vec<(Direction, LaneSpawnConfig)>,
) -> Config {
    Config {
        name: name.to_string(),
        steps,
        grid: GridConfig {
            width: 20,
            height: 10,
        },
        signal: SignalConfig {
            vertical_green_steps: signal.0,
            horizontal_green_steps: signal.1,
        },
        spawn: SpawnConfig {
            lanes: lanes.into_iter().collect::<BTreeMap<_, _>>(),
        },
        ..Default::default()
    }
}

fn vehicle(id: u64, x: i32, y: i32, direction: Direction) -> Vehicle {
    Vehicle::new(VehicleId(id), Cell::new(x, y), direction, 1)
}

const GRID: GridConfig = GridConfig {
    width: 20,
    height: 10,
};

#[test]
fn test_light_cycles_between_phases() {
    let signal = SignalConfig {
        vertical_green_steps: 2,
        horizontal_green_steps: 1,
    };
    let mut light = TrafficLight::new();
    assert!(light.vertical_green);

    let phases: Vec<bool> = (0..6)
        .map(|_| {
            light.advance(&signal);
            light.vertical_green
        })
        .collect();
    assert_eq!(phases, vec![true, true, false, true, true, false]);
}

#[test]
fn test_light_ignores_empty_cycle() {
    let mut light = TrafficLight::new();
    light.advance(&SignalConfig::default());
    assert!(light.vertical_green);
    assert_eq!(light.timer, 1);
}

#[test]
fn test_red_light_holds_vehicle_then_releases() {
    let config = scenario(
        "red-light",
        30,
        (5, 1),
        vec![(Direction::Right, lane(9, 5, 1, 1))],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());
    let metrics = report.metrics;

    assert_eq!(metrics.vehicles_spawned, 1);
    assert_eq!(metrics.vehicles_completed, 1);
    assert_eq!(metrics.blocked_by_signal, 6);
    assert_eq!(metrics.blocked_by_traffic, 0);
    assert_eq!(metrics.average_wait_per_trip, 6.0);
    assert_eq!(metrics.potential_collisions, 0);
}

#[test]
fn test_conflicting_targets_count_one_collision() {
    let vehicles = vec![
        vehicle(1, 9, 4, Direction::Right),
        vehicle(2, 11, 4, Direction::Left),
    ];
    let resolution = resolve_moves(&vehicles, &GRID, &TrafficLight::new());

    assert_eq!(resolution.potential_collisions, 1);
    for plan in &resolution.plans {
        assert_eq!(plan.target, Cell::new(10, 4));
        assert_eq!(plan.blocked, Some(BlockReason::Traffic));
    }
}

#[test]
fn test_conflicting_lanes_in_engine() {
    let config = scenario(
        "conflict",
        1,
        (5, 5),
        vec![
            (Direction::Right, lane(9, 4, 1, 1)),
            (Direction::Left, lane(11, 4, 1, 1)),
        ],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    let outcome = engine.step();

    assert_eq!(outcome.spawned, 2);
    assert_eq!(outcome.potential_collisions, 1);
    assert_eq!(outcome.blocked_by_traffic, 2);
    assert_eq!(outcome.moved, 0);

    let metrics = engine.metrics();
    assert_eq!(metrics.potential_collisions, 1);
    assert_eq!(metrics.blocked_by_traffic, 2);
    assert_eq!(metrics.active_vehicles, 2);
}

#[test]
fn test_platoon_advances_together() {
    let vehicles = vec![
        vehicle(1, 3, 5, Direction::Right),
        vehicle(2, 4, 5, Direction::Right),
    ];
    let resolution = resolve_moves(&vehicles, &GRID, &TrafficLight::new());

    assert_eq!(resolution.potential_collisions, 0);
    assert!(resolution.plans.iter().all(|plan| plan.can_move()));
    assert_eq!(resolution.plans[0].target, Cell::new(4, 5));
    assert_eq!(resolution.plans[1].target, Cell::new(5, 5));
}

#[test]
fn test_follower_waits_behind_red_light() {
    let vehicles = vec![
        vehicle(1, 8, 5, Direction::Right),
        vehicle(2, 9, 5, Direction::Right),
    ];
    // Vertical green means red for the horizontal road
    let resolution = resolve_moves(&vehicles, &GRID, &TrafficLight::new());

    assert_eq!(resolution.plans[1].blocked, Some(BlockReason::Signal));
    assert_eq!(resolution.plans[0].blocked, Some(BlockReason::Traffic));
}

#[test]
fn test_head_on_swap_is_permitted() {
    let vehicles = vec![
        vehicle(1, 3, 5, Direction::Right),
        vehicle(2, 4, 5, Direction::Left),
    ];
    let resolution = resolve_moves(&vehicles, &GRID, &TrafficLight::new());

    assert_eq!(resolution.potential_collisions, 0);
    assert!(resolution.plans.iter().all(|plan| plan.can_move()));
}

#[test]
fn test_vehicle_at_edge_exits() {
    let vehicles = vec![vehicle(1, 19, 5, Direction::Right)];
    let resolution = resolve_moves(&vehicles, &GRID, &TrafficLight::new());

    assert!(resolution.plans[0].exits_grid);
    assert!(resolution.plans[0].can_move());
}

#[test]
fn test_cap_discards_queued_arrivals() {
    let config = scenario(
        "capped",
        10,
        (5, 5),
        vec![(Direction::Right, lane(0, 5, 1, 2))],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());

    assert_eq!(report.metrics.vehicles_spawned, 2);
    assert_eq!(report.metrics.direction_stats[&Direction::Right].spawned, 2);
    assert_eq!(engine.lane(Direction::Right).unwrap().queued, 0);
}

#[test]
fn test_queue_persists_while_entry_is_blocked() {
    let config = scenario(
        "queued",
        10,
        (50, 1),
        vec![(Direction::Right, lane(9, 5, 1, 0))],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    for _ in 0..3 {
        engine.step();
    }

    let lane = engine.lane(Direction::Right).unwrap();
    assert_eq!(engine.vehicles().len(), 1);
    assert_eq!(lane.queued, 2);
    assert_eq!(lane.max_queue_observed, 2);
    assert_eq!(engine.metrics().max_queue_overall, 2);
}

#[test]
fn test_vehicle_ids_follow_direction_order() {
    let config = scenario(
        "ordering",
        1,
        (5, 5),
        vec![
            (Direction::Up, lane(10, 9, 1, 0)),
            (Direction::Right, lane(0, 5, 1, 0)),
            (Direction::Down, lane(10, 0, 1, 0)),
        ],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    engine.step();

    let spawned: Vec<(u64, Direction)> = engine
        .vehicles()
        .iter()
        .map(|vehicle| (vehicle.id.0, vehicle.direction))
        .collect();
    assert_eq!(
        spawned,
        vec![
            (1, Direction::Down),
            (2, Direction::Right),
            (3, Direction::Up)
        ]
    );
}

#[test]
fn test_demand_profile_drives_arrivals() {
    let dir = temp_dir("profile_arrivals");
    fs::write(dir.join("demand.csv"), "step,right\n1,2\n3,1\n").unwrap();
    fs::write(
        dir.join("config.json"),
        r#"{
            "name": "profiled",
            "steps": 3,
            "signal": {"vertical_green_steps": 5, "horizontal_green_steps": 5},
            "spawn": {"lanes": {"right": {
                "entry_x": 0, "entry_y": 5, "step_interval": 5,
                "profile_csv": "demand.csv"
            }}}
        }"#,
    )
    .unwrap();

    let config = load_config(dir.join("config.json")).unwrap();
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());

    assert_eq!(report.metrics.vehicles_spawned, 3);
    assert_eq!(report.metrics.max_queue_overall, 2);
    assert_eq!(report.metrics.direction_stats[&Direction::Right].max_queue, 2);
}

#[test]
fn test_missing_profile_fails_engine_creation() {
    let mut config = scenario("broken", 5, (5, 5), vec![(Direction::Right, lane(0, 5, 1, 0))]);
    if let Some(lane) = config.spawn.lanes.get_mut(&Direction::Right) {
        lane.profile_csv = Some(PathBuf::from("/nonexistent/traffic_flow/demand.csv"));
    }

    let err = SimulationEngine::new(config).err().unwrap();
    assert!(format!("{err:#}").contains("load demand profile for lane right"));
}

#[test]
fn test_empty_run_reports_zeros() {
    let config = scenario("empty", 10, (5, 5), vec![(Direction::Right, lane(0, 5, 0, 0))]);
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions {
        capture_timeline: true,
        render: false,
    });

    let metrics = &report.metrics;
    assert_eq!(metrics.vehicles_spawned, 0);
    assert_eq!(metrics.vehicles_completed, 0);
    assert_eq!(metrics.average_network_speed, 0.0);
    assert_eq!(metrics.average_wait_per_trip, 0.0);
    assert_eq!(metrics.throughput_per_100_steps, 0.0);
    assert_eq!(report.timeline.len(), 10);
    assert!(report.timeline.iter().all(|snapshot| snapshot.vehicles.is_empty()));
    assert_eq!(report.timeline[0].step, 1);
}

#[test]
fn test_timeline_records_light_after_update() {
    let config = scenario("phases", 4, (2, 1), vec![(Direction::Right, lane(0, 5, 0, 0))]);
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions {
        capture_timeline: true,
        render: false,
    });

    let phases: Vec<bool> = report
        .timeline
        .iter()
        .map(|snapshot| snapshot.vertical_green)
        .collect();
    assert_eq!(phases, vec![true, true, false, true]);
}

#[test]
fn test_vertical_trip_metrics() {
    let config = scenario(
        "test-scenario",
        20,
        (50, 50),
        vec![(Direction::Up, lane(10, 9, 1, 2))],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());
    let metrics = &report.metrics;

    assert_eq!(metrics.vehicles_completed, 2);
    assert_eq!(metrics.active_vehicles, 0);
    assert_eq!(metrics.average_trip_duration, 10.0);
    assert_eq!(metrics.average_wait_per_trip, 0.0);
    assert_eq!(metrics.average_network_speed, 1.0);
    assert!((metrics.throughput_per_100_steps - 10.0).abs() < 1e-9);
}

#[test]
fn test_write_report_creates_json() {
    let config = scenario(
        "test-scenario",
        20,
        (50, 50),
        vec![(Direction::Up, lane(10, 9, 1, 2))],
    );
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());

    let path = temp_dir("write_report").join("nested").join("report.json");
    write_report(&path, &report).unwrap();

    let data = fs::read_to_string(&path).unwrap();
    assert!(data.contains("\"config_name\": \"test-scenario\""));
    assert!(data.contains("\"vehicles_completed\": 2"));
    assert!(!data.contains("timeline"));
}

#[test]
fn test_write_report_rejects_empty_path() {
    let config = scenario("empty-path", 1, (5, 5), vec![(Direction::Right, lane(0, 5, 0, 0))]);
    let mut engine = SimulationEngine::new(config).unwrap();
    let report = engine.run(RunOptions::default());

    assert!(write_report("", &report).is_err());
}

#[test]
fn test_draw_cells_marks_roads_light_and_vehicles() {
    let vehicles = vec![
        vehicle(1, 3, 5, Direction::Right),
        vehicle(2, 10, 7, Direction::Up),
    ];
    let mut light = TrafficLight::new();
    let cells = draw_cells(&GRID, &vehicles, &light);

    assert_eq!(cells.len(), 10);
    assert_eq!(cells[0].len(), 20);
    assert_eq!(cells[5][10], 'G');
    assert_eq!(cells[5][3], '>');
    assert_eq!(cells[7][10], '^');
    assert_eq!(cells[0][10], '|');
    assert_eq!(cells[5][0], '-');
    assert_eq!(cells[0][0], ' ');

    light.vertical_green = false;
    assert_eq!(draw_cells(&GRID, &vehicles, &light)[5][10], 'R');
}

#[test]
fn test_engine_render_shows_dashboard() {
    let config = scenario("render", 5, (5, 5), vec![(Direction::Right, lane(0, 5, 1, 0))]);
    let mut engine = SimulationEngine::new(config).unwrap();
    engine.step();

    let frame = engine.render();
    assert!(frame.contains("Traffic Flow Terminal Dashboard"));
    assert!(frame.contains("Step:"));
    assert!(frame.contains("right=0"));
}

#[test]
fn test_load_config_applies_defaults_and_resolves_paths() {
    let dir = temp_dir("config_defaults");
    fs::write(
        dir.join("config.json"),
        r#"{"steps": 0, "report_path": "out/report.json"}"#,
    )
    .unwrap();

    let config = load_config(dir.join("config.json")).unwrap();
    assert_eq!(config.name, "default");
    assert_eq!(config.steps, 100);
    assert_eq!(config.grid.width, 20);
    assert_eq!(config.grid.height, 10);
    assert_eq!(config.signal.vertical_green_steps, 5);
    assert_eq!(config.report_path, Some(dir.join("out/report.json")));

    let lanes: Vec<Direction> = config.spawn.lanes.keys().copied().collect();
    assert_eq!(lanes, vec![Direction::Right, Direction::Up]);
    assert_eq!(config.spawn.lanes[&Direction::Up].entry(), Cell::new(10, 9));
    assert_eq!(config.spawn.lanes[&Direction::Right].entry(), Cell::new(0, 5));
}

#[test]
fn test_load_config_rejects_lane_off_road() {
    let dir = temp_dir("config_off_road");
    fs::write(
        dir.join("config.json"),
        r#"{"spawn": {"lanes": {"up": {"entry_x": 3, "entry_y": 9, "step_interval": 2}}}}"#,
    )
    .unwrap();

    let err = load_config(dir.join("config.json")).unwrap_err();
    assert!(format!("{err:#}").contains("lane up entry_x must equal center road x=10"));
}

#[test]
fn test_load_config_rejects_entry_outside_grid() {
    let dir = temp_dir("config_outside");
    fs::write(
        dir.join("config.json"),
        r#"{"spawn": {"lanes": {"right": {"entry_x": -1, "entry_y": 5}}}}"#,
    )
    .unwrap();

    let err = load_config(dir.join("config.json")).unwrap_err();
    assert!(format!("{err:#}").contains("lane right entry is outside grid"));
}

#[test]
fn test_load_config_reports_missing_file() {
    let err = load_config("/nonexistent/traffic_flow/config.json").unwrap_err();
    assert!(format!("{err:#}").contains("read config"));
}

#[test]
fn test_demand_profile_parsing() {
    let dir = temp_dir("profile_parse");
    let path = dir.join("demand.csv");
    fs::write(&path, "Step, Right ,left\n1,2,0\nbad,row\n2,x,1\n\n4,3,1\n5\n").unwrap();

    let profile = load_demand_profile(&path, "right").unwrap();
    assert_eq!(profile.into_iter().collect::<Vec<_>>(), vec![(1, 2), (4, 3)]);

    let err = load_demand_profile(&path, "up").unwrap_err();
    assert!(format!("{err:#}").contains("missing column"));
}

/// Test that the binary runs a scenario headless and logs its summary
#[test]
fn test_cli_runs_single_scenario() {
    let dir = temp_dir("cli_single");
    let config_path = dir.join("config.json");
    fs::write(
        &config_path,
        r#"{"name": "cli-run", "steps": 40, "report_path": "cli-report.json"}"#,
    )
    .unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_traffic_flow"))
        .arg("--config")
        .arg(&config_path)
        .arg("--no-render")
        .env("RUST_LOG", "warn,traffic_flow=info")
        .output()
        .expect("Failed to execute simulation");

    assert!(
        output.status.success(),
        "Simulation failed. stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SIMULATION COMPLETE"), "stderr: {}", stderr);
    assert!(stderr.contains("Total vehicles spawned:"));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Scenario: cli-run"));
    assert!(dir.join("cli-report.json").exists());
}

/// Test that an invalid config makes the binary exit non-zero
#[test]
fn test_cli_rejects_invalid_config() {
    let dir = temp_dir("cli_invalid");
    let config_path = dir.join("config.json");
    fs::write(&config_path, r#"{"grid": {"width": 2, "height": 2}}"#).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_traffic_flow"))
        .arg("--config")
        .arg(&config_path)
        .output()
        .expect("Failed to execute simulation");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("grid must be at least 3x3"), "stderr: {}", stderr);
}
