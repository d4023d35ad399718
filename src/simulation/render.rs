//! Terminal dashboard for a running simulation

use std::fmt::Write;

use super::config::GridConfig;
use super::light::TrafficLight;
use super::types::{Direction, DirectionMap, Vehicle};

const RESET: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const DIM: &str = "\x1b[2m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const BLUE: &str = "\x1b[34m";
const CYAN: &str = "\x1b[36m";
const GRAY: &str = "\x1b[90m";
const CLEAR_SCREEN: &str = "\x1b[H\x1b[2J";

/// Counters shown around the grid
#[derive(Debug, Clone, Default)]
pub struct RenderStats {
    pub scenario_name: String,
    pub step: usize,
    pub total_steps: usize,
    pub vertical_green: bool,
    pub spawned_vehicles: usize,
    pub completed_vehicles: usize,
    pub active_vehicles: usize,
    pub blocked_by_signal: usize,
    pub blocked_by_traffic: usize,
    pub potential_collisions: usize,
    pub max_queue_overall: usize,
    pub average_network_speed: f64,
    pub throughput_per_100_steps: f64,
    pub lane_queue: DirectionMap<usize>,
    pub lane_active: DirectionMap<usize>,
}

/// Build one dashboard frame, including the clear-screen prefix
pub fn render_frame(
    grid: &GridConfig,
    vehicles: &[Vehicle],
    light: &TrafficLight,
    stats: &RenderStats,
) -> String {
    let mut out = String::from(CLEAR_SCREEN);
    write_header(&mut out, stats);
    write_grid(&mut out, &draw_cells(grid, vehicles, light));
    write_footer(&mut out, stats);
    out
}

/// Plain character grid: roads, the light and vehicles
pub fn draw_cells(grid: &GridConfig, vehicles: &[Vehicle], light: &TrafficLight) -> Vec<Vec<char>> {
    let width = grid.width.max(0) as usize;
    let height = grid.height.max(0) as usize;
    let mut cells = vec![vec![' '; width]; height];
    if width == 0 || height == 0 {
        return cells;
    }

    let center = grid.intersection();
    let (cx, cy) = (center.x as usize, center.y as usize);
    for row in cells.iter_mut() {
        row[cx] = '|';
    }
    for cell in cells[cy].iter_mut() {
        *cell = '-';
    }
    cells[cy][cx] = if light.vertical_green { 'G' } else { 'R' };

    for vehicle in vehicles.iter().filter(|v| grid.contains(v.cell())) {
        cells[vehicle.y as usize][vehicle.x as usize] = vehicle.direction.glyph();
    }
    cells
}

fn write_header(out: &mut String, stats: &RenderStats) {
    let phase = if stats.vertical_green {
        format!("{GREEN}VERTICAL GREEN{RESET}")
    } else {
        format!("{RED}HORIZONTAL GREEN{RESET}")
    };
    let _ = writeln!(out, "{BOLD}{CYAN}Traffic Flow Terminal Dashboard{RESET}");
    let _ = writeln!(
        out,
        "{BOLD}Scenario:{RESET} {} | {BOLD}Step:{RESET} {}/{} | {BOLD}Phase:{RESET} {phase}",
        stats.scenario_name, stats.step, stats.total_steps
    );
    let _ = writeln!(
        out,
        "{BOLD}Vehicles{RESET} spawned={} completed={} active={} | {BOLD}Speed{RESET} avg={:.3} | {BOLD}Throughput{RESET} {:.2}/100",
        stats.spawned_vehicles,
        stats.completed_vehicles,
        stats.active_vehicles,
        stats.average_network_speed,
        stats.throughput_per_100_steps
    );
    let _ = writeln!(
        out,
        "{BOLD}Blockers{RESET} signal={} traffic={} | {BOLD}Conflicts{RESET} potential={} | {BOLD}Max Queue{RESET} {}",
        stats.blocked_by_signal,
        stats.blocked_by_traffic,
        stats.potential_collisions,
        stats.max_queue_overall
    );
    out.push('\n');
}

fn write_grid(out: &mut String, cells: &[Vec<char>]) {
    let width = cells.first().map_or(0, Vec::len);
    let border = "-".repeat(width);
    let _ = writeln!(out, "{DIM}+{border}+{RESET}");
    for row in cells {
        let _ = write!(out, "{DIM}|{RESET}");
        for &cell in row {
            out.push_str(&style_cell(cell));
        }
        let _ = writeln!(out, "{DIM}|{RESET}");
    }
    let _ = writeln!(out, "{DIM}+{border}+{RESET}");
    out.push('\n');
}

fn write_footer(out: &mut String, stats: &RenderStats) {
    let _ = write!(out, "{BOLD}Lane Queues{RESET}  ");
    for direction in Direction::ALL {
        let _ = write!(out, "{direction}={}  ", stats.lane_queue[direction]);
    }
    out.push('\n');

    let _ = write!(out, "{BOLD}Lane Active{RESET}  ");
    for direction in Direction::ALL {
        let _ = write!(out, "{direction}={}  ", stats.lane_active[direction]);
    }
    out.push('\n');

    let _ = writeln!(
        out,
        "{BOLD}Legend{RESET} {GREEN}G{RESET}=vertical green  {RED}R{RESET}=horizontal green  \
         {CYAN}^/v{RESET}=vertical cars  {YELLOW}</>{RESET}=horizontal cars  {GRAY}|/-{RESET}=roads"
    );
}

fn style_cell(cell: char) -> String {
    match cell {
        'G' => format!("{GREEN}G{RESET}"),
        'R' => format!("{RED}R{RESET}"),
        '^' | 'v' => format!("{CYAN}{cell}{RESET}"),
        '<' | '>' => format!("{YELLOW}{cell}{RESET}"),
        '|' | '-' => format!("{GRAY}{cell}{RESET}"),
        ' ' => " ".to_string(),
        other => format!("{BLUE}{other}{RESET}"),
    }
}
