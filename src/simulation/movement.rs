//! Move planning and conflict resolution for one simulation step
//!
//! Every vehicle proposes to advance one cell. Proposals are filtered in
//! three stages:
//!
//! 1. signal: entering the intersection cell requires green on the
//!    vehicle's axis;
//! 2. contention: a cell claimed by two or more vehicles is a potential
//!    collision and every claimant is held back;
//! 3. vacancy: a vehicle moving into an occupied cell needs the occupant
//!    to move out in the same step. These dependencies form a small
//!    follower -> occupant graph that is relaxed to a fixed point.
//!
//! The result depends only on the vehicle list, the grid and the light, never
//! on hash iteration order.

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use std::collections::{BTreeMap, HashMap};

use super::config::GridConfig;
use super::light::TrafficLight;
use super::types::{Cell, Vehicle};

/// Why a vehicle stayed in place this step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    Signal,
    Traffic,
}

/// The planned outcome for one vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovePlan {
    /// Cell one unit ahead, possibly outside the grid
    pub target: Cell,
    pub exits_grid: bool,
    pub blocked: Option<BlockReason>,
}

impl MovePlan {
    pub fn can_move(&self) -> bool {
        self.blocked.is_none()
    }
}

/// Plans for every vehicle, index-aligned with the input slice
#[derive(Debug, Clone, Default)]
pub struct MoveResolution {
    pub plans: Vec<MovePlan>,
    /// Cells claimed by more than one vehicle this step
    pub potential_collisions: usize,
}

/// Decide which vehicles move this step
pub fn resolve_moves(vehicles: &[Vehicle], grid: &GridConfig, light: &TrafficLight) -> MoveResolution {
    let intersection = grid.intersection();

    let mut plans: Vec<MovePlan> = vehicles
        .iter()
        .map(|vehicle| {
            let target = vehicle.next_cell();
            let exits_grid = !grid.contains(target);
            let blocked = (!exits_grid
                && target == intersection
                && !light.is_green_for(vehicle.direction.axis()))
            .then_some(BlockReason::Signal);
            MovePlan {
                target,
                exits_grid,
                blocked,
            }
        })
        .collect();

    let potential_collisions = block_contended_cells(&mut plans);
    if potential_collisions > 0 {
        debug!("{potential_collisions} contended cell(s) this step");
    }

    relax_vacancy_dependencies(vehicles, &mut plans);

    MoveResolution {
        plans,
        potential_collisions,
    }
}

/// Hold back every vehicle whose target cell is claimed more than once.
/// Returns the number of contended cells.
fn block_contended_cells(plans: &mut [MovePlan]) -> usize {
    let mut claims: BTreeMap<Cell, Vec<usize>> = BTreeMap::new();
    for (index, plan) in plans.iter().enumerate() {
        if plan.can_move() && !plan.exits_grid {
            claims.entry(plan.target).or_default().push(index);
        }
    }

    let mut contended = 0;
    for claimants in claims.values().filter(|claimants| claimants.len() > 1) {
        contended += 1;
        for &index in claimants {
            plans[index].blocked = Some(BlockReason::Traffic);
        }
    }
    contended
}

/// Block followers whose occupant does not clear the contested cell.
///
/// Each sweep can only turn allowed vehicles into blocked ones, so the loop
/// settles after at most one sweep per vehicle.
fn relax_vacancy_dependencies(vehicles: &[Vehicle], plans: &mut [MovePlan]) {
    let occupants: HashMap<Cell, usize> = vehicles
        .iter()
        .enumerate()
        .map(|(index, vehicle)| (vehicle.cell(), index))
        .collect();

    let mut graph: DiGraph<usize, Cell> = DiGraph::with_capacity(vehicles.len(), vehicles.len());
    for index in 0..vehicles.len() {
        graph.add_node(index);
    }
    for (follower, plan) in plans.iter().enumerate() {
        if !plan.can_move() || plan.exits_grid {
            continue;
        }
        if let Some(&occupant) = occupants.get(&plan.target) {
            if occupant != follower {
                graph.add_edge(NodeIndex::new(follower), NodeIndex::new(occupant), plan.target);
            }
        }
    }

    if graph.edge_count() == 0 {
        return;
    }

    for _ in 0..=vehicles.len() {
        let mut changed = false;
        for edge in graph.edge_references() {
            let follower = graph[edge.source()];
            let occupant = graph[edge.target()];
            if !plans[follower].can_move() {
                continue;
            }
            if !occupant_clears(&plans[occupant], *edge.weight(), vehicles[follower].cell()) {
                plans[follower].blocked = Some(BlockReason::Traffic);
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
}

/// Whether an occupant of `contested` lets a follower standing on
/// `follower_cell` move in this step.
///
/// The occupant must itself be moving: out of the grid, onto another cell,
/// or into the follower's current cell (a same-step swap).
fn occupant_clears(occupant: &MovePlan, contested: Cell, follower_cell: Cell) -> bool {
    if !occupant.can_move() {
        return false;
    }
    let leaves = occupant.exits_grid || occupant.target != contested;
    let swaps = !occupant.exits_grid && occupant.target == follower_cell;
    leaves || swaps
}
