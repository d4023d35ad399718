//! Core types for the traffic simulation
//!
//! Grid cells, travel directions and the vehicle record shared by the engine,
//! the timeline and the benchmark analyzer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Index, IndexMut};

/// A unique identifier for a vehicle within one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub u64);

/// Travel direction of a lane.
///
/// Variants are declared in lexical order of their names, so the derived
/// `Ord` is the deterministic iteration order used for spawning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Down,
    Left,
    Right,
    Up,
}

/// Which road a direction travels on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Vertical,
    Horizontal,
}

impl Direction {
    /// All directions in iteration order
    pub const ALL: [Direction; 4] = [
        Direction::Down,
        Direction::Left,
        Direction::Right,
        Direction::Up,
    ];

    fn index(self) -> usize {
        match self {
            Direction::Down => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Up => 3,
        }
    }

    pub fn axis(self) -> Axis {
        match self {
            Direction::Up | Direction::Down => Axis::Vertical,
            Direction::Left | Direction::Right => Axis::Horizontal,
        }
    }

    /// Unit step (dx, dy) for one cell of travel. Y grows downwards.
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
            Direction::Up => "up",
        }
    }

    /// Character used when drawing a vehicle heading this way
    pub fn glyph(self) -> char {
        match self {
            Direction::Up => '^',
            Direction::Down => 'v',
            Direction::Left => '<',
            Direction::Right => '>',
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fixed-size record holding one value per direction
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DirectionMap<T> {
    slots: [T; 4],
}

impl<T> DirectionMap<T> {
    /// Iterate `(direction, value)` pairs in direction order
    pub fn iter(&self) -> impl Iterator<Item = (Direction, &T)> {
        Direction::ALL.into_iter().zip(self.slots.iter())
    }
}

impl<T> Index<Direction> for DirectionMap<T> {
    type Output = T;

    fn index(&self, direction: Direction) -> &T {
        &self.slots[direction.index()]
    }
}

impl<T> IndexMut<Direction> for DirectionMap<T> {
    fn index_mut(&mut self, direction: Direction) -> &mut T {
        &mut self.slots[direction.index()]
    }
}

/// A cell on the simulation grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one unit along `direction`
    pub fn step(self, direction: Direction) -> Cell {
        let (dx, dy) = direction.delta();
        Cell::new(self.x + dx, self.y + dy)
    }

    pub fn manhattan(self, other: Cell) -> i32 {
        (self.x - other.x).abs() + (self.y - other.y).abs()
    }
}

/// A vehicle on the grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: VehicleId,
    pub x: i32,
    pub y: i32,
    pub direction: Direction,
    /// 1-based step in which the vehicle entered the grid
    pub spawn_step: usize,
    pub wait_steps: usize,
    pub moved_steps: usize,
}

impl Vehicle {
    pub fn new(id: VehicleId, cell: Cell, direction: Direction, spawn_step: usize) -> Self {
        Self {
            id,
            x: cell.x,
            y: cell.y,
            direction,
            spawn_step,
            wait_steps: 0,
            moved_steps: 0,
        }
    }

    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }

    /// The cell this vehicle would occupy after one unit of travel
    pub fn next_cell(&self) -> Cell {
        self.cell().step(self.direction)
    }

    pub fn set_cell(&mut self, cell: Cell) {
        self.x = cell.x;
        self.y = cell.y;
    }
}
