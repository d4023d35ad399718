//! Traffic Flow Library
//!
//! A discrete-step simulator for a single signalised grid intersection, with a
//! deterministic benchmark layer that compares a candidate scenario against a
//! baseline.

pub mod benchmark;
pub mod simulation;
