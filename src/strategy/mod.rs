//! Windowing strategies.
//!
//! Both builders share the shape `(nodes, bound, ctx) -> Distributor`. The controller
//! picks one per rebuild from live configuration and coordinate availability.

pub mod deterministic;
pub mod random;

use crate::coordinate::Coordinate;
use crate::distributor::{BuildContext, Distributor};
use crate::error::Result;
use crate::node::{Node, Status};
use std::cmp::Reverse;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Random,
    Deterministic(Coordinate),
}

impl Strategy {
    /// Deterministic windowing needs both the flag and a coordinate, otherwise random.
    pub fn select(deterministic_active: bool, coordinate: Option<Coordinate>) -> Self {
        match coordinate {
            Some(coordinate) if deterministic_active => Strategy::Deterministic(coordinate),
            _ => Strategy::Random,
        }
    }

    pub fn build(&self, nodes: &[Node], bound: usize, ctx: &BuildContext) -> Result<Distributor> {
        match self {
            Strategy::Random => random::build(nodes, bound, ctx),
            Strategy::Deterministic(coordinate) => {
                deterministic::build(nodes, bound, *coordinate, ctx)
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Random => "random",
            Strategy::Deterministic(_) => "deterministic",
        }
    }
}

/// Clamps a logical aperture to `[min_aperture, len]`, never going below 1.
pub fn clamp_aperture(logical: usize, min_aperture: usize, len: usize) -> usize {
    let min_aperture = min_aperture.max(1);

    logical.max(min_aperture).min(len).max(1)
}

/// Stable partition into `[Open][Busy][Closed]`.
///
/// Each node's status is read once, so a status change during the sort cannot
/// break the ordering.
pub(crate) fn partition_by_status(nodes: Vec<Node>) -> Vec<Node> {
    let mut keyed: Vec<(Status, Node)> = nodes
        .into_iter()
        .map(|node| (node.status(), node))
        .collect();

    keyed.sort_by_key(|(status, _)| Reverse(*status));

    keyed.into_iter().map(|(_, node)| node).collect()
}
