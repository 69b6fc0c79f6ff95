use crate::coordinate::Coordinate;
use crate::distributor::{BuildContext, Distributor};
use crate::error::{DistributorError, Result};
use crate::node::Node;
use crate::strategy::partition_by_status;
use log::debug;
use serde_json::{Map, json};

pub type RingPosition = u32;

/// Position of a node on the shared ring.
///
/// Taken from the node's v5 identity, so every process computes the same value.
pub fn ring_position(node: &Node) -> RingPosition {
    (node.id().as_u128() >> 96) as RingPosition
}

/// Builds a deterministic-aperture snapshot.
///
/// Nodes are ordered by ring position (ties broken by id) and this process takes the
/// arc that starts at its coordinate. The window is at least `ceil(len / total_units)`
/// wide so that the windows of all processes cover every node. Window members are
/// reordered by status but never leave the window because of it.
pub fn build(
    nodes: &[Node],
    bound: usize,
    coordinate: Coordinate,
    ctx: &BuildContext,
) -> Result<Distributor> {
    if nodes.is_empty() {
        return Err(DistributorError::EmptyVector);
    }

    let mut ring = nodes.to_vec();
    ring.sort_by(|a, b| {
        ring_position(a)
            .cmp(&ring_position(b))
            .then_with(|| a.id().cmp(&b.id()))
    });

    let ring_size = ring.len();
    let width = bound.max(coordinate.min_width(ring_size)).clamp(1, ring_size);
    let arc = coordinate.arc(ring_size, width);

    let window: Vec<Node> = arc.iter(ring_size).map(|i| ring[i].clone()).collect();
    let rest = ring
        .into_iter()
        .enumerate()
        .filter(|(i, _)| !arc.contains(*i))
        .map(|(_, node)| node);

    let mut vector = partition_by_status(window);
    vector.extend(rest);

    let mut metadata = Map::new();
    metadata.insert("strategy".to_string(), json!("deterministic"));
    metadata.insert("coordinate".to_string(), json!(coordinate));
    metadata.insert("arc".to_string(), json!(arc.to_string()));

    let distributor = Distributor::new(vector, width, ctx, metadata)?;

    debug!(
        "deterministic aperture window for {coordinate} on {arc} ({} of {}): {}",
        distributor.bound(),
        ring_size,
        distributor.window_addresses()
    );

    Ok(distributor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ManualFactory, Status};
    use crate::picker::SeededRandom;
    use crate::testing::manual_nodes;
    use std::collections::{HashMap, HashSet};
    use std::sync::Arc;
    use uuid::Uuid;

    fn ctx() -> BuildContext {
        BuildContext::default().with_rng(Arc::new(SeededRandom::new(9)))
    }

    fn ids(nodes: &[Node]) -> Vec<Uuid> {
        nodes.iter().map(Node::id).collect()
    }

    #[test]
    fn test_empty_input_fails() {
        let coordinate = Coordinate::new(0, 1).unwrap();

        assert!(matches!(
            build(&[], 1, coordinate, &ctx()),
            Err(DistributorError::EmptyVector)
        ));
    }

    #[test]
    fn test_window_ignores_input_order_and_tokens() {
        let coordinate = Coordinate::new(1, 3).unwrap();
        let (nodes, _) = manual_nodes(&[1, 2, 3, 4, 5, 6], &[Status::Open; 6]);

        let mut reversed = nodes.clone();
        reversed.reverse();

        // same addresses, different tokens
        let retokened: Vec<Node> = nodes
            .iter()
            .map(|node| {
                let factory = Arc::new(ManualFactory::new(node.address(), Status::Open));
                Node::with_token(node.address(), node.token() * 1000, factory)
            })
            .collect();

        let first = build(&nodes, 2, coordinate, &ctx()).unwrap();
        let second = build(&reversed, 2, coordinate, &ctx()).unwrap();
        let third = build(&retokened, 2, coordinate, &ctx()).unwrap();

        assert_eq!(ids(first.window()), ids(second.window()));
        assert_eq!(ids(first.window()), ids(third.window()));
    }

    #[test]
    fn test_windows_of_all_processes_cover_every_node() {
        const TOTAL: u32 = 4;

        let tokens: Vec<u64> = (1..=10).collect();
        let (nodes, _) = manual_nodes(&tokens, &[Status::Open; 10]);

        let mut hits: HashMap<Uuid, usize> = HashMap::new();
        for offset in 0..TOTAL {
            let coordinate = Coordinate::new(offset, TOTAL).unwrap();
            let distributor = build(&nodes, 1, coordinate, &ctx()).unwrap();

            // raised from 1 to ceil(10 / 4)
            assert_eq!(distributor.bound(), 3);

            for node in distributor.window() {
                *hits.entry(node.id()).or_default() += 1;
            }
        }

        assert_eq!(hits.len(), nodes.len());
        // arcs of width 3 over 10 nodes overlap on at most two nodes
        assert!(hits.values().all(|&count| count <= 2), "{hits:?}");
    }

    #[test]
    fn test_window_is_status_partitioned() {
        let coordinate = Coordinate::new(0, 1).unwrap();
        let (nodes, factories) = manual_nodes(&[1, 2, 3, 4], &[Status::Open; 4]);
        factories[0].set_status(Status::Closed);
        factories[1].set_status(Status::Busy);

        let distributor = build(&nodes, 4, coordinate, &ctx()).unwrap();

        assert_eq!(
            distributor
                .window()
                .iter()
                .map(Node::status)
                .collect::<Vec<_>>(),
            vec![Status::Open, Status::Open, Status::Busy, Status::Closed]
        );
        assert!(!distributor.needs_rebuild());

        factories[1].set_status(Status::Open);
        assert!(distributor.needs_rebuild());
    }

    #[test]
    fn test_unhealthy_nodes_stay_in_window() {
        let coordinate = Coordinate::new(0, 2).unwrap();
        let (nodes, factories) = manual_nodes(&[1, 2, 3, 4], &[Status::Open; 4]);

        let healthy = build(&nodes, 1, coordinate, &ctx()).unwrap();
        let window: HashSet<Uuid> = ids(healthy.window()).into_iter().collect();

        for factory in &factories {
            factory.set_status(Status::Closed);
        }
        let degraded = build(&nodes, 1, coordinate, &ctx()).unwrap();
        let degraded_window: HashSet<Uuid> = ids(degraded.window()).into_iter().collect();

        assert_eq!(window, degraded_window);
        assert_eq!(degraded.nodes().len(), 4);
    }

    #[test]
    fn test_metadata_includes_coordinate() {
        let coordinate = Coordinate::new(1, 2).unwrap();
        let (nodes, _) = manual_nodes(&[1, 2, 3, 4], &[Status::Open; 4]);

        let metadata = build(&nodes, 2, coordinate, &ctx())
            .unwrap()
            .additional_metadata();

        assert_eq!(metadata["strategy"], json!("deterministic"));
        assert_eq!(
            metadata["coordinate"],
            json!({"offset": 1, "total_units": 2})
        );
        assert_eq!(metadata["arc"], json!("[2,0)"));
    }
}
