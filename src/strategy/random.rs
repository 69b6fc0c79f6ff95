use crate::distributor::{BuildContext, Distributor};
use crate::error::{DistributorError, Result};
use crate::node::Node;
use crate::strategy::partition_by_status;
use log::debug;
use serde_json::{Map, json};

/// Builds a random-aperture snapshot.
///
/// Nodes are sorted by token, which is random per node but fixed for its lifetime, so
/// the order is stable across rebuilds of one process and unpredictable across
/// processes. The sorted vector is then partitioned by status so healthy nodes fill
/// the window first.
pub fn build(nodes: &[Node], bound: usize, ctx: &BuildContext) -> Result<Distributor> {
    if nodes.is_empty() {
        return Err(DistributorError::EmptyVector);
    }

    let mut vector = nodes.to_vec();
    vector.sort_by_key(Node::token);

    let vector = partition_by_status(vector);
    let bound = bound.clamp(1, vector.len());

    let mut metadata = Map::new();
    metadata.insert("strategy".to_string(), json!("random"));

    let distributor = Distributor::new(vector, bound, ctx, metadata)?;

    debug!(
        "random aperture window ({} of {}): {}",
        distributor.bound(),
        distributor.nodes().len(),
        distributor.window_addresses()
    );

    Ok(distributor)
}
