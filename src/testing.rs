use crate::node::{ManualFactory, Node, Status};
use log::LevelFilter;
use std::sync::Arc;

pub fn init_logging(level: LevelFilter) {
    let _ = env_logger::builder()
        .filter_level(level)
        .is_test(true)
        .try_init();
}

/// Builds one node per `(token, status)` pair, addressed `10.0.0.<token>:9000`.
pub fn manual_nodes(tokens: &[u64], statuses: &[Status]) -> (Vec<Node>, Vec<Arc<ManualFactory>>) {
    assert_eq!(tokens.len(), statuses.len());

    tokens
        .iter()
        .zip(statuses)
        .map(|(&token, &status)| {
            let address = format!("10.0.0.{token}:9000");
            let factory = Arc::new(ManualFactory::new(address.clone(), status));
            (Node::with_token(address, token, factory.clone()), factory)
        })
        .unzip()
}

pub fn tokens(nodes: &[Node]) -> Vec<u64> {
    nodes.iter().map(Node::token).collect()
}
