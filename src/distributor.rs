use crate::error::{DistributorError, Result};
use crate::node::{Node, Status};
use crate::picker::{IndexSource, P2c, ThreadRandom};
use itertools::Itertools;
use serde_json::{Map, Value, json};
use std::ops::Range;
use std::sync::Arc;

pub type EmptyErrorSupplier = Arc<dyn Fn() -> DistributorError + Send + Sync>;

/// Collaborators shared by every snapshot a controller builds.
#[derive(Clone)]
pub struct BuildContext {
    pub rng: Arc<dyn IndexSource>,
    pub empty_error: EmptyErrorSupplier,
}

impl Default for BuildContext {
    fn default() -> Self {
        Self {
            rng: Arc::new(ThreadRandom),
            empty_error: Arc::new(|| {
                DistributorError::NoCapacity("no nodes available in the aperture".to_string())
            }),
        }
    }
}

impl BuildContext {
    pub fn with_rng(mut self, rng: Arc<dyn IndexSource>) -> Self {
        self.rng = rng;
        self
    }

    pub fn with_empty_error(
        mut self,
        supplier: impl Fn() -> DistributorError + Send + Sync + 'static,
    ) -> Self {
        self.empty_error = Arc::new(supplier);
        self
    }
}

/// Immutable snapshot of an aperture.
///
/// The first `bound` nodes of the vector are in the window. A rebuild produces a new
/// snapshot, this one is never modified.
pub struct Distributor {
    nodes: Vec<Node>,
    bound: usize,
    empty: Node,
    rng: Arc<dyn IndexSource>,
    busy: Vec<Node>,
    metadata: Map<String, Value>,
}

impl Distributor {
    /// `bound` is capped at the vector length. Nodes that are Busy right now are
    /// remembered so their recovery can be noticed without rescanning.
    pub fn new(
        nodes: Vec<Node>,
        bound: usize,
        ctx: &BuildContext,
        metadata: Map<String, Value>,
    ) -> Result<Self> {
        if nodes.is_empty() {
            return Err(DistributorError::EmptyVector);
        }

        let bound = bound.min(nodes.len());
        let busy = nodes
            .iter()
            .filter(|node| node.status() == Status::Busy)
            .cloned()
            .collect();

        Ok(Self {
            nodes,
            bound,
            empty: Node::failing((ctx.empty_error)()),
            rng: ctx.rng.clone(),
            busy,
            metadata,
        })
    }

    /// Best status in the window, stopping at the first Open node.
    pub fn status(&self) -> Status {
        let mut best = Status::Closed;

        for node in self.window() {
            match node.status() {
                Status::Open => return Status::Open,
                status => best = best.max(status),
            }
        }

        best
    }

    /// Chooses a node for one request.
    ///
    /// Returns the failing node when the window is empty or entirely Closed.
    pub fn pick(&self) -> Node {
        let picker = P2c::new(&self.nodes, self.bound, self.rng.as_ref());

        match picker.pick() {
            None => self.empty.clone(),
            Some(node) if node.status() == Status::Closed && self.status() == Status::Closed => {
                self.empty.clone()
            }
            Some(node) => node.clone(),
        }
    }

    /// True once a node that was Busy when this snapshot was built reports Open.
    pub fn needs_rebuild(&self) -> bool {
        self.busy.iter().any(|node| node.status() == Status::Open)
    }

    pub fn indices(&self) -> Range<usize> {
        0..self.bound
    }

    pub fn bound(&self) -> usize {
        self.bound
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn window(&self) -> &[Node] {
        &self.nodes[..self.bound]
    }

    pub fn window_addresses(&self) -> String {
        format!("[{}]", self.window().iter().map(Node::address).join(", "))
    }

    pub fn additional_metadata(&self) -> Map<String, Value> {
        let mut metadata = self.metadata.clone();

        metadata.insert("nodes".to_string(), json!(self.window_addresses()));
        metadata.insert("bound".to_string(), json!(self.bound));
        metadata.insert("vector_size".to_string(), json!(self.nodes.len()));

        metadata
    }
}
