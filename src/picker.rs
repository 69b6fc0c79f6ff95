//! Power of two choices.
//!
//! Two distinct candidates are sampled uniformly from the first `bound` nodes and the
//! healthier one wins. Status is compared first, then load. When both are equal the
//! first sampled candidate wins, which keeps selection uniform among equal nodes while
//! staying deterministic for a given random source.

use crate::node::Node;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;
use std::sync::{Mutex, PoisonError};

/// Uniform random index source shared by all pickers of a snapshot.
pub trait IndexSource: Send + Sync {
    /// Returns an index in `[0, bound)`. Callers never pass 0.
    fn next_index(&self, bound: usize) -> usize;
}

/// Thread-local randomness, the default for production use.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl IndexSource for ThreadRandom {
    fn next_index(&self, bound: usize) -> usize {
        rand::rng().random_range(0..bound)
    }
}

/// Reproducible randomness for tests and simulations.
pub struct SeededRandom {
    rng: Mutex<StdRng>,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl IndexSource for SeededRandom {
    fn next_index(&self, bound: usize) -> usize {
        self.rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .random_range(0..bound)
    }
}

pub struct P2c<'a> {
    nodes: &'a [Node],
    bound: usize,
    rng: &'a dyn IndexSource,
}

impl<'a> P2c<'a> {
    pub fn new(nodes: &'a [Node], bound: usize, rng: &'a dyn IndexSource) -> Self {
        Self {
            nodes,
            bound: bound.min(nodes.len()),
            rng,
        }
    }

    /// Index of the chosen node, `None` when the bound is empty.
    pub fn pick_index(&self) -> Option<usize> {
        match self.bound {
            0 => None,
            1 => Some(0),
            bound => {
                let first = self.rng.next_index(bound);
                let mut second = self.rng.next_index(bound - 1);
                if second >= first {
                    second += 1;
                }

                Some(self.better(first, second))
            }
        }
    }

    pub fn pick(&self) -> Option<&'a Node> {
        let nodes = self.nodes;
        self.pick_index().map(|index| &nodes[index])
    }

    fn better(&self, first: usize, second: usize) -> usize {
        let (a, b) = (&self.nodes[first], &self.nodes[second]);

        let ordering = a
            .status()
            .cmp(&b.status())
            .then_with(|| b.load().total_cmp(&a.load()));

        match ordering {
            Ordering::Less => second,
            Ordering::Equal | Ordering::Greater => first,
        }
    }
}
