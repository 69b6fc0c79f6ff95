//! Aperture load distribution for RPC clients.
//!
//! A distributor keeps a window ("aperture") over a prefix of the resolved node set and
//! picks among the window with power of two choices. The window is built either from
//! per-node random tokens or from a ring coordinate shared by every client process.

pub mod config;
pub mod controller;
pub mod coordinate;
pub mod distributor;
pub mod error;
pub mod node;
pub mod picker;
pub mod strategy;

#[cfg(test)]
mod testing;

pub use config::{ApertureConfig, EnvConfig, StaticConfig};
pub use controller::ApertureController;
pub use coordinate::Coordinate;
pub use distributor::{BuildContext, Distributor};
pub use error::DistributorError;
pub use node::{ManualFactory, Node, ServiceFactory, Status};
