use crate::error::{DistributorError, Result};
use futures::future::{self, BoxFuture, FutureExt};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, AtomicUsize, Ordering};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Health of a node as reported by its factory.
///
/// Variants are ordered from worst to best, so `max` always yields the healthier status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Status {
    /// Unusable
    Closed,
    /// Degraded but usable
    Busy,
    /// Healthy
    Open,
}

impl Status {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Status::Closed,
            1 => Status::Busy,
            _ => Status::Open,
        }
    }
}

/// Source of connections to a single backend.
///
/// Health accounting (circuit breaking, outstanding requests) lives behind this trait,
/// the distributor only reads from it.
pub trait ServiceFactory: Send + Sync {
    fn status(&self) -> Status;

    /// Secondary signal compared when two candidates share a status. Lower is better.
    fn load(&self) -> f64 {
        0.0
    }

    fn connect(&self) -> BoxFuture<'static, Result<()>>;
}

/// A backend in the resolved pool.
///
/// Cloning is cheap and clones share identity, token and factory.
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

struct NodeInner {
    id: Uuid,
    address: String,
    token: u64,
    factory: Arc<dyn ServiceFactory>,
}

impl Node {
    /// Creates a node with a freshly drawn random token.
    pub fn new(address: impl Into<String>, factory: Arc<dyn ServiceFactory>) -> Self {
        Self::with_token(address, rand::random(), factory)
    }

    pub fn with_token(
        address: impl Into<String>,
        token: u64,
        factory: Arc<dyn ServiceFactory>,
    ) -> Self {
        let address = address.into();
        // v5 so every process derives the same identity for the same address
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, address.as_bytes());

        Self {
            inner: Arc::new(NodeInner {
                id,
                address,
                token,
                factory,
            }),
        }
    }

    /// A node that is always Closed and whose connections fail with `error`.
    pub fn failing(error: DistributorError) -> Self {
        Self::with_token("<no capacity>", 0, Arc::new(FailingFactory { error }))
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn address(&self) -> &str {
        &self.inner.address
    }

    pub fn token(&self) -> u64 {
        self.inner.token
    }

    pub fn status(&self) -> Status {
        self.inner.factory.status()
    }

    pub fn load(&self) -> f64 {
        self.inner.factory.load()
    }

    pub fn connect(&self) -> BoxFuture<'static, Result<()>> {
        self.inner.factory.connect()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("address", &self.inner.address)
            .field("token", &self.inner.token)
            .field("status", &self.status())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.address)
    }
}

struct FailingFactory {
    error: DistributorError,
}

impl ServiceFactory for FailingFactory {
    fn status(&self) -> Status {
        Status::Closed
    }

    fn connect(&self) -> BoxFuture<'static, Result<()>> {
        future::ready(Err(self.error.clone())).boxed()
    }
}

/// Factory whose status and load are set by hand.
///
/// Used by the simulation binary and in tests; connecting succeeds unless the
/// factory is Closed.
pub struct ManualFactory {
    address: String,
    status: AtomicU8,
    load: AtomicU64,
    connects: AtomicUsize,
}

impl ManualFactory {
    pub fn new(address: impl Into<String>, status: Status) -> Self {
        Self {
            address: address.into(),
            status: AtomicU8::new(status as u8),
            load: AtomicU64::new(0f64.to_bits()),
            connects: AtomicUsize::new(0),
        }
    }

    pub fn set_status(&self, status: Status) {
        self.status.store(status as u8, Ordering::Release);
    }

    pub fn set_load(&self, load: f64) {
        self.load.store(load.to_bits(), Ordering::Release);
    }

    /// Number of connection attempts made through this factory.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::Acquire)
    }
}

impl ServiceFactory for ManualFactory {
    fn status(&self) -> Status {
        Status::from_u8(self.status.load(Ordering::Acquire))
    }

    fn load(&self) -> f64 {
        f64::from_bits(self.load.load(Ordering::Acquire))
    }

    fn connect(&self) -> BoxFuture<'static, Result<()>> {
        self.connects.fetch_add(1, Ordering::AcqRel);

        let result = match self.status() {
            Status::Closed => Err(DistributorError::Connect {
                address: self.address.clone(),
                reason: "node is closed".to_string(),
            }),
            Status::Busy | Status::Open => Ok(()),
        };

        future::ready(result).boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_priority() {
        assert!(Status::Open > Status::Busy);
        assert!(Status::Busy > Status::Closed);
        assert_eq!(Status::Busy.max(Status::Closed), Status::Busy);
        assert_eq!("busy".parse::<Status>().unwrap(), Status::Busy);
        assert_eq!(Status::Open.to_string(), "open");
    }

    #[test]
    fn test_identity_is_derived_from_address() {
        let a = Node::new("10.0.0.1:9000", Arc::new(ManualFactory::new("a", Status::Open)));
        let b = Node::new("10.0.0.1:9000", Arc::new(ManualFactory::new("b", Status::Open)));
        let c = Node::new("10.0.0.2:9000", Arc::new(ManualFactory::new("c", Status::Open)));

        assert_eq!(a.id(), b.id());
        assert_ne!(a.id(), c.id());
    }

    #[test]
    fn test_token_is_stable_across_clones() {
        let node = Node::new("10.0.0.1:9000", Arc::new(ManualFactory::new("a", Status::Open)));
        let clone = node.clone();

        assert_eq!(node.token(), clone.token());
    }

    #[test]
    fn test_status_and_load_are_read_live() {
        let factory = Arc::new(ManualFactory::new("a", Status::Open));
        let node = Node::with_token("a", 1, factory.clone());

        factory.set_status(Status::Busy);
        factory.set_load(2.5);

        assert_eq!(node.status(), Status::Busy);
        assert_eq!(node.load(), 2.5);
    }

    #[tokio::test]
    async fn test_failing_node_always_fails() {
        let error = DistributorError::NoCapacity("drained".to_string());
        let node = Node::failing(error.clone());

        assert_eq!(node.status(), Status::Closed);
        for _ in 0..3 {
            assert_eq!(node.connect().await, Err(error.clone()));
        }
    }

    #[tokio::test]
    async fn test_manual_factory_connect() {
        let factory = ManualFactory::new("10.0.0.1:9000", Status::Open);

        assert!(factory.connect().await.is_ok());

        factory.set_status(Status::Closed);
        assert!(matches!(
            factory.connect().await,
            Err(DistributorError::Connect { .. })
        ));
        assert_eq!(factory.connect_count(), 2);
    }
}
