use crate::config::ApertureConfig;
use crate::coordinate::{Coordinate, process_coordinate};
use crate::distributor::{BuildContext, Distributor};
use crate::error::{DistributorError, Result};
use crate::node::{Node, Status};
use crate::strategy::{Strategy, clamp_aperture};
use arc_swap::ArcSwap;
use log::{debug, error, info};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch::{self, Receiver};
use tokio::time;
use uuid::Uuid;

/// Owns the current aperture snapshot and rebuilds it.
///
/// Readers go through an `ArcSwap`, so `pick` never takes a lock. Rebuilds are
/// serialised by the node mutex.
pub struct ApertureController<C> {
    config: Arc<C>,
    ctx: BuildContext,
    coordinate: Option<Coordinate>,
    nodes: Mutex<Vec<Node>>,
    logical: AtomicUsize,
    current: ArcSwap<Distributor>,
    rebuilds: AtomicU64,
}

impl<C: ApertureConfig> ApertureController<C> {
    /// Creates a controller using the process coordinate, if one was installed.
    pub fn new(config: Arc<C>, nodes: Vec<Node>, ctx: BuildContext) -> Result<Self> {
        Self::with_coordinate(config, nodes, ctx, process_coordinate())
    }

    pub fn with_coordinate(
        config: Arc<C>,
        nodes: Vec<Node>,
        ctx: BuildContext,
        coordinate: Option<Coordinate>,
    ) -> Result<Self> {
        let logical = config.init_aperture().max(config.min_aperture()).max(1);
        let strategy = Strategy::select(config.deterministic_active(), coordinate);
        let bound = clamp_aperture(logical, config.min_aperture(), nodes.len());
        let distributor = Arc::new(strategy.build(&nodes, bound, &ctx)?);

        info!(
            "aperture controller started: {} strategy, bound {} of {} nodes",
            strategy.name(),
            distributor.bound(),
            nodes.len()
        );

        let controller = Self {
            config,
            ctx,
            coordinate,
            nodes: Mutex::new(nodes),
            logical: AtomicUsize::new(logical),
            current: ArcSwap::new(distributor.clone()),
            rebuilds: AtomicU64::new(0),
        };

        if controller.config.eager_connections() {
            controller.prewarm(None, &distributor);
        }

        Ok(controller)
    }

    /// Strategy the next rebuild will use.
    pub fn strategy(&self) -> Strategy {
        Strategy::select(self.config.deterministic_active(), self.coordinate)
    }

    pub fn current(&self) -> Arc<Distributor> {
        self.current.load_full()
    }

    pub fn pick(&self) -> Node {
        self.current.load().pick()
    }

    pub fn status(&self) -> Status {
        self.current.load().status()
    }

    pub fn needs_rebuild(&self) -> bool {
        self.current.load().needs_rebuild()
    }

    pub fn logical_aperture(&self) -> usize {
        self.logical.load(Ordering::Acquire)
    }

    pub fn rebuild_count(&self) -> u64 {
        self.rebuilds.load(Ordering::Acquire)
    }

    /// Rebuilds from the latest resolved node set.
    pub fn rebuild(&self) -> Result<Arc<Distributor>> {
        let nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        self.rebuild_with(&nodes)
    }

    /// Replaces the resolved node set and rebuilds.
    ///
    /// An empty set is rejected and the installed snapshot stays in place.
    pub fn update_nodes(&self, nodes: Vec<Node>) -> Result<Arc<Distributor>> {
        if nodes.is_empty() {
            return Err(DistributorError::EmptyVector);
        }

        let mut current = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);
        let distributor = self.rebuild_with(&nodes)?;
        *current = nodes;

        Ok(distributor)
    }

    /// Widens the logical aperture by one node and rebuilds.
    pub fn expand(&self) -> Result<Arc<Distributor>> {
        self.adjust(1)
    }

    /// Narrows the logical aperture by one node and rebuilds.
    pub fn contract(&self) -> Result<Arc<Distributor>> {
        self.adjust(-1)
    }

    fn adjust(&self, delta: isize) -> Result<Arc<Distributor>> {
        let nodes = self.nodes.lock().unwrap_or_else(PoisonError::into_inner);

        let min = self.config.min_aperture().max(1);
        let max = nodes.len().max(min);
        let logical = self
            .logical_aperture()
            .saturating_add_signed(delta)
            .clamp(min, max);
        self.logical.store(logical, Ordering::Release);

        self.rebuild_with(&nodes)
    }

    fn rebuild_with(&self, nodes: &[Node]) -> Result<Arc<Distributor>> {
        let strategy = self.strategy();
        let bound = clamp_aperture(
            self.logical_aperture(),
            self.config.min_aperture(),
            nodes.len(),
        );

        let next = Arc::new(strategy.build(nodes, bound, &self.ctx)?);
        let previous = self.current.swap(next.clone());
        self.rebuilds.fetch_add(1, Ordering::AcqRel);

        info!(
            "rebuilt {} aperture: bound {} of {} nodes, status {}",
            strategy.name(),
            next.bound(),
            nodes.len(),
            next.status()
        );

        if self.config.eager_connections() {
            self.prewarm(Some(&previous), &next);
        }

        Ok(next)
    }

    /// Opens connections to nodes that just entered the window. Best effort, failures
    /// are only logged.
    fn prewarm(&self, previous: Option<&Distributor>, next: &Distributor) {
        let Ok(handle) = Handle::try_current() else {
            debug!("no tokio runtime, skipping eager connections");
            return;
        };

        let known: HashSet<Uuid> = previous
            .map(|distributor| distributor.window().iter().map(Node::id).collect())
            .unwrap_or_default();

        for node in next.window().iter().filter(|node| !known.contains(&node.id())) {
            let node = node.clone();
            handle.spawn(async move {
                match node.connect().await {
                    Ok(()) => debug!("eagerly connected to {node}"),
                    Err(e) => error!("eager connection to {node} failed: {e}"),
                }
            });
        }
    }
}

impl<C: ApertureConfig + 'static> ApertureController<C> {
    /// Polls `needs_rebuild` every `interval` and rebuilds when it is set.
    ///
    /// The receiver carries the rebuild count after each poll-triggered rebuild.
    pub async fn start(self: Arc<Self>, interval: Duration) -> (impl FnOnce(), Receiver<u64>) {
        let (tx, rx) = watch::channel(self.rebuild_count());

        let task = tokio::spawn(async move {
            let mut ticker = time::interval(interval);

            loop {
                ticker.tick().await;

                if !self.needs_rebuild() {
                    continue;
                }

                match self.rebuild() {
                    Ok(_) => {
                        tx.send_replace(self.rebuild_count());
                    }
                    Err(e) => error!("error rebuilding aperture: {e}"),
                }
            }
        });

        let close_function = move || {
            task.abort();
            info!("ApertureController stopped");
        };

        info!("ApertureController started");

        (close_function, rx)
    }
}
