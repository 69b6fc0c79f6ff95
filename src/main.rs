mod eager_env;

use crate::eager_env::{StartupEnv, parse_node_addresses};
use anyhow::{Result, bail};
use aperture::{
    ApertureController, BuildContext, EnvConfig, ManualFactory, Node, Status, coordinate,
};
use log::info;
use rand::Rng;
use rand::seq::IndexedRandom;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time;

const STATUSES: [Status; 3] = [Status::Open, Status::Busy, Status::Closed];

/// Changes the status of one random simulated backend.
fn flip_random_status(factories: &[(String, Arc<ManualFactory>)]) {
    let mut rng = rand::rng();

    let Some((address, factory)) = factories.choose(&mut rng) else {
        return;
    };
    // recoveries are more likely than failures, as in a mostly healthy fleet
    let status = if rng.random_bool(0.6) {
        Status::Open
    } else {
        *STATUSES.choose(&mut rng).unwrap_or(&Status::Open)
    };

    factory.set_status(status);
    info!("simulated {address} is now {status}");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::builder()
        .format_timestamp(Some(env_logger::TimestampPrecision::Millis))
        .init();
    let startup = StartupEnv::load()?;

    if let Some(process_coordinate) = eager_env::coordinate()? {
        coordinate::init_coordinate(process_coordinate)?;
        info!("process coordinate {process_coordinate}");
    }

    let addresses = parse_node_addresses(&startup.node_addresses);
    if addresses.is_empty() {
        bail!("NODE_ADDRESSES does not contain any address");
    }

    let factories: Vec<(String, Arc<ManualFactory>)> = addresses
        .into_iter()
        .map(|address| {
            let factory = Arc::new(ManualFactory::new(address.clone(), Status::Open));
            (address, factory)
        })
        .collect();

    let nodes = factories
        .iter()
        .map(|(address, factory)| Node::new(address.clone(), factory.clone()))
        .collect();

    let controller = Arc::new(ApertureController::new(
        Arc::new(EnvConfig),
        nodes,
        BuildContext::default(),
    )?);

    let (stop_controller, mut rebuilds) = controller
        .clone()
        .start(Duration::from_millis(startup.rebuild_interval_millis))
        .await;

    let mut ticker = time::interval(Duration::from_millis(startup.simulation_tick_millis));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                flip_random_status(&factories);

                let node = controller.pick();
                match node.connect().await {
                    Ok(()) => info!("picked {node} (aperture {})", controller.status()),
                    Err(e) => info!("pick failed: {e}"),
                }
            }
            changed = rebuilds.changed() => {
                if changed.is_err() {
                    break;
                }

                let metadata = Value::Object(controller.current().additional_metadata());
                info!("rebuild #{}: {metadata}", *rebuilds.borrow_and_update());
            }
        }
    }

    stop_controller();

    Ok(())
}
