use anyhow::{Context, Result};
use aperture::Coordinate;
use std::any::type_name;
use std::env;
use std::str::FromStr;

fn parse_var<T>(name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let value =
        env::var(name).with_context(|| format!("missing required environment variable {name}"))?;

    value.trim().parse().with_context(|| {
        format!(
            "failed to parse environment variable {name} with value '{value}' as {}",
            type_name::<T>()
        )
    })
}

macro_rules! define_env_vars {
    ($(($field:ident, $env_name:expr, $type:ty)),* $(,)?) => {
        /// Settings read once at startup.
        #[derive(Debug, Clone)]
        pub struct StartupEnv {
            $(pub $field: $type,)*
        }

        impl StartupEnv {
            /// Reads every variable, failing on the first missing or unparsable one.
            /// Call this early in main() so a bad deployment stops before any work starts.
            pub fn load() -> Result<Self> {
                Ok(Self {
                    $($field: parse_var($env_name)?,)*
                })
            }
        }
    };
}

define_env_vars!(
    (node_addresses, "NODE_ADDRESSES", String),
    (rebuild_interval_millis, "REBUILD_INTERVAL_MILLIS", u64),
    (simulation_tick_millis, "SIMULATION_TICK_MILLIS", u64),
);

/// Optional ring coordinate, `offset/total_units`.
pub fn coordinate() -> Result<Option<Coordinate>> {
    match env::var("APERTURE_COORDINATE") {
        Ok(value) => Ok(Some(value.parse()?)),
        Err(_) => Ok(None),
    }
}

pub fn parse_node_addresses(addresses: &str) -> Vec<String> {
    addresses
        .split(',')
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .map(str::to_string)
        .collect()
}
