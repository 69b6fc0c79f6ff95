use log::warn;
use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Aperture settings that may change while the process runs.
///
/// The controller queries the provider on every rebuild and never caches the values.
pub trait ApertureConfig: Send + Sync {
    fn min_aperture(&self) -> usize;
    fn init_aperture(&self) -> usize;
    fn deterministic_active(&self) -> bool;
    fn eager_connections(&self) -> bool;
}

fn read_env<T: FromStr>(name: &str, default: T) -> T {
    match env::var(name) {
        Ok(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("ignoring unparsable value '{value}' for {name}");
            default
        }),
        Err(_) => default,
    }
}

macro_rules! define_dynamic_settings {
    ($(($method:ident, $env_name:expr, $type:ty, $default:expr)),* $(,)?) => {
        /// Reads every setting from the environment at call time, falling back to
        /// defaults when a variable is missing or unparsable.
        #[derive(Debug, Default, Clone, Copy)]
        pub struct EnvConfig;

        impl ApertureConfig for EnvConfig {
            $(
                fn $method(&self) -> $type {
                    read_env($env_name, $default)
                }
            )*
        }
    };
}

define_dynamic_settings!(
    (min_aperture, "APERTURE_MIN", usize, 1),
    (init_aperture, "APERTURE_INIT", usize, 1),
    (deterministic_active, "APERTURE_DETERMINISTIC", bool, false),
    (eager_connections, "APERTURE_EAGER_CONNECTIONS", bool, false),
);

/// In-memory settings, adjustable at runtime.
#[derive(Debug)]
pub struct StaticConfig {
    min_aperture: AtomicUsize,
    init_aperture: AtomicUsize,
    deterministic_active: AtomicBool,
    eager_connections: AtomicBool,
}

impl StaticConfig {
    pub fn new(min_aperture: usize, init_aperture: usize) -> Self {
        Self {
            min_aperture: AtomicUsize::new(min_aperture),
            init_aperture: AtomicUsize::new(init_aperture),
            deterministic_active: AtomicBool::new(false),
            eager_connections: AtomicBool::new(false),
        }
    }

    pub fn with_deterministic(self, active: bool) -> Self {
        self.set_deterministic(active);
        self
    }

    pub fn with_eager_connections(self, eager: bool) -> Self {
        self.eager_connections.store(eager, Ordering::Relaxed);
        self
    }

    pub fn set_min_aperture(&self, min_aperture: usize) {
        self.min_aperture.store(min_aperture, Ordering::Relaxed);
    }

    pub fn set_deterministic(&self, active: bool) {
        self.deterministic_active.store(active, Ordering::Relaxed);
    }
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self::new(1, 1)
    }
}

impl ApertureConfig for StaticConfig {
    fn min_aperture(&self) -> usize {
        self.min_aperture.load(Ordering::Relaxed)
    }

    fn init_aperture(&self) -> usize {
        self.init_aperture.load(Ordering::Relaxed)
    }

    fn deterministic_active(&self) -> bool {
        self.deterministic_active.load(Ordering::Relaxed)
    }

    fn eager_connections(&self) -> bool {
        self.eager_connections.load(Ordering::Relaxed)
    }
}
