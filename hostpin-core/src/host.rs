//! Host initialisation
//!
//! Chip and board drivers register themselves with [`register_driver`]
//! before first use. [`init`] then runs every driver once, in prerequisite
//! order, each driver adding its pins to one [`Registry`]. The registry is
//! frozen afterwards and served read-only by [`by_name`], [`all`] and
//! [`aliases`].
//!
//! ```text
//!  register_driver(a) ─┐
//!  register_driver(b) ─┼─► init() ──► Loader::run ──► HOST (OnceLock)
//!  register_driver(c) ─┘     │                          │
//!                            └── idempotent ◄───────────┘
//! ```
//!
//! [`Loader`] holds the same logic without global state, for tests and for
//! embedding several independent hosts in one process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use hostpin_hal::Pin;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::Registry;

/// Error returned by a driver's `init`
pub type DriverError = Box<dyn std::error::Error + Send + Sync>;

/// Chip or board driver
pub trait Driver: Send {
    /// Unique driver name
    fn name(&self) -> &str;

    /// Names of drivers that must load before this one
    fn prerequisites(&self) -> Vec<&str> {
        Vec::new()
    }

    /// Register this driver's pins
    ///
    /// Returns `Ok(false)` when the driver does not apply to this host (the
    /// chip is absent, for instance); the driver is then reported skipped.
    fn init(&mut self, registry: &mut Registry) -> Result<bool, DriverError>;
}

/// Errors from driver registration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HostError {
    /// Driver registered after [`init`] ran
    #[error("driver {0:?} registered after host initialisation")]
    AlreadyInitialized(String),
    /// Two drivers share a name
    #[error("driver {0:?} is already registered")]
    DuplicateDriver(String),
}

/// Why a driver did not load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverFailure {
    /// Driver name
    pub name: String,
    /// Human readable reason
    pub reason: String,
}

/// Outcome of host initialisation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct State {
    /// Drivers that loaded, in load order
    pub loaded: Vec<String>,
    /// Drivers not applicable to this host, or whose prerequisites did not
    /// load
    pub skipped: Vec<DriverFailure>,
    /// Drivers that returned an error or could not be ordered
    pub failed: Vec<DriverFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Loaded,
    Skipped,
    Failed,
}

/// Runs a set of drivers into a fresh registry
#[derive(Default)]
pub struct Loader {
    drivers: Vec<Box<dyn Driver>>,
}

impl Loader {
    /// Create a loader with no drivers
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a loader for `drivers`
    ///
    /// A driver whose name is already taken by an earlier one is dropped.
    pub fn from_drivers(drivers: Vec<Box<dyn Driver>>) -> Self {
        let mut loader = Self::new();
        for driver in drivers {
            if loader.drivers.iter().any(|d| d.name() == driver.name()) {
                warn!(driver = driver.name(), "duplicate driver dropped");
                continue;
            }
            loader.drivers.push(driver);
        }
        loader
    }

    /// Add a driver; names must be unique
    pub fn add(&mut self, driver: Box<dyn Driver>) -> Result<(), HostError> {
        if self.drivers.iter().any(|d| d.name() == driver.name()) {
            return Err(HostError::DuplicateDriver(driver.name().to_owned()));
        }
        self.drivers.push(driver);
        Ok(())
    }

    /// Run every driver once, prerequisites first
    ///
    /// Drivers with all prerequisites resolved run in registration order. A
    /// driver whose prerequisite was skipped or failed is skipped; a driver
    /// naming an unknown prerequisite, or caught in a prerequisite cycle,
    /// fails.
    pub fn run(self) -> (Registry, State) {
        let mut registry = Registry::new();
        let mut state = State::default();
        let mut outcomes: HashMap<String, Outcome> = HashMap::new();

        let names: Vec<String> = self.drivers.iter().map(|d| d.name().to_owned()).collect();
        let mut pending: Vec<Box<dyn Driver>> = Vec::new();
        for driver in self.drivers {
            let unknown = driver
                .prerequisites()
                .into_iter()
                .find(|p| !names.iter().any(|n| n == p))
                .map(str::to_owned);
            match unknown {
                Some(prereq) => {
                    let name = driver.name().to_owned();
                    warn!(driver = %name, prereq = %prereq, "unknown prerequisite");
                    outcomes.insert(name.clone(), Outcome::Failed);
                    state.failed.push(DriverFailure {
                        name,
                        reason: format!("unknown prerequisite {:?}", prereq),
                    });
                }
                None => pending.push(driver),
            }
        }

        loop {
            let ready = pending.iter().position(|d| {
                d.prerequisites()
                    .iter()
                    .all(|p| outcomes.contains_key(*p))
            });
            let Some(index) = ready else { break };
            let mut driver = pending.remove(index);
            let name = driver.name().to_owned();

            let blocked = driver
                .prerequisites()
                .into_iter()
                .find(|p| outcomes.get(*p) != Some(&Outcome::Loaded))
                .map(str::to_owned);
            let outcome = if let Some(prereq) = blocked {
                debug!(driver = %name, prereq = %prereq, "prerequisite not loaded");
                state.skipped.push(DriverFailure {
                    name: name.clone(),
                    reason: format!("prerequisite {:?} not loaded", prereq),
                });
                Outcome::Skipped
            } else {
                match driver.init(&mut registry) {
                    Ok(true) => {
                        info!(driver = %name, "loaded");
                        state.loaded.push(name.clone());
                        Outcome::Loaded
                    }
                    Ok(false) => {
                        debug!(driver = %name, "not applicable");
                        state.skipped.push(DriverFailure {
                            name: name.clone(),
                            reason: String::from("not applicable to this host"),
                        });
                        Outcome::Skipped
                    }
                    Err(err) => {
                        warn!(driver = %name, error = %err, "failed");
                        state.failed.push(DriverFailure {
                            name: name.clone(),
                            reason: err.to_string(),
                        });
                        Outcome::Failed
                    }
                }
            };
            outcomes.insert(name, outcome);
        }

        // Whatever is left waits on itself through a cycle
        for driver in pending {
            warn!(driver = driver.name(), "prerequisite cycle");
            state.failed.push(DriverFailure {
                name: driver.name().to_owned(),
                reason: String::from("prerequisite cycle"),
            });
        }

        (registry, state)
    }
}

struct Host {
    registry: Registry,
    state: State,
}

static PENDING: Mutex<Vec<Box<dyn Driver>>> = Mutex::new(Vec::new());
static HOST: OnceLock<Host> = OnceLock::new();

/// Register a driver to run at [`init`]
pub fn register_driver(driver: Box<dyn Driver>) -> Result<(), HostError> {
    // init holds this lock until HOST is set
    let mut pending = PENDING.lock().unwrap_or_else(PoisonError::into_inner);
    if HOST.get().is_some() {
        return Err(HostError::AlreadyInitialized(driver.name().to_owned()));
    }
    if pending.iter().any(|d| d.name() == driver.name()) {
        return Err(HostError::DuplicateDriver(driver.name().to_owned()));
    }
    pending.push(driver);
    Ok(())
}

/// Run all registered drivers, once
///
/// Later calls return the state of the first call without running anything.
pub fn init() -> &'static State {
    let mut pending = PENDING.lock().unwrap_or_else(PoisonError::into_inner);
    let host = HOST.get_or_init(|| {
        let (registry, state) = Loader::from_drivers(pending.drain(..).collect()).run();
        info!(
            loaded = state.loaded.len(),
            skipped = state.skipped.len(),
            failed = state.failed.len(),
            pins = registry.len(),
            "host initialised"
        );
        Host { registry, state }
    });
    &host.state
}

/// Frozen registry, if [`init`] has run
pub fn registry() -> Option<&'static Registry> {
    HOST.get().map(|host| &host.registry)
}

/// Look up a pin or alias by name
///
/// `None` if there is no such pin or [`init`] has not run.
pub fn by_name(name: &str) -> Option<Arc<dyn Pin>> {
    registry()?.by_name(name)
}

/// Canonical pins, ordered by number then name
pub fn all() -> Vec<Arc<dyn Pin>> {
    registry().map(Registry::all).unwrap_or_default()
}

/// Aliases, ordered by name
pub fn aliases() -> Vec<Arc<dyn Pin>> {
    registry().map(Registry::aliases).unwrap_or_default()
}
