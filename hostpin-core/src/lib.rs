//! Host-side pin management for hostpin
//!
//! This crate holds everything that needs `std` but no particular chip:
//!
//! - Pin registry with aliases
//! - Host initialisation and driver ordering
//! - Board descriptions loaded from TOML
//! - Simulated pins for tests and dry runs
//! - Environmental sensor boundary

#![deny(unsafe_code)]

pub mod board;
pub mod devices;
pub mod host;
pub mod registry;
pub mod sim;

pub use board::{BoardConfig, BoardDriver, BoardError};
pub use devices::{Celsius, Environment, Pascal, RelativeHumidity, Sensor, SensorError};
pub use host::{Driver, DriverError, DriverFailure, HostError, Loader, State};
pub use registry::{PinAlias, Registry, RegistryError};
pub use sim::{SimCaps, SimDriver, SimPin};
