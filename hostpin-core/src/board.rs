//! Board description
//!
//! A board maps physical header positions and friendly names onto the
//! chip's canonical pins. The layout is loaded from TOML:
//!
//! ```toml
//! name = "example-board"
//! requires = ["sim"]
//!
//! [[header]]
//! name = "P1"
//! pins = ["", "", "GPIO2", "", "GPIO3"]
//!
//! [[alias]]
//! name = "LED"
//! target = "P1_3"
//! ```
//!
//! Each non-empty header entry becomes an alias `<header>_<position>`,
//! counting from 1. Explicit aliases are applied after all headers, so they
//! may target header aliases.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::host::{Driver, DriverError};
use crate::registry::{Registry, RegistryError};

/// Errors loading or applying a board description
#[derive(Debug, Error)]
pub enum BoardError {
    /// Malformed TOML or wrong field types
    #[error("invalid board description: {0}")]
    Parse(#[from] toml::de::Error),
    /// Could not read the description file
    #[error("reading board description: {0}")]
    Io(#[from] std::io::Error),
    /// An alias could not be registered
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

/// One physical header
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderConfig {
    /// Header name, e.g. `P1`
    pub name: String,
    /// Target pin per position; empty for power, ground or unconnected
    #[serde(default)]
    pub pins: Vec<String>,
}

/// Friendly name for a pin
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AliasConfig {
    /// Name to register
    pub name: String,
    /// Pin or alias it points at
    pub target: String,
}

/// Board layout
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Board name, used as the driver name
    pub name: String,
    /// Drivers that must load first, usually the chip driver
    #[serde(default)]
    pub requires: Vec<String>,
    /// Physical headers; TOML `[[header]]`
    #[serde(default)]
    pub header: Vec<HeaderConfig>,
    /// Named aliases; TOML `[[alias]]`
    #[serde(default)]
    pub alias: Vec<AliasConfig>,
}

impl BoardConfig {
    /// Parse a board description
    pub fn from_toml(input: &str) -> Result<Self, BoardError> {
        Ok(toml::from_str(input)?)
    }

    /// Read and parse a board description file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BoardError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading board description");
        let input = std::fs::read_to_string(path)?;
        Self::from_toml(&input)
    }

    /// Register header and explicit aliases; returns how many were added
    ///
    /// Stops at the first alias that fails. Aliases registered before the
    /// failure stay registered.
    pub fn apply(&self, registry: &mut Registry) -> Result<usize, BoardError> {
        let mut count = 0;
        for header in &self.header {
            for (index, target) in header.pins.iter().enumerate() {
                if target.is_empty() {
                    continue;
                }
                let alias = format!("{}_{}", header.name, index + 1);
                registry.register_alias(&alias, target)?;
                count += 1;
            }
        }
        for alias in &self.alias {
            registry.register_alias(&alias.name, &alias.target)?;
            count += 1;
        }
        info!(board = %self.name, aliases = count, "board applied");
        Ok(count)
    }
}

/// Host driver applying a [`BoardConfig`]
#[derive(Debug, Clone)]
pub struct BoardDriver {
    config: BoardConfig,
}

impl BoardDriver {
    /// Driver registering the aliases of `config`
    pub fn new(config: BoardConfig) -> Self {
        Self { config }
    }

    /// Board layout applied at init
    pub fn config(&self) -> &BoardConfig {
        &self.config
    }
}

impl Driver for BoardDriver {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn prerequisites(&self) -> Vec<&str> {
        self.config.requires.iter().map(String::as_str).collect()
    }

    fn init(&mut self, registry: &mut Registry) -> Result<bool, DriverError> {
        self.config.apply(registry)?;
        Ok(true)
    }
}
