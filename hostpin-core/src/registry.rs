//! Name-keyed pin registry
//!
//! Maps pin names to implementations. Canonical pins register under their own
//! [`Pin::name`]; aliases register under an alternate name and forward to a
//! canonical pin. Alias chains are flattened on registration, so every alias
//! points directly at a canonical pin and [`RealPin::real`] is a single hop.
//!
//! A registry is built once (by the host drivers) and then only read. All
//! lookups take `&self` and the registry is `Send + Sync`.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hostpin_hal::gpio::{Edge, GpioError, Pin, PinDefaultPull, PinIn, PinOut, Pull, RealPin};
use hostpin_hal::Level;
use thiserror::Error;
use tracing::debug;

/// Errors raised while populating a registry
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// Pin or alias name is empty
    #[error("pin name is empty")]
    EmptyName,
    /// Name already taken by another pin or alias
    #[error("pin name {0:?} is already registered")]
    Conflict(String),
    /// Two canonical pins claim the same number
    #[error("pin {name:?} has number {number} already used by {existing:?}")]
    NumberConflict {
        name: String,
        number: u32,
        existing: String,
    },
    /// Alias passed to [`Registry::register`]
    #[error("pin {0:?} is an alias; use register_alias")]
    NotCanonical(String),
    /// Alias target is not registered
    #[error("alias {alias:?} targets unknown pin {target:?}")]
    UnknownTarget { alias: String, target: String },
    /// Alias would resolve to itself
    #[error("alias {0:?} refers to itself")]
    Cycle(String),
}

/// Pin name → implementation table
#[derive(Default)]
pub struct Registry {
    pins: BTreeMap<String, Arc<dyn Pin>>,
    aliases: BTreeMap<String, Arc<PinAlias>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a canonical pin under its own name
    pub fn register(&mut self, pin: Arc<dyn Pin>) -> Result<(), RegistryError> {
        let name = pin.name();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if pin.as_real().is_some() {
            return Err(RegistryError::NotCanonical(name.to_owned()));
        }
        self.check_free(name)?;
        if let Some(number) = pin.number() {
            if let Some(existing) = self.pins.values().find(|p| p.number() == Some(number)) {
                return Err(RegistryError::NumberConflict {
                    name: name.to_owned(),
                    number,
                    existing: existing.name().to_owned(),
                });
            }
        }

        debug!(pin = name, number = ?pin.number(), "registered pin");
        self.pins.insert(name.to_owned(), pin);
        Ok(())
    }

    /// Register `alias` as another name for `target`
    ///
    /// `target` may itself be an alias; the new alias then points at the
    /// canonical pin behind it.
    pub fn register_alias(&mut self, alias: &str, target: &str) -> Result<(), RegistryError> {
        if alias.is_empty() || target.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if alias == target {
            return Err(RegistryError::Cycle(alias.to_owned()));
        }
        self.check_free(alias)?;

        let real = match (self.pins.get(target), self.aliases.get(target)) {
            (Some(pin), _) => Arc::clone(pin),
            (None, Some(other)) => other.real(),
            (None, None) => {
                return Err(RegistryError::UnknownTarget {
                    alias: alias.to_owned(),
                    target: target.to_owned(),
                })
            }
        };
        // Targets must already exist and names are unique, so the only way
        // back to `alias` would be through `real` itself
        if real.name() == alias {
            return Err(RegistryError::Cycle(alias.to_owned()));
        }

        debug!(alias, target = real.name(), "registered alias");
        self.aliases
            .insert(alias.to_owned(), Arc::new(PinAlias::new(alias, real)));
        Ok(())
    }

    fn check_free(&self, name: &str) -> Result<(), RegistryError> {
        if self.pins.contains_key(name) || self.aliases.contains_key(name) {
            return Err(RegistryError::Conflict(name.to_owned()));
        }
        Ok(())
    }

    /// Look up a pin or alias by exact name
    ///
    /// `None` means no such pin; it is not an error.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Pin>> {
        if let Some(pin) = self.pins.get(name) {
            return Some(Arc::clone(pin));
        }
        self.aliases
            .get(name)
            .map(|alias| Arc::clone(alias) as Arc<dyn Pin>)
    }

    /// Canonical pins, ordered by number then name
    pub fn all(&self) -> Vec<Arc<dyn Pin>> {
        let mut pins: Vec<_> = self.pins.values().cloned().collect();
        // Unnumbered pins sort last
        pins.sort_by(|a, b| {
            let key = |p: &Arc<dyn Pin>| (p.number().is_none(), p.number());
            key(a).cmp(&key(b)).then_with(|| a.name().cmp(b.name()))
        });
        pins
    }

    /// Aliases, ordered by name
    pub fn aliases(&self) -> Vec<Arc<dyn Pin>> {
        self.aliases
            .values()
            .map(|alias| Arc::clone(alias) as Arc<dyn Pin>)
            .collect()
    }

    /// Number of pins and aliases
    pub fn len(&self) -> usize {
        self.pins.len() + self.aliases.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("pins", &self.pins.keys().collect::<Vec<_>>())
            .field("aliases", &self.aliases.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Alternate name for a canonical pin
///
/// Forwards identity, input and output to the real pin. PWM and streaming
/// are not forwarded; resolve with [`RealPin::real`] first.
pub struct PinAlias {
    name: String,
    real: Arc<dyn Pin>,
}

impl PinAlias {
    fn new(name: &str, real: Arc<dyn Pin>) -> Self {
        Self {
            name: name.to_owned(),
            real,
        }
    }
}

impl Pin for PinAlias {
    fn name(&self) -> &str {
        &self.name
    }

    fn number(&self) -> Option<u32> {
        self.real.number()
    }

    fn function(&self) -> String {
        self.real.function()
    }

    fn read(&self) -> Level {
        self.real.read()
    }

    fn as_in(&self) -> Option<&dyn PinIn> {
        self.real.as_in().map(|_| self as &dyn PinIn)
    }

    fn as_out(&self) -> Option<&dyn PinOut> {
        self.real.as_out().map(|_| self as &dyn PinOut)
    }

    fn as_real(&self) -> Option<&dyn RealPin> {
        Some(self)
    }

    fn as_default_pull(&self) -> Option<&dyn PinDefaultPull> {
        self.real.as_default_pull().map(|_| self as &dyn PinDefaultPull)
    }
}

impl RealPin for PinAlias {
    fn real(&self) -> Arc<dyn Pin> {
        Arc::clone(&self.real)
    }
}

impl PinIn for PinAlias {
    fn set_in(&self, pull: Pull, edge: Edge) -> Result<(), GpioError> {
        hostpin_hal::gpio::set_in(&*self.real, pull, edge)
    }

    fn wait_for_edge(&self, timeout: Option<Duration>) -> bool {
        self.real
            .as_in()
            .is_some_and(|pin| pin.wait_for_edge(timeout))
    }

    fn pull(&self) -> Pull {
        self.real.as_in().map_or(Pull::NoChange, |pin| pin.pull())
    }
}

impl PinOut for PinAlias {
    fn set_out(&self, level: Level) -> Result<(), GpioError> {
        hostpin_hal::gpio::set_out(&*self.real, level)
    }
}

impl PinDefaultPull for PinAlias {
    fn default_pull(&self) -> Pull {
        self.real
            .as_default_pull()
            .map_or(Pull::NoChange, |pin| pin.default_pull())
    }
}
