//! GPIO pin abstractions
//!
//! A pin is a [`Pin`] plus any subset of optional capabilities. Callers probe
//! for a capability with the `as_*` accessors, which never touch hardware,
//! and get `None` when the pin lacks it:
//!
//! ```text
//! Pin ──┬─ as_in()           -> PinIn          (pull, edge, wait_for_edge)
//!       ├─ as_out()          -> PinOut         (drive level)
//!       ├─ as_pwm()          -> PinPwm         (duty, frequency)
//!       ├─ as_stream_in()    -> PinStreamIn    (capture a BitStream)
//!       ├─ as_stream_out()   -> PinStreamOut   (play a Program)
//!       ├─ as_real()         -> RealPin        (alias resolution)
//!       └─ as_default_pull() -> PinDefaultPull
//! ```
//!
//! All capability methods take `&self`; implementations keep their
//! bookkeeping behind interior mutability so a pin can be shared through an
//! `Arc<dyn Pin>`.

use alloc::string::String;
use alloc::sync::Arc;
use core::fmt;
use core::time::Duration;

use crate::level::{Duty, Level};
use crate::stream::{BitStream, Program, StreamError};

/// Pull resistor configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Pull {
    /// No pull resistor
    Float,
    /// Pull down to ground
    Down,
    /// Pull up to VCC
    Up,
    /// Keep the current configuration
    #[default]
    NoChange,
}

impl fmt::Display for Pull {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Pull::Float => "Float",
            Pull::Down => "PullDown",
            Pull::Up => "PullUp",
            Pull::NoChange => "PullNoChange",
        })
    }
}

/// Edge detection trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    /// Edge detection disabled
    #[default]
    None,
    /// Low to high transition
    Rising,
    /// High to low transition
    Falling,
    /// Any transition
    Both,
}

impl Edge {
    /// Check if a transition from `from` to `to` triggers this edge
    pub fn matches(self, from: Level, to: Level) -> bool {
        match self {
            Edge::None => false,
            Edge::Rising => from == Level::Low && to == Level::High,
            Edge::Falling => from == Level::High && to == Level::Low,
            Edge::Both => from != to,
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Edge::None => "NoEdge",
            Edge::Rising => "RisingEdge",
            Edge::Falling => "FallingEdge",
            Edge::Both => "BothEdges",
        })
    }
}

/// Errors that can occur with pin operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum GpioError {
    /// Pin does not implement the requested capability
    UnsupportedCapability,
    /// Pull/edge combination not realizable on this pin
    UnsupportedConfiguration,
    /// PWM frequency not realizable on this pin
    UnsupportedFrequency,
    /// PWM duty cycle not realizable on this pin
    UnsupportedDuty,
    /// Streaming program rejected by this pin
    InvalidProgram(StreamError),
    /// Underlying hardware access failed
    Hardware,
}

impl From<StreamError> for GpioError {
    fn from(err: StreamError) -> Self {
        GpioError::InvalidProgram(err)
    }
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::UnsupportedCapability => f.write_str("unsupported capability"),
            GpioError::UnsupportedConfiguration => f.write_str("unsupported configuration"),
            GpioError::UnsupportedFrequency => f.write_str("unsupported frequency"),
            GpioError::UnsupportedDuty => f.write_str("unsupported duty"),
            GpioError::InvalidProgram(err) => write!(f, "invalid program: {}", err),
            GpioError::Hardware => f.write_str("hardware access failed"),
        }
    }
}

/// Identity and level of a GPIO pin, plus capability probes
///
/// Implementations should override the `as_*` accessor for each capability
/// they support. Accessors must not have side effects.
pub trait Pin: Send + Sync {
    /// Stable display name (e.g. `"GPIO2"`, `"P1_3"`)
    fn name(&self) -> &str;

    /// Chip-relative pin number, if the pin has one
    fn number(&self) -> Option<u32> {
        None
    }

    /// Current function as human readable text (e.g. `"In/High"`)
    fn function(&self) -> String;

    /// Read the current level, regardless of direction
    fn read(&self) -> Level;

    /// Input configuration and edge wait
    fn as_in(&self) -> Option<&dyn PinIn> {
        None
    }

    /// Output drive
    fn as_out(&self) -> Option<&dyn PinOut> {
        None
    }

    /// PWM generation
    fn as_pwm(&self) -> Option<&dyn PinPwm> {
        None
    }

    /// Bit stream capture
    fn as_stream_in(&self) -> Option<&dyn PinStreamIn> {
        None
    }

    /// Program playback
    fn as_stream_out(&self) -> Option<&dyn PinStreamOut> {
        None
    }

    /// Alias resolution, present only on aliases
    fn as_real(&self) -> Option<&dyn RealPin> {
        None
    }

    /// Default pull reporting
    fn as_default_pull(&self) -> Option<&dyn PinDefaultPull> {
        None
    }
}

impl fmt::Display for dyn Pin + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

impl fmt::Debug for dyn Pin + '_ {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pin")
            .field("name", &self.name())
            .field("number", &self.number())
            .finish()
    }
}

/// Digital input pin
pub trait PinIn {
    /// Configure as input with the given pull and edge trigger
    fn set_in(&self, pull: Pull, edge: Edge) -> Result<(), GpioError>;

    /// Block until the configured edge occurs or `timeout` elapses
    ///
    /// `None` waits forever. Returns `false` on timeout.
    fn wait_for_edge(&self, timeout: Option<Duration>) -> bool;

    /// Currently configured pull
    fn pull(&self) -> Pull;
}

/// Digital output pin
pub trait PinOut {
    /// Drive the pin to `level` immediately
    fn set_out(&self, level: Level) -> Result<(), GpioError>;

    /// Drive the pin high (logic 1)
    fn set_high(&self) -> Result<(), GpioError> {
        self.set_out(Level::High)
    }

    /// Drive the pin low (logic 0)
    fn set_low(&self) -> Result<(), GpioError> {
        self.set_out(Level::Low)
    }
}

/// Pin that can generate PWM
pub trait PinPwm {
    /// Start continuous PWM at `duty` and `freq_hz`
    ///
    /// Supersedes any output configuration until changed.
    fn pwm(&self, duty: Duty, freq_hz: u32) -> Result<(), GpioError>;
}

/// Pin that can capture a bit stream
pub trait PinStreamIn {
    /// Sample at `stream.res` until `stream.bits` is full
    fn stream_in(&self, pull: Pull, stream: &mut BitStream) -> Result<(), GpioError>;
}

/// Pin that can play back a program
pub trait PinStreamOut {
    /// Play every part of `program` in order, repeated `program.loops` times
    fn stream_out(&self, program: &Program) -> Result<(), GpioError>;
}

/// Alias pin that forwards to a real pin
pub trait RealPin {
    /// The canonical pin; never another alias
    fn real(&self) -> Arc<dyn Pin>;
}

/// Pin that reports its power-on pull
pub trait PinDefaultPull {
    /// Pull resistor configured at reset
    fn default_pull(&self) -> Pull;
}

/// Resolve `pin` to its canonical pin
///
/// Returns `pin` itself when it is not an alias.
pub fn real(pin: &Arc<dyn Pin>) -> Arc<dyn Pin> {
    match pin.as_real() {
        Some(alias) => alias.real(),
        None => Arc::clone(pin),
    }
}

/// Configure `pin` as input
pub fn set_in(pin: &dyn Pin, pull: Pull, edge: Edge) -> Result<(), GpioError> {
    pin.as_in()
        .ok_or(GpioError::UnsupportedCapability)?
        .set_in(pull, edge)
}

/// Wait for an edge on `pin`
pub fn wait_for_edge(pin: &dyn Pin, timeout: Option<Duration>) -> Result<bool, GpioError> {
    Ok(pin
        .as_in()
        .ok_or(GpioError::UnsupportedCapability)?
        .wait_for_edge(timeout))
}

/// Drive `pin` to `level`
pub fn set_out(pin: &dyn Pin, level: Level) -> Result<(), GpioError> {
    pin.as_out()
        .ok_or(GpioError::UnsupportedCapability)?
        .set_out(level)
}

/// Start PWM on `pin`
pub fn pwm(pin: &dyn Pin, duty: Duty, freq_hz: u32) -> Result<(), GpioError> {
    pin.as_pwm()
        .ok_or(GpioError::UnsupportedCapability)?
        .pwm(duty, freq_hz)
}

/// Capture `stream` from `pin`
pub fn stream_in(pin: &dyn Pin, pull: Pull, stream: &mut BitStream) -> Result<(), GpioError> {
    pin.as_stream_in()
        .ok_or(GpioError::UnsupportedCapability)?
        .stream_in(pull, stream)
}

/// Play `program` on `pin`
pub fn stream_out(pin: &dyn Pin, program: &Program) -> Result<(), GpioError> {
    pin.as_stream_out()
        .ok_or(GpioError::UnsupportedCapability)?
        .stream_out(program)
}
