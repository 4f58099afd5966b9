//! hostpin Hardware Abstraction Layer
//!
//! This crate defines the pin contract and waveform formats that
//! chip-specific drivers (bcm283x, allwinner, am335x, ...) implement and
//! application code consumes. The same application code runs on any board
//! whose drivers implement these traits.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │  Application (hostpin-thermal, etc.)    │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hostpin-core (registry, host init)     │
//! └─────────────────────────────────────────┘
//!                     │
//!                     ▼
//! ┌─────────────────────────────────────────┐
//! │  hostpin-hal (this crate - traits)      │
//! └─────────────────────────────────────────┘
//!                     ▲
//!         ┌───────────┴───────────┐
//! ┌───────────────┐       ┌───────────────┐
//! │ chip drivers  │       │  bus drivers  │
//! └───────────────┘       └───────────────┘
//! ```
//!
//! # Modules
//!
//! - [`level`] - [`Level`] and [`Duty`] values
//! - [`gpio`] - [`Pin`] and its optional capabilities
//! - [`stream`] - [`Bits`], [`BitStream`], [`EdgeStream`], [`Program`]
//! - [`i2c`], [`spi`] - bus boundaries

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod gpio;
pub mod i2c;
pub mod level;
pub mod spi;
pub mod stream;

// Re-export key types at crate root for convenience
pub use gpio::{
    Edge, GpioError, Pin, PinDefaultPull, PinIn, PinOut, PinPwm, PinStreamIn, PinStreamOut, Pull,
    RealPin,
};
pub use i2c::{I2cBus, I2cConfig, I2cPins};
pub use level::{Duty, Level, ParseDutyError, DUTY_MAX};
pub use spi::{Mode, Phase, Polarity, SpiConfig, SpiConn, SpiPins, SpiPort};
pub use stream::{BitOrder, BitStream, Bits, EdgeStream, Program, Stream, StreamError};
