//! SPI bus boundary
//!
//! Bus implementations live outside this crate. A [`SpiPort`] hands out a
//! [`SpiConn`] configured by a [`SpiConfig`]; ports whose lines are GPIO
//! pins also implement [`SpiPins`].

use alloc::sync::Arc;

use crate::gpio::Pin;
use crate::level::Level;

/// Connection to one SPI device
pub trait SpiConn {
    /// Error type for SPI operations
    type Error;

    /// Full-duplex transfer
    ///
    /// Writes `w` while reading into `r`. Both buffers must be the same
    /// length, or one of them empty for half-duplex.
    fn tx(&mut self, w: &[u8], r: &mut [u8]) -> Result<(), Self::Error>;

    /// Write data without reading
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.tx(data, &mut [])
    }
}

/// SPI port that opens connections to devices
pub trait SpiPort {
    /// Connection handed out by [`SpiPort::connect`]
    type Conn: SpiConn;
    /// Error type for rejected configurations
    type Error;

    /// Open a connection with `config`
    ///
    /// Fails if the port cannot realise the frequency, mode or word size.
    fn connect(&mut self, config: SpiConfig) -> Result<Self::Conn, Self::Error>;
}

/// SPI bus whose lines are GPIO pins
pub trait SpiPins {
    /// Clock line
    fn clk(&self) -> Option<Arc<dyn Pin>>;

    /// Controller out, peripheral in
    fn mosi(&self) -> Option<Arc<dyn Pin>>;

    /// Controller in, peripheral out
    fn miso(&self) -> Option<Arc<dyn Pin>>;

    /// Chip select
    fn cs(&self) -> Option<Arc<dyn Pin>>;
}

/// SPI configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SpiConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
    /// Clock polarity and phase
    pub mode: Mode,
    /// Bits per word
    pub bits: u8,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency: 1_000_000, // 1 MHz
            mode: Mode::Mode0,
            bits: 8,
        }
    }
}

/// SPI clock polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// Clock idles low (CPOL=0)
    IdleLow,
    /// Clock idles high (CPOL=1)
    IdleHigh,
}

/// SPI clock phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Phase {
    /// Data captured on first clock transition (CPHA=0)
    CaptureOnFirstTransition,
    /// Data captured on second clock transition (CPHA=1)
    CaptureOnSecondTransition,
}

/// SPI mode (combined polarity and phase)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Mode {
    /// Mode 0: CPOL=0, CPHA=0
    Mode0,
    /// Mode 1: CPOL=0, CPHA=1
    Mode1,
    /// Mode 2: CPOL=1, CPHA=0
    Mode2,
    /// Mode 3: CPOL=1, CPHA=1
    Mode3,
}

impl Mode {
    /// Idle level of the clock line in this mode
    pub fn idle_clock(self) -> Level {
        let (polarity, _): (Polarity, Phase) = self.into();
        match polarity {
            Polarity::IdleLow => Level::Low,
            Polarity::IdleHigh => Level::High,
        }
    }
}

impl From<Mode> for (Polarity, Phase) {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Mode0 => (Polarity::IdleLow, Phase::CaptureOnFirstTransition),
            Mode::Mode1 => (Polarity::IdleLow, Phase::CaptureOnSecondTransition),
            Mode::Mode2 => (Polarity::IdleHigh, Phase::CaptureOnFirstTransition),
            Mode::Mode3 => (Polarity::IdleHigh, Phase::CaptureOnSecondTransition),
        }
    }
}
