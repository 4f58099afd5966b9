//! I²C bus boundary
//!
//! Bus implementations (sysfs `/dev/i2c-*`, bit-banged GPIO, chip
//! controllers) live outside this crate. They implement [`I2cBus`] and,
//! when the lines are GPIO pins, [`I2cPins`].

use alloc::sync::Arc;

use crate::gpio::Pin;

/// I²C bus master
pub trait I2cBus {
    /// Error type for I²C operations
    type Error;

    /// Write `w` then read into `r` as one transaction (repeated start)
    ///
    /// Either buffer may be empty.
    ///
    /// # Arguments
    /// * `addr` - 7 or 10-bit device address
    fn tx(&mut self, addr: u16, w: &[u8], r: &mut [u8]) -> Result<(), Self::Error>;

    /// Apply `config`, e.g. [`I2cConfig::FAST`]
    fn configure(&mut self, config: I2cConfig) -> Result<(), Self::Error>;

    /// Write data to a device
    fn write(&mut self, addr: u16, data: &[u8]) -> Result<(), Self::Error> {
        self.tx(addr, data, &mut [])
    }

    /// Read data from a device
    fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.tx(addr, &[], buf)
    }
}

/// I²C bus whose lines are GPIO pins
pub trait I2cPins {
    /// Clock line
    fn scl(&self) -> Option<Arc<dyn Pin>>;

    /// Data line
    fn sda(&self) -> Option<Arc<dyn Pin>>;
}

/// I²C configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct I2cConfig {
    /// Clock frequency in Hz
    pub frequency: u32,
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self::STANDARD
    }
}

impl I2cConfig {
    /// Standard mode (100 kHz)
    pub const STANDARD: Self = Self { frequency: 100_000 };

    /// Fast mode (400 kHz)
    pub const FAST: Self = Self { frequency: 400_000 };

    /// Fast mode plus (1 MHz)
    pub const FAST_PLUS: Self = Self {
        frequency: 1_000_000,
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records the last transaction
    #[derive(Default)]
    struct MockBus {
        last: Option<(u16, Vec<u8>, usize)>,
        config: I2cConfig,
    }

    impl I2cBus for MockBus {
        type Error = ();

        fn tx(&mut self, addr: u16, w: &[u8], r: &mut [u8]) -> Result<(), ()> {
            r.fill(0x5A);
            self.last = Some((addr, w.to_vec(), r.len()));
            Ok(())
        }

        fn configure(&mut self, config: I2cConfig) -> Result<(), ()> {
            // Nothing on this bus goes past fast mode plus
            if config.frequency > I2cConfig::FAST_PLUS.frequency {
                return Err(());
            }
            self.config = config;
            Ok(())
        }
    }

    #[test]
    fn test_write_and_read_use_tx() {
        let mut bus = MockBus::default();

        bus.write(0x76, &[0xD0]).unwrap();
        assert_eq!(bus.last, Some((0x76, vec![0xD0], 0)));

        let mut buf = [0u8; 2];
        bus.read(0x76, &mut buf).unwrap();
        assert_eq!(buf, [0x5A, 0x5A]);
        assert_eq!(bus.last, Some((0x76, vec![], 2)));
    }

    #[test]
    fn test_configure() {
        let mut bus = MockBus::default();
        assert_eq!(bus.config, I2cConfig::STANDARD);

        bus.configure(I2cConfig::FAST).unwrap();
        assert_eq!(bus.config.frequency, 400_000);
        bus.configure(I2cConfig::FAST_PLUS).unwrap();
        assert!(bus.configure(I2cConfig { frequency: 3_400_000 }).is_err());
        assert_eq!(bus.config, I2cConfig::FAST_PLUS);
    }
}
