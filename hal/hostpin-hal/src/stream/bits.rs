//! Packed bit sequences
//!
//! [`Bits`] stores one sample per bit. Bit order inside a byte is not part of
//! the buffer; it is supplied by the caller (usually from the owning
//! [`BitStream`]) and must be the same for every access to a given stream.
//!
//! The logical length is tracked separately from the byte count. When it is
//! not a multiple of 8 the unused bits of the final byte are padding: every
//! constructor leaves them Low, and decoding ignores them. Drivers writing
//! through [`Bits::as_bytes_mut`] may leave padding set; it is still never
//! decoded.

use alloc::vec::Vec;
use core::time::Duration;

use super::edge::mul_ticks;
use super::{BitOrder, StreamError};
use crate::level::Level;

/// Packed sequence of levels
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bits {
    bytes: Vec<u8>,
    len: usize,
}

impl Bits {
    /// Create an empty sequence
    pub const fn new() -> Self {
        Self {
            bytes: Vec::new(),
            len: 0,
        }
    }

    /// Create `len` Low samples, e.g. as a capture buffer
    pub fn zeroed(len: usize) -> Self {
        Self {
            bytes: alloc::vec![0; len.div_ceil(8)],
            len,
        }
    }

    /// Wrap raw bytes; every bit is a sample
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let len = bytes.len() * 8;
        Self { bytes, len }
    }

    /// Wrap raw bytes holding `len` samples packed with `order`
    ///
    /// Fails unless `bytes` has exactly `ceil(len / 8)` bytes. Padding bits
    /// past `len` are cleared.
    pub fn from_bytes_with_len(
        bytes: Vec<u8>,
        len: usize,
        order: BitOrder,
    ) -> Result<Self, StreamError> {
        if bytes.len() != len.div_ceil(8) {
            return Err(StreamError::LengthMismatch);
        }
        let mut bits = Self { bytes, len };
        let used = len % 8;
        if let (true, Some(last)) = (used != 0, bits.bytes.last_mut()) {
            for bit in used..8 {
                *last &= !order.mask(bit);
            }
        }
        Ok(bits)
    }

    /// Pack `levels` into bytes using `order`
    pub fn pack<I>(levels: I, order: BitOrder) -> Self
    where
        I: IntoIterator<Item = Level>,
    {
        let mut bits = Self::new();
        for level in levels {
            bits.push(level, order);
        }
        bits
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if there are no samples
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed bytes, including padding in the final byte
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Mutable packed bytes for drivers filling a capture buffer
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume into the packed bytes
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// Sample at `index`
    pub fn get(&self, index: usize, order: BitOrder) -> Option<Level> {
        if index >= self.len {
            return None;
        }
        let mask = order.mask(index % 8);
        Some(Level::from(self.bytes[index / 8] & mask != 0))
    }

    /// Overwrite the sample at `index`
    ///
    /// Returns `false` if `index` is out of range.
    pub fn set(&mut self, index: usize, level: Level, order: BitOrder) -> bool {
        if index >= self.len {
            return false;
        }
        let mask = order.mask(index % 8);
        let byte = &mut self.bytes[index / 8];
        if level.is_high() {
            *byte |= mask;
        } else {
            *byte &= !mask;
        }
        true
    }

    /// Append a sample
    pub fn push(&mut self, level: Level, order: BitOrder) {
        if self.len % 8 == 0 {
            self.bytes.push(0);
        }
        self.len += 1;
        self.set(self.len - 1, level, order);
    }

    /// Iterate the samples using `order`
    pub fn levels(&self, order: BitOrder) -> Levels<'_> {
        Levels {
            bits: self,
            order,
            index: 0,
        }
    }
}

/// Iterator over the samples of a [`Bits`]
#[derive(Debug, Clone)]
pub struct Levels<'a> {
    bits: &'a Bits,
    order: BitOrder,
    index: usize,
}

impl Iterator for Levels<'_> {
    type Item = Level;

    fn next(&mut self) -> Option<Level> {
        let level = self.bits.get(self.index, self.order)?;
        self.index += 1;
        Some(level)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.bits.len - self.index;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Levels<'_> {}

/// Bit sequence sampled at a fixed resolution
///
/// Together `res`, `bits` and `order` fully describe a time-domain digital
/// signal: sample `i` covers `[i * res, (i + 1) * res)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BitStream {
    /// Duration of one sample
    pub res: Duration,
    /// Samples
    pub bits: Bits,
    /// Bit order used to pack `bits`
    pub order: BitOrder,
}

impl BitStream {
    /// Create a stream from packed samples
    pub fn new(res: Duration, bits: Bits, order: BitOrder) -> Self {
        Self { res, bits, order }
    }

    /// Create a zeroed capture buffer of `len` samples
    pub fn capture(res: Duration, len: usize, order: BitOrder) -> Self {
        Self::new(res, Bits::zeroed(len), order)
    }

    /// Total duration of the stream
    pub fn duration(&self) -> Duration {
        mul_ticks(self.res, self.bits.len() as u64)
    }

    /// Iterate the samples in time order
    pub fn levels(&self) -> Levels<'_> {
        self.bits.levels(self.order)
    }

    /// Collapse consecutive equal samples into `(level, hold)` runs
    pub fn runs(&self) -> Vec<(Level, Duration)> {
        let mut runs: Vec<(Level, u64)> = Vec::new();
        for level in self.levels() {
            match runs.last_mut() {
                Some((last, count)) if *last == level => *count += 1,
                _ => runs.push((level, 1)),
            }
        }
        runs.into_iter()
            .map(|(level, count)| (level, mul_ticks(self.res, count)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::level::Level::{High, Low};
    use proptest::prelude::*;

    #[test]
    fn test_decode_msb_first() {
        let bits = Bits::from_bytes(alloc::vec![0x80]);
        let levels: Vec<_> = bits.levels(BitOrder::Msb).collect();
        assert_eq!(levels, [High, Low, Low, Low, Low, Low, Low, Low]);
    }

    #[test]
    fn test_decode_lsb_first() {
        let bits = Bits::from_bytes(alloc::vec![0x80]);
        let levels: Vec<_> = bits.levels(BitOrder::Lsb).collect();
        assert_eq!(levels, [Low, Low, Low, Low, Low, Low, Low, High]);
    }

    #[test]
    fn test_decode_pattern_bytes() {
        let bits = Bits::from_bytes(alloc::vec![0x01, 0xAA]);

        let lsb: Vec<_> = bits.levels(BitOrder::Lsb).collect();
        assert_eq!(
            lsb,
            [
                High, Low, Low, Low, Low, Low, Low, Low, // 0x01
                Low, High, Low, High, Low, High, Low, High, // 0xAA
            ]
        );

        let msb: Vec<_> = bits.levels(BitOrder::Msb).collect();
        assert_eq!(
            msb,
            [
                Low, Low, Low, Low, Low, Low, Low, High, // 0x01
                High, Low, High, Low, High, Low, High, Low, // 0xAA
            ]
        );
    }

    #[test]
    fn test_pack_partial_byte_pads_low() {
        let bits = Bits::pack([High, High, High], BitOrder::Msb);
        assert_eq!(bits.len(), 3);
        assert_eq!(bits.as_bytes(), &[0xE0]);

        let bits = Bits::pack([High, High, High], BitOrder::Lsb);
        assert_eq!(bits.as_bytes(), &[0x07]);
        assert_eq!(bits.levels(BitOrder::Lsb).count(), 3);
    }

    #[test]
    fn test_padding_cleared_on_wrap() {
        let bits = Bits::from_bytes_with_len(alloc::vec![0xFF], 2, BitOrder::Msb).unwrap();
        assert_eq!(bits.levels(BitOrder::Msb).collect::<Vec<_>>(), [High, High]);
        assert_eq!(bits.get(2, BitOrder::Msb), None);
        assert_eq!(bits.as_bytes(), &[0xC0]);
        assert_eq!(bits, Bits::pack([High, High], BitOrder::Msb));

        let bits = Bits::from_bytes_with_len(alloc::vec![0xAA, 0xFF], 11, BitOrder::Lsb).unwrap();
        assert_eq!(bits.as_bytes(), &[0xAA, 0x07]);

        // Whole bytes have no padding
        let bits = Bits::from_bytes_with_len(alloc::vec![0xFF], 8, BitOrder::Lsb).unwrap();
        assert_eq!(bits.as_bytes(), &[0xFF]);

        assert_eq!(
            Bits::from_bytes_with_len(alloc::vec![0, 0], 8, BitOrder::Msb),
            Err(StreamError::LengthMismatch)
        );
    }

    #[test]
    fn test_padding_written_by_driver_is_not_decoded() {
        let mut bits = Bits::zeroed(3);
        bits.as_bytes_mut()[0] = 0xFF;
        assert_eq!(bits.levels(BitOrder::Lsb).count(), 3);
        assert!(bits.levels(BitOrder::Lsb).all(|l| l == High));
    }

    #[test]
    fn test_set_and_get() {
        let mut bits = Bits::zeroed(10);
        assert_eq!(bits.as_bytes().len(), 2);
        assert!(bits.set(9, High, BitOrder::Lsb));
        assert!(!bits.set(10, High, BitOrder::Lsb));
        assert_eq!(bits.get(9, BitOrder::Lsb), Some(High));
        assert_eq!(bits.as_bytes(), &[0x00, 0x02]);

        assert!(bits.set(9, Low, BitOrder::Lsb));
        assert_eq!(bits.as_bytes(), &[0x00, 0x00]);
    }

    #[test]
    fn test_bitstream_duration_and_runs() {
        let bits = Bits::pack([Low, Low, High, High, High, Low], BitOrder::Msb);
        let stream = BitStream::new(Duration::from_millis(1), bits, BitOrder::Msb);

        assert_eq!(stream.duration(), Duration::from_millis(6));
        assert_eq!(
            stream.runs(),
            [
                (Low, Duration::from_millis(2)),
                (High, Duration::from_millis(3)),
                (Low, Duration::from_millis(1)),
            ]
        );
    }

    fn order_strategy() -> impl Strategy<Value = BitOrder> {
        prop_oneof![Just(BitOrder::Lsb), Just(BitOrder::Msb)]
    }

    proptest! {
        #[test]
        fn prop_pack_unpack_whole_bytes(
            raw in proptest::collection::vec(any::<bool>(), 0..32usize),
            order in order_strategy(),
        ) {
            // Repeat to a multiple of 8
            let levels: Vec<Level> = raw.iter().cycle().take(raw.len() * 8).map(|&b| Level::from(b)).collect();
            let bits = Bits::pack(levels.iter().copied(), order);
            prop_assert_eq!(bits.as_bytes().len(), levels.len() / 8);
            prop_assert_eq!(bits.levels(order).collect::<Vec<_>>(), levels);
        }

        #[test]
        fn prop_pack_unpack_any_length(
            raw in proptest::collection::vec(any::<bool>(), 0..100usize),
            order in order_strategy(),
        ) {
            let levels: Vec<Level> = raw.into_iter().map(Level::from).collect();
            let bits = Bits::pack(levels.iter().copied(), order);
            prop_assert_eq!(bits.len(), levels.len());
            prop_assert_eq!(bits.levels(order).collect::<Vec<_>>(), levels);
        }

        #[test]
        fn prop_orders_are_mirrored(byte in any::<u8>()) {
            let bits = Bits::from_bytes(alloc::vec![byte]);
            let mut lsb: Vec<_> = bits.levels(BitOrder::Lsb).collect();
            lsb.reverse();
            prop_assert_eq!(lsb, bits.levels(BitOrder::Msb).collect::<Vec<_>>());
        }
    }
}
