//! Digital waveform streams
//!
//! Encodings for capturing and generating time-accurate digital signals:
//!
//! - [`Bits`] / [`BitStream`] - one packed bit per sample at a fixed
//!   resolution
//! - [`EdgeStream`] - alternating hold durations, starting Low
//! - [`Program`] - a sequence of [`Stream`] parts played `loops` times
//!
//! These are plain values. A pin's streaming capability borrows them for one
//! call and keeps no state afterwards.

mod bits;
mod edge;

use alloc::vec::Vec;
use core::fmt;
use core::time::Duration;

pub use bits::{BitStream, Bits, Levels};
pub use edge::EdgeStream;

use crate::level::Level;
use edge::mul_ticks;

/// Order of samples inside each packed byte
///
/// Fixed per stream; never inferred from the data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BitOrder {
    /// Least significant bit is the earliest sample
    Lsb,
    /// Most significant bit is the earliest sample
    #[default]
    Msb,
}

impl BitOrder {
    /// Mask selecting sample `bit` (0..8) of a byte
    pub const fn mask(self, bit: usize) -> u8 {
        match self {
            BitOrder::Lsb => 1 << bit,
            BitOrder::Msb => 0x80 >> bit,
        }
    }
}

/// Errors in stream construction or program validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StreamError {
    /// Resolution of zero
    ZeroResolution,
    /// Parts use different resolutions and the consumer needs one clock
    MixedResolution,
    /// Resolution finer than the consumer can time
    ResolutionTooFine,
    /// Program has no parts
    EmptyProgram,
    /// Byte count does not match the declared bit length
    LengthMismatch,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamError::ZeroResolution => "zero resolution",
            StreamError::MixedResolution => "parts have different resolutions",
            StreamError::ResolutionTooFine => "resolution finer than supported",
            StreamError::EmptyProgram => "program has no parts",
            StreamError::LengthMismatch => "byte count does not match bit length",
        })
    }
}

/// One part of a [`Program`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stream {
    /// Sampled bits
    Bits(BitStream),
    /// Edge holds
    Edges(EdgeStream),
}

impl Stream {
    /// Resolution this part is timed at
    pub fn resolution(&self) -> Duration {
        match self {
            Stream::Bits(b) => b.res,
            Stream::Edges(e) => e.res,
        }
    }

    /// Played duration of this part
    pub fn duration(&self) -> Result<Duration, StreamError> {
        match self {
            Stream::Bits(b) => Ok(b.duration()),
            Stream::Edges(e) => e.duration(),
        }
    }

    /// `(level, hold)` runs of this part
    pub fn runs(&self) -> Result<Vec<(Level, Duration)>, StreamError> {
        match self {
            Stream::Bits(b) => Ok(b.runs()),
            Stream::Edges(e) => e.runs(),
        }
    }

    /// Check the part can be timed with ticks no finer than `min_res`
    pub fn check(&self, min_res: Duration) -> Result<(), StreamError> {
        let res = self.resolution();
        if res.is_zero() {
            Err(StreamError::ZeroResolution)
        } else if res < min_res {
            Err(StreamError::ResolutionTooFine)
        } else {
            Ok(())
        }
    }
}

impl From<BitStream> for Stream {
    fn from(stream: BitStream) -> Self {
        Stream::Bits(stream)
    }
}

impl From<EdgeStream> for Stream {
    fn from(stream: EdgeStream) -> Self {
        Stream::Edges(stream)
    }
}

/// Sequence of stream parts, repeated `loops` times
///
/// `loops` of 0 or 1 plays the sequence once.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    /// Parts in playback order
    pub parts: Vec<Stream>,
    /// Number of times the whole sequence is played
    pub loops: u32,
}

impl Program {
    /// Create a program
    pub fn new(parts: Vec<Stream>, loops: u32) -> Self {
        Self { parts, loops }
    }

    /// Number of times the sequence is played
    pub fn iterations(&self) -> u32 {
        self.loops.max(1)
    }

    /// Resolution shared by every part, or `None` if they differ or there
    /// are no parts
    pub fn resolution(&self) -> Option<Duration> {
        let first = self.parts.first()?.resolution();
        self.parts
            .iter()
            .all(|p| p.resolution() == first)
            .then_some(first)
    }

    /// Validate for a consumer whose finest tick is `min_res`
    ///
    /// Parts may keep their own resolution.
    pub fn check(&self, min_res: Duration) -> Result<(), StreamError> {
        if self.parts.is_empty() {
            return Err(StreamError::EmptyProgram);
        }
        self.parts.iter().try_for_each(|p| p.check(min_res))
    }

    /// Validate for a consumer that cannot change clock mid-stream
    ///
    /// Returns the single resolution every part must share.
    pub fn check_single_clock(&self, min_res: Duration) -> Result<Duration, StreamError> {
        self.check(min_res)?;
        self.resolution().ok_or(StreamError::MixedResolution)
    }

    /// Total played duration, all iterations included
    pub fn duration(&self) -> Result<Duration, StreamError> {
        let mut once = Duration::ZERO;
        for part in &self.parts {
            once += part.duration()?;
        }
        Ok(mul_ticks(once, self.iterations() as u64))
    }

    /// Concatenate one iteration into a single [`BitStream`]
    ///
    /// Every part must share one resolution; a program mixing resolutions is
    /// rejected with [`StreamError::MixedResolution`] rather than resampled.
    pub fn flatten(&self, order: BitOrder) -> Result<BitStream, StreamError> {
        let res = self.check_single_clock(Duration::ZERO)?;
        let mut bits = Bits::new();
        for part in &self.parts {
            match part {
                Stream::Bits(b) => {
                    for level in b.levels() {
                        bits.push(level, order);
                    }
                }
                Stream::Edges(e) => e.extend_bits(&mut bits, res, order)?,
            }
        }
        Ok(BitStream::new(res, bits, order))
    }

    /// Call `f` with every `(level, hold)` run in playback order, all
    /// iterations included
    ///
    /// Validation happens up front, so `f` is never called for a program
    /// that fails.
    pub fn for_each_run<F>(&self, mut f: F) -> Result<(), StreamError>
    where
        F: FnMut(Level, Duration),
    {
        let mut once = Vec::new();
        for part in &self.parts {
            once.extend(part.runs()?);
        }
        for _ in 0..self.iterations() {
            for &(level, hold) in &once {
                f(level, hold);
            }
        }
        Ok(())
    }
}
