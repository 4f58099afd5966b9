//! Edge-duration encoding
//!
//! An [`EdgeStream`] lists how long the signal holds each level. The first
//! hold is at [`Level::Low`], then levels alternate. A 25% 1 kHz PWM period
//! is two entries (`[250µs, 750µs]`) instead of 1000 samples.
//!
//! Holds are rasterized onto a tick grid by rounding each hold down to a
//! whole number of ticks. Rounding is per hold, so the error never exceeds
//! one tick per hold and does not compound across holds.

use alloc::vec::Vec;
use core::time::Duration;

use super::{BitOrder, Bits, StreamError};
use crate::level::Level;

/// Alternating hold durations starting at Low
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeStream {
    /// Tick the holds are rasterized to
    pub res: Duration,
    /// Hold duration of each level, first one Low
    pub edges: Vec<Duration>,
}

impl EdgeStream {
    /// Create an edge stream
    pub fn new(res: Duration, edges: Vec<Duration>) -> Self {
        Self { res, edges }
    }

    /// Whole ticks of `res` in each hold, paired with its level
    ///
    /// Fails if `res` is zero.
    pub fn ticks(&self, res: Duration) -> Result<Vec<(Level, u64)>, StreamError> {
        let tick = res.as_nanos();
        if tick == 0 {
            return Err(StreamError::ZeroResolution);
        }
        let mut level = Level::Low;
        let mut out = Vec::with_capacity(self.edges.len());
        for hold in &self.edges {
            out.push((level, (hold.as_nanos() / tick) as u64));
            level = !level;
        }
        Ok(out)
    }

    /// Rasterize to samples at `res`
    pub fn to_bits(&self, res: Duration, order: BitOrder) -> Result<Bits, StreamError> {
        let mut bits = Bits::new();
        self.extend_bits(&mut bits, res, order)?;
        Ok(bits)
    }

    /// Rasterize to samples at `res`, appending to `bits`
    pub(crate) fn extend_bits(
        &self,
        bits: &mut Bits,
        res: Duration,
        order: BitOrder,
    ) -> Result<(), StreamError> {
        for (level, count) in self.ticks(res)? {
            for _ in 0..count {
                bits.push(level, order);
            }
        }
        Ok(())
    }

    /// Duration actually played at the stream's own resolution
    pub fn duration(&self) -> Result<Duration, StreamError> {
        let ticks: u64 = self.ticks(self.res)?.iter().map(|(_, n)| n).sum();
        Ok(mul_ticks(self.res, ticks))
    }

    /// Rasterized `(level, hold)` runs at the stream's own resolution
    ///
    /// Holds that round to zero ticks are dropped; adjacent runs of the same
    /// level are merged.
    pub fn runs(&self) -> Result<Vec<(Level, Duration)>, StreamError> {
        let mut runs: Vec<(Level, Duration)> = Vec::new();
        for (level, count) in self.ticks(self.res)? {
            if count == 0 {
                continue;
            }
            let hold = mul_ticks(self.res, count);
            match runs.last_mut() {
                Some((last, total)) if *last == level => *total += hold,
                _ => runs.push((level, hold)),
            }
        }
        Ok(runs)
    }
}

/// `res * ticks` without the `u32` limit of `Duration * u32`
pub(crate) fn mul_ticks(res: Duration, ticks: u64) -> Duration {
    let nanos = res.as_nanos() * ticks as u128;
    Duration::new(
        (nanos / 1_000_000_000) as u64,
        (nanos % 1_000_000_000) as u32,
    )
}
