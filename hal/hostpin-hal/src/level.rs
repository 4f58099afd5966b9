//! Signal level and PWM duty cycle primitives

use core::fmt;
use core::ops::Not;
use core::str::FromStr;

/// Digital signal level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    /// Logic 0
    #[default]
    Low,
    /// Logic 1
    High,
}

impl Level {
    /// Check if the level is high (logic 1)
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Check if the level is low (logic 0)
    pub const fn is_low(self) -> bool {
        !self.is_high()
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> Self {
        level.is_high()
    }
}

impl Not for Level {
    type Output = Level;

    fn not(self) -> Level {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // pad() so that "{:>4}" aligns columns of levels
        f.pad(match self {
            Level::Low => "Low",
            Level::High => "High",
        })
    }
}

/// Raw value of a 100% duty cycle
pub const DUTY_MAX: u32 = 1 << 24;

/// Fractional digits that take part in parsing; later digits only round
const MAX_FRACTION_DIGITS: u32 = 9;

/// Fractional digits needed so that any raw duty survives a display/parse
/// cycle (one raw unit is ~6e-6 percent)
const DISPLAY_FRACTION_DIGITS: u32 = 7;

/// PWM duty cycle as a fixed-point fraction of [`DUTY_MAX`]
///
/// Parsed from and displayed as a percentage (`"33%"`, `"12.5%"`).
/// Display emits the shortest percentage that parses back to the same raw
/// value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Duty(u32);

/// Errors from parsing a duty cycle string
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseDutyError {
    /// Text is not `<number>%`
    InvalidFormat,
    /// Percentage is above 100%
    OutOfRange,
}

impl fmt::Display for ParseDutyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDutyError::InvalidFormat => f.write_str("invalid duty format, expected <number>%"),
            ParseDutyError::OutOfRange => f.write_str("duty out of range [0%, 100%]"),
        }
    }
}

impl Duty {
    /// 0% duty cycle
    pub const ZERO: Duty = Duty(0);

    /// 50% duty cycle
    pub const HALF: Duty = Duty(DUTY_MAX / 2);

    /// 100% duty cycle
    pub const MAX: Duty = Duty(DUTY_MAX);

    /// Create a duty cycle from its raw value
    ///
    /// Returns `None` if `raw` exceeds [`DUTY_MAX`].
    pub const fn new(raw: u32) -> Option<Self> {
        if raw > DUTY_MAX {
            None
        } else {
            Some(Self(raw))
        }
    }

    /// Create the duty cycle `num / den` of [`DUTY_MAX`], rounded to nearest
    ///
    /// Returns `None` if `den` is zero or the fraction exceeds one.
    pub const fn from_ratio(num: u32, den: u32) -> Option<Self> {
        if den == 0 || num > den {
            return None;
        }
        Some(Self(round_div(num as u128 * DUTY_MAX as u128, den as u128) as u32))
    }

    /// Raw fixed-point value in `0..=DUTY_MAX`
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Convert a scaled percentage (`percent_scaled / 10^digits` percent)
    fn from_scaled_percent(percent_scaled: u64, digits: u32) -> Self {
        let den = 100u128 * 10u128.pow(digits);
        Self(round_div(percent_scaled as u128 * DUTY_MAX as u128, den) as u32)
    }

    /// Percentage scaled by `10^digits`, rounded to nearest
    fn scaled_percent(self, digits: u32) -> u64 {
        let num = self.0 as u128 * 100 * 10u128.pow(digits);
        round_div(num, DUTY_MAX as u128) as u64
    }
}

const fn round_div(num: u128, den: u128) -> u128 {
    (num + den / 2) / den
}

impl FromStr for Duty {
    type Err = ParseDutyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let number = s.strip_suffix('%').ok_or(ParseDutyError::InvalidFormat)?;

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(ParseDutyError::InvalidFormat);
        }
        if !int_part.bytes().chain(frac_part.bytes()).all(|c| c.is_ascii_digit()) {
            return Err(ParseDutyError::InvalidFormat);
        }

        // Digits past MAX_FRACTION_DIGITS only round the last kept digit
        let kept = frac_part.len().min(MAX_FRACTION_DIGITS as usize);
        let (frac_part, dropped) = frac_part.split_at(kept);
        let digits = kept as u32;
        let mut scaled: u64 = 0;
        for c in int_part.bytes().chain(frac_part.bytes()) {
            scaled = scaled
                .checked_mul(10)
                .and_then(|v| v.checked_add((c - b'0') as u64))
                .ok_or(ParseDutyError::OutOfRange)?;
        }
        if dropped.as_bytes().first().is_some_and(|&c| c >= b'5') {
            scaled = scaled.checked_add(1).ok_or(ParseDutyError::OutOfRange)?;
        }

        if scaled > 100 * 10u64.pow(digits) {
            return Err(ParseDutyError::OutOfRange);
        }
        Ok(Self::from_scaled_percent(scaled, digits))
    }
}

impl fmt::Display for Duty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Shortest percentage that maps back onto the same raw value
        let mut digits = 0;
        let mut scaled = self.scaled_percent(0);
        while digits < DISPLAY_FRACTION_DIGITS
            && Self::from_scaled_percent(scaled, digits) != *self
        {
            digits += 1;
            scaled = self.scaled_percent(digits);
        }

        let unit = 10u64.pow(digits);
        if digits == 0 {
            write!(f, "{}%", scaled)
        } else {
            write!(
                f,
                "{}.{:0width$}%",
                scaled / unit,
                scaled % unit,
                width = digits as usize
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_level_display() {
        assert_eq!(Level::Low.to_string(), "Low");
        assert_eq!(Level::High.to_string(), "High");
        assert_eq!(format!("{:>4}", Level::Low), " Low");
    }

    #[test]
    fn test_level_bool_conversion() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert!(bool::from(Level::High));
        assert_eq!(!Level::Low, Level::High);
    }

    #[test]
    fn test_parse_duty_integer() {
        let d: Duty = "33%".parse().unwrap();
        assert_eq!(d.to_string(), "33%");

        assert_eq!("0%".parse::<Duty>().unwrap(), Duty::ZERO);
        assert_eq!("100%".parse::<Duty>().unwrap(), Duty::MAX);
        assert_eq!("50%".parse::<Duty>().unwrap(), Duty::HALF);
    }

    #[test]
    fn test_parse_duty_decimal() {
        let d: Duty = "12.5%".parse().unwrap();
        assert_eq!(d.raw(), DUTY_MAX / 8);
        assert_eq!(d.to_string(), "12.5%");

        let d: Duty = ".5%".parse().unwrap();
        assert_eq!(d.to_string(), "0.5%");
    }

    #[test]
    fn test_parse_duty_long_fraction() {
        let long: Duty = "33.3333333333%".parse().unwrap();
        assert_eq!(long, "33.333333333%".parse().unwrap());
        assert_eq!(long, Duty::from_ratio(1, 3).unwrap());

        assert_eq!("12.5000000000%".parse::<Duty>().unwrap().raw(), DUTY_MAX / 8);
        assert_eq!(
            "99.9999999999%".parse::<Duty>().unwrap(),
            "100%".parse().unwrap()
        );
        assert_eq!("100.0000000001%".parse::<Duty>(), Ok(Duty::MAX));
        assert_eq!(
            "100.0000000009%".parse::<Duty>(),
            Err(ParseDutyError::OutOfRange)
        );
        assert_eq!(
            "1.0000000000x%".parse::<Duty>(),
            Err(ParseDutyError::InvalidFormat)
        );
    }

    #[test]
    fn test_parse_duty_invalid() {
        assert_eq!("33".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!("%".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!(".%".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!("-5%".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!("1.2.3%".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!("3 3%".parse::<Duty>(), Err(ParseDutyError::InvalidFormat));
        assert_eq!("100.1%".parse::<Duty>(), Err(ParseDutyError::OutOfRange));
        assert_eq!("250%".parse::<Duty>(), Err(ParseDutyError::OutOfRange));
    }

    #[test]
    fn test_duty_ratio() {
        assert_eq!(Duty::from_ratio(1, 2), Some(Duty::HALF));
        assert_eq!(Duty::from_ratio(1, 0), None);
        assert_eq!(Duty::from_ratio(3, 2), None);
        assert_eq!(Duty::new(DUTY_MAX + 1), None);
        // DUTY_MAX / 3 is not a whole percentage
        let third = Duty::from_ratio(1, 3).unwrap();
        assert_eq!(third.to_string().parse::<Duty>().unwrap(), third);
    }

    proptest! {
        #[test]
        fn prop_percent_roundtrip(int in 0u32..100, frac in 0u32..1000) {
            let text = format!("{}.{:03}%", int, frac);
            let d: Duty = text.parse().unwrap();
            let again: Duty = d.to_string().parse().unwrap();
            prop_assert_eq!(again, d);
        }

        #[test]
        fn prop_raw_roundtrip(raw in 0u32..=DUTY_MAX) {
            let d = Duty::new(raw).unwrap();
            let again: Duty = d.to_string().parse().unwrap();
            prop_assert_eq!(again, d);
        }
    }
}
