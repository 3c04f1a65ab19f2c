//! # Fixed-Point Prices
//!
//! **NO FLOATING POINT NEAR MONEY**
//!
//! Box prices are configured in ETH ("0.1") and charged in wei. `FixedPoint18`
//! stores value * 10^18 as a u128, which is exactly the wei amount, so the
//! conversion is lossless in both directions.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;

use crate::error::{LootError, LootResult};

/// Number of decimal places (wei per ETH).
const DECIMAL_PLACES_18: u32 = 18;

/// The multiplier for 18 decimal places.
const MULTIPLIER_18: u128 = 10u128.pow(DECIMAL_PLACES_18);

/// Fixed-point decimal number with 18 decimal places.
///
/// # Example
///
/// ```rust,ignore
/// let price: FixedPoint18 = "0.1".parse()?;
/// assert_eq!(price.to_wei(), 100_000_000_000_000_000);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct FixedPoint18(u128);

impl FixedPoint18 {
    /// Zero value.
    pub const ZERO: Self = Self(0);

    /// One unit (1.000...000 with 18 zeros).
    pub const ONE: Self = Self(MULTIPLIER_18);

    /// Creates from a whole number, `None` on overflow.
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u128) -> Option<Self> {
        match whole.checked_mul(MULTIPLIER_18) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Creates from raw wei value (no conversion).
    #[inline]
    #[must_use]
    pub const fn from_wei(wei: u128) -> Self {
        Self(wei)
    }

    /// Returns the raw wei value.
    #[inline]
    #[must_use]
    pub const fn to_wei(self) -> u128 {
        self.0
    }

    /// Returns the whole number part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u128 {
        self.0 / MULTIPLIER_18
    }

    /// Returns the decimal part (0 to 10^18 - 1).
    #[inline]
    #[must_use]
    pub const fn decimal(self) -> u128 {
        self.0 % MULTIPLIER_18
    }

    /// Checked addition.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Wei amount as a 256-bit integer.
    #[inline]
    #[must_use]
    pub fn to_u256(self) -> U256 {
        U256::from(self.0)
    }

    /// Converts a wei amount, failing if it does not fit in 128 bits.
    ///
    /// # Errors
    ///
    /// `ArithmeticOverflow` for amounts above `u128::MAX` wei.
    pub fn from_u256(wei: U256) -> LootResult<Self> {
        u128::try_from(wei)
            .map(Self)
            .map_err(|_| LootError::ArithmeticOverflow)
    }
}

impl FromStr for FixedPoint18 {
    type Err = LootError;

    /// Parses a decimal string such as `"0.1"`, `"2"` or `".5"`.
    ///
    /// At most 18 fractional digits are accepted; no rounding is done.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || LootError::InvalidConfig(format!("invalid decimal amount: {s:?}"));

        let s = s.trim();
        let (whole_str, frac_str) = s.split_once('.').unwrap_or((s, ""));
        if whole_str.is_empty() && frac_str.is_empty() {
            return Err(invalid());
        }
        if !whole_str.bytes().all(|b| b.is_ascii_digit())
            || !frac_str.bytes().all(|b| b.is_ascii_digit())
            || frac_str.len() > DECIMAL_PLACES_18 as usize
        {
            return Err(invalid());
        }

        let whole: u128 = if whole_str.is_empty() {
            0
        } else {
            whole_str.parse().map_err(|_| invalid())?
        };

        let mut frac: u128 = 0;
        for digit in frac_str.bytes() {
            frac = frac * 10 + u128::from(digit - b'0');
        }
        // Scale "5" in "0.5" up to 18 places
        let missing = DECIMAL_PLACES_18 - frac_str.len() as u32;
        frac *= 10u128.pow(missing);

        Self::from_whole(whole)
            .and_then(|w| w.checked_add(Self(frac)))
            .ok_or(LootError::ArithmeticOverflow)
    }
}

impl fmt::Debug for FixedPoint18 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FixedPoint18({}.{:018})", self.whole(), self.decimal())
    }
}

impl fmt::Display for FixedPoint18 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:018}", self.whole(), self.decimal())
    }
}
