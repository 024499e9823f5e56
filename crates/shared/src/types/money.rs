//! Native-currency and reward-token amounts.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! Both types hold integers in their smallest unit; `Decimal` is only used
//! at the edges for rate conversion and display.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of fractional digits in a reward token amount.
pub const TOKEN_DECIMALS: u32 = 2;

/// Native currency amount in the smallest currency unit.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from minor units.
    #[must_use]
    pub const fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    /// Returns the raw minor units.
    #[must_use]
    pub const fn minor_units(self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Returns true if the amount is negative.
    #[must_use]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction.
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition, for folded totals.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction, for folded totals.
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies by a count (e.g. contribution × members), `None` on overflow.
    #[must_use]
    pub fn checked_times(self, count: usize) -> Option<Self> {
        let count = i64::try_from(count).ok()?;
        self.0.checked_mul(count).map(Self)
    }

    /// Returns `percent`% of this amount, rounded down to the minor unit.
    #[must_use]
    pub fn percent(self, percent: u8) -> Self {
        let scaled = i128::from(self.0) * i128::from(percent) / 100;
        Self(i64::try_from(scaled).unwrap_or(if scaled > 0 { i64::MAX } else { i64::MIN }))
    }

    /// Converts to whole currency units given the number of minor-unit digits.
    ///
    /// Returns `None` if `decimals` exceeds the decimal precision.
    #[must_use]
    pub fn to_major(self, decimals: u32) -> Option<Decimal> {
        Decimal::try_new(self.0, decimals).ok()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Self::saturating_add)
    }
}

/// Reward token amount at a fixed scale of [`TOKEN_DECIMALS`] digits.
///
/// `TokenAmount(12_345)` is 123.45 tokens.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenAmount(pub i64);

impl TokenAmount {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// Creates an amount from raw token units (hundredths of a token).
    #[must_use]
    pub const fn from_units(units: i64) -> Self {
        Self(units)
    }

    /// Creates an amount from whole tokens, `None` on overflow.
    #[must_use]
    pub const fn from_whole(tokens: i64) -> Option<Self> {
        match tokens.checked_mul(100) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Converts a decimal token quantity, rounding toward zero at the token scale.
    #[must_use]
    pub fn from_decimal(tokens: Decimal) -> Option<Self> {
        let mut scaled = tokens.round_dp_with_strategy(TOKEN_DECIMALS, RoundingStrategy::ToZero);
        scaled.rescale(TOKEN_DECIMALS);
        i64::try_from(scaled.mantissa()).ok().map(Self)
    }

    /// Returns the raw token units.
    #[must_use]
    pub const fn units(self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is strictly positive.
    #[must_use]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    /// Checked addition.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition, for folded totals.
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Returns the amount as a decimal number of tokens.
    #[must_use]
    pub fn to_decimal(self) -> Decimal {
        Decimal::new(self.0, TOKEN_DECIMALS)
    }
}

impl std::fmt::Display for TokenAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_decimal())
    }
}
