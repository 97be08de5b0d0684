//! Money as integer cents.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// An amount fell outside the representable range.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("amount out of range")]
pub struct MoneyOverflow;

/// Money amount represented in cents to avoid floating point issues.
///
/// Serializes as a bare integer so it can sit inside JSON documents
/// (order line snapshots) without an extra wrapper object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money {
    /// Amount in cents (e.g., 1000 = $10.00)
    cents: i64,
}

impl Money {
    /// Creates a new Money amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns the dollar portion (whole number).
    pub fn dollars(&self) -> i64 {
        self.cents / 100
    }

    /// Returns the cents portion (remainder after dollars).
    pub fn cents_part(&self) -> i64 {
        self.cents.abs() % 100
    }

    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Multiplies by a quantity (line subtotal).
    pub fn checked_multiply(self, quantity: u32) -> Result<Money, MoneyOverflow> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(Money::from_cents)
            .ok_or(MoneyOverflow)
    }

    pub fn checked_add(self, other: Money) -> Result<Money, MoneyOverflow> {
        self.cents
            .checked_add(other.cents)
            .map(Money::from_cents)
            .ok_or(MoneyOverflow)
    }

    /// Sums amounts, failing instead of wrapping.
    pub fn checked_sum<I>(amounts: I) -> Result<Money, MoneyOverflow>
    where
        I: IntoIterator<Item = Money>,
    {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.cents < 0 {
            write!(f, "-${}.{:02}", self.dollars().abs(), self.cents_part())
        } else {
            write!(f, "${}.{:02}", self.dollars(), self.cents_part())
        }
    }
}
