use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money amount represented in cents to avoid floating point issues.
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

    /// Creates a new Money amount from a whole dollar value.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
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

    /// Returns true if the amount is positive.
    pub fn is_positive(&self) -> bool {
        self.cents > 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies by a quantity, saturating at the bounds of `i64` cents.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }

    /// Multiplies by a quantity, or `None` if the result overflows.
    pub fn checked_multiply(&self, quantity: u32) -> Option<Money> {
        self.cents
            .checked_mul(i64::from(quantity))
            .map(|cents| Money { cents })
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

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money {
            cents: self.cents + rhs.cents,
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.cents += rhs.cents;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

const FULL_BASIS_POINTS: u32 = 10_000;

/// Returned when a discount falls outside 0..=100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Invalid discount: {basis_points} basis points (must be between 0 and 10000)")]
pub struct InvalidDiscount {
    pub basis_points: u32,
}

/// A percentage discount held in basis points (1% = 100 bp).
///
/// Basis points keep promo and product discounts exact: applying a discount
/// is integer arithmetic on cents with a single half-up rounding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct DiscountPercent(u32);

impl DiscountPercent {
    /// Creates a discount from basis points.
    pub fn from_basis_points(basis_points: u32) -> Result<Self, InvalidDiscount> {
        if basis_points > FULL_BASIS_POINTS {
            return Err(InvalidDiscount { basis_points });
        }
        Ok(Self(basis_points))
    }

    /// Creates a discount from a whole percentage.
    pub fn from_percent(percent: u32) -> Result<Self, InvalidDiscount> {
        Self::from_basis_points(percent.saturating_mul(100))
    }

    /// Returns the discount in basis points.
    pub fn basis_points(&self) -> u32 {
        self.0
    }

    /// Applies the discount: `amount * (1 - percent / 100)`, rounded half-up
    /// to the nearest cent.
    pub fn apply(&self, amount: Money) -> Money {
        let kept = i128::from(FULL_BASIS_POINTS - self.0);
        let scaled = i128::from(amount.cents()) * kept;
        let full = i128::from(FULL_BASIS_POINTS);
        let half = full / 2;
        let cents = if scaled >= 0 {
            (scaled + half) / full
        } else {
            (scaled - half) / full
        };
        // |cents| <= |amount| so the narrowing cannot overflow.
        Money::from_cents(cents as i64)
    }
}

impl TryFrom<u32> for DiscountPercent {
    type Error = InvalidDiscount;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::from_basis_points(value)
    }
}

impl From<DiscountPercent> for u32 {
    fn from(value: DiscountPercent) -> Self {
        value.0
    }
}

impl std::fmt::Display for DiscountPercent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}
