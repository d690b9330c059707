//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  30 attendees × $250.00 package, 1.75% + 30c processing fee             │
//! │    float:   7500.0 * 0.0175 + 0.30 = 131.55000000000001                 │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Minor Units                                      │
//! │    750000 × 175 bps = 13125.00 → 13125 + 30 = 13155 minor units         │
//! │    Every intermediate is an integer; rounding happens exactly once.     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use regflow_core::money::Money;
//! use regflow_core::types::FeeRate;
//!
//! let package = Money::from_minor(25_000); // $250.00
//! let line_total = package.multiply_quantity(30);
//! assert_eq!(line_total.minor(), 750_000);
//!
//! let fee = line_total.percentage_half_up(FeeRate::from_bps(175));
//! assert_eq!(fee.minor(), 13_125);
//! ```
//!
//! Formatting to major-unit strings is deliberately absent: the engine only
//! ever hands integers to its collaborators.

use serde::{Deserialize, Serialize};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use ts_rs::TS;

use crate::types::FeeRate;

/// Basis points in 100%.
pub const BPS_SCALE: i128 = 10_000;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (cents for AUD/USD).
///
/// ```text
/// Item.price / Package.price ──► LineItem.unit_price ──► LineItem.line_total
///                                                              │
///                                      Order.subtotal ◄────────┘
///                                           │
///                                   FeeSchedule ──► Order.fee, Order.total
///                                                           │
///                                      PaymentRequest ◄─────┘
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize, TS,
)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies a unit price by a quantity, saturating at the i64 bounds.
    ///
    /// Pricing uses [`Money::checked_multiply_quantity`] so a saturated value
    /// is never charged.
    ///
    /// ```rust
    /// use regflow_core::money::Money;
    ///
    /// let unit = Money::from_minor(8_500);
    /// assert_eq!(unit.multiply_quantity(3).minor(), 25_500);
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: u32) -> Option<Self> {
        match self.0.checked_mul(qty as i64) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(v) => Some(Money(v)),
            None => None,
        }
    }

    /// Applies a percentage rate and rounds half up to the nearest minor unit.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`, floor division, so a
    /// remainder of exactly one half always rounds towards +∞.
    ///
    /// ```rust
    /// use regflow_core::money::Money;
    /// use regflow_core::types::FeeRate;
    ///
    /// // 10000 × 1.75% = 175.00
    /// let fee = Money::from_minor(10_000).percentage_half_up(FeeRate::from_bps(175));
    /// assert_eq!(fee.minor(), 175);
    ///
    /// // 150 × 1% = 1.5 → 2
    /// let fee = Money::from_minor(150).percentage_half_up(FeeRate::from_bps(100));
    /// assert_eq!(fee.minor(), 2);
    /// ```
    pub fn percentage_half_up(&self, rate: FeeRate) -> Money {
        // i128 keeps large bulk orders from overflowing before the division
        let scaled = self.0 as i128 * rate.bps() as i128;
        Money::from_minor(div_round_half_up(scaled, BPS_SCALE) as i64)
    }

    /// Grosses an amount up so that taking `rate` of the result plus `fixed`
    /// leaves the original amount behind.
    ///
    /// `result = round_half_up((self + fixed) / (1 - rate))`
    ///
    /// Returns `None` when the rate is 100% or more (no finite gross exists).
    ///
    /// ```rust
    /// use regflow_core::money::Money;
    /// use regflow_core::types::FeeRate;
    ///
    /// let gross = Money::from_minor(10_000)
    ///     .gross_up(FeeRate::from_bps(175), Money::from_minor(30))
    ///     .unwrap();
    /// assert_eq!(gross.minor(), 10_209);
    /// ```
    pub fn gross_up(&self, rate: FeeRate, fixed: Money) -> Option<Money> {
        let remaining_bps = BPS_SCALE - rate.bps() as i128;
        if remaining_bps <= 0 {
            return None;
        }
        let numerator = (self.0 as i128 + fixed.0 as i128) * BPS_SCALE;
        let gross = div_round_half_up(numerator, remaining_bps);
        i64::try_from(gross).ok().map(Money::from_minor)
    }
}

/// `floor(numerator / denominator + 1/2)` for a positive denominator.
fn div_round_half_up(numerator: i128, denominator: i128) -> i128 {
    (2 * numerator + denominator).div_euclid(2 * denominator)
}

// =============================================================================
// Trait Implementations
// =============================================================================
// Operators saturate instead of panicking; derivation is a read and must not
// abort on a hostile catalog.

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
