//! # Pricing & Fee Engine
//!
//! Sums line items into a subtotal and applies the payment-processor fee.
//!
//! ## Fee Model
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Rate table per payment origin:  (rate_bps, fixed_minor_units)          │
//! │     domestic       e.g. 175 bps + 30                                    │
//! │     international  e.g. 350 bps + 30                                    │
//! │                                                                         │
//! │  ABSORBED                                                               │
//! │    total = subtotal                                                     │
//! │    fee   = round½↑(subtotal × rate) + fixed   (for accounting only)     │
//! │                                                                         │
//! │  PASSED TO CUSTOMER, basis = SUBTOTAL                                   │
//! │    fee   = round½↑(subtotal × rate) + fixed                             │
//! │    total = subtotal + fee                                               │
//! │    10000 @ 1.75% + 30  →  fee 205, total 10205                          │
//! │                                                                         │
//! │  PASSED TO CUSTOMER, basis = GROSSED UP (default)                       │
//! │    total = round½↑((subtotal + fixed) / (1 − rate))                     │
//! │    fee   = total − subtotal                                             │
//! │    10000 @ 1.75% + 30  →  total 10209, fee 209                          │
//! │    processor takes round½↑(10209 × 1.75%) + 30 = 209 → operator nets    │
//! │    exactly 10000                                                        │
//! │                                                                         │
//! │  subtotal = 0  →  fee = 0, total = 0 in every mode                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The same [`Totals`] value feeds the review screen and the payment request,
//! so the displayed amount and the charged amount cannot drift apart.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::derivation::{self, LineItem};
use crate::error::{EngineError, EngineResult};
use crate::money::Money;
use crate::types::FeeRate;
use crate::validation;

// =============================================================================
// Modes
// =============================================================================

/// Who bears the processor fee.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    /// Operator pays; the customer is charged the subtotal.
    Absorbed,
    /// Customer pays the fee on top of the subtotal.
    #[default]
    PassedToCustomer,
}

impl fmt::Display for FeeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeMode::Absorbed => write!(f, "absorbed"),
            FeeMode::PassedToCustomer => write!(f, "passed_to_customer"),
        }
    }
}

impl FromStr for FeeMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "absorbed" | "absorb" | "operator" => Ok(FeeMode::Absorbed),
            "passed_to_customer" | "passed" | "customer" | "pass_through" => {
                Ok(FeeMode::PassedToCustomer)
            }
            other => Err(EngineError::FeeConfiguration(format!(
                "unknown fee mode '{}'. Valid options: absorbed, passed_to_customer",
                other
            ))),
        }
    }
}

/// What the processor's percentage is assumed to be charged on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum FeeBasis {
    /// Percentage of the gross amount charged; the fee is grossed up.
    #[default]
    GrossedUp,
    /// Percentage of the subtotal.
    Subtotal,
}

impl fmt::Display for FeeBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeeBasis::GrossedUp => write!(f, "grossed_up"),
            FeeBasis::Subtotal => write!(f, "subtotal"),
        }
    }
}

impl FromStr for FeeBasis {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "grossed_up" | "gross" | "total" => Ok(FeeBasis::GrossedUp),
            "subtotal" | "net" => Ok(FeeBasis::Subtotal),
            other => Err(EngineError::FeeConfiguration(format!(
                "unknown fee basis '{}'. Valid options: grossed_up, subtotal",
                other
            ))),
        }
    }
}

/// Where the paying card was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentOrigin {
    Domestic,
    International,
}

impl PaymentOrigin {
    pub fn from_is_domestic(is_domestic: bool) -> Self {
        if is_domestic {
            PaymentOrigin::Domestic
        } else {
            PaymentOrigin::International
        }
    }
}

// =============================================================================
// Rate Table
// =============================================================================

/// One disclosed processor rate: percentage plus fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct RateTable {
    #[serde(rename = "rate_bps")]
    pub rate: FeeRate,
    #[serde(rename = "fixed_minor_units")]
    pub fixed: Money,
}

impl RateTable {
    pub const fn new(rate_bps: u32, fixed_minor: i64) -> Self {
        RateTable {
            rate: FeeRate::from_bps(rate_bps),
            fixed: Money::from_minor(fixed_minor),
        }
    }

    /// What the processor deducts from a charge of `amount`.
    pub fn processor_fee(&self, amount: Money) -> Money {
        if amount.is_zero() {
            return Money::zero();
        }
        amount.percentage_half_up(self.rate) + self.fixed
    }

    fn validate(&self, label: &str) -> EngineResult<()> {
        validation::validate_rate_bps(label, self.rate.bps())
            .map_err(|e| EngineError::FeeConfiguration(e.to_string()))?;
        if self.fixed.is_negative() {
            return Err(EngineError::FeeConfiguration(format!(
                "{} fixed fee cannot be negative",
                label
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Fee Schedule
// =============================================================================

/// The two rate tables and the fee basis, supplied by configuration.
///
/// Tables are optional so that a missing one is detected and reported
/// instead of silently pricing the fee at zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSchedule {
    #[serde(default)]
    pub basis: FeeBasis,
    #[serde(default)]
    pub domestic: Option<RateTable>,
    #[serde(default)]
    pub international: Option<RateTable>,
}

impl FeeSchedule {
    pub fn new(basis: FeeBasis, domestic: RateTable, international: RateTable) -> Self {
        FeeSchedule {
            basis,
            domestic: Some(domestic),
            international: Some(international),
        }
    }

    /// Checks both tables are present and sane.
    pub fn validate(&self) -> EngineResult<()> {
        self.table(PaymentOrigin::Domestic)?;
        self.table(PaymentOrigin::International)?;
        Ok(())
    }

    /// The validated table for `origin`.
    pub fn table(&self, origin: PaymentOrigin) -> EngineResult<RateTable> {
        let (table, label) = match origin {
            PaymentOrigin::Domestic => (self.domestic, "domestic rate"),
            PaymentOrigin::International => (self.international, "international rate"),
        };
        let table = table.ok_or_else(|| {
            EngineError::FeeConfiguration(format!("{} table is not configured", label))
        })?;
        table.validate(label)?;
        Ok(table)
    }

    /// Computes subtotal, fee and payable total.
    ///
    /// ## Errors
    /// - `FeeConfiguration` if the table for `origin` is missing or invalid,
    ///   even for a zero subtotal, so a broken setup never reaches payment
    /// - `InvariantViolation` if the line items sum to a negative amount or
    ///   the order does not fit in an i64 of minor units
    pub fn compute_totals(
        &self,
        line_items: &[LineItem],
        mode: FeeMode,
        origin: PaymentOrigin,
    ) -> EngineResult<Totals> {
        let table = self.table(origin)?;
        let subtotal = derivation::checked_subtotal(line_items).ok_or_else(overflow)?;

        if subtotal.is_negative() {
            return Err(EngineError::invariant(format!(
                "order subtotal is negative ({} minor units)",
                subtotal.minor()
            )));
        }
        if subtotal.is_zero() {
            return Ok(Totals {
                subtotal,
                fee: Money::zero(),
                total: Money::zero(),
                mode,
                origin,
            });
        }

        let (fee, total) = match (mode, self.basis) {
            (FeeMode::Absorbed, _) => (table.processor_fee(subtotal), subtotal),
            (FeeMode::PassedToCustomer, FeeBasis::Subtotal) => {
                let fee = table.processor_fee(subtotal);
                (fee, subtotal.checked_add(fee).ok_or_else(overflow)?)
            }
            (FeeMode::PassedToCustomer, FeeBasis::GrossedUp) => {
                // table() already rejected rates of 100%, so None here is overflow
                let total = subtotal.gross_up(table.rate, table.fixed).ok_or_else(overflow)?;
                (total - subtotal, total)
            }
        };

        Ok(Totals {
            subtotal,
            fee,
            total,
            mode,
            origin,
        })
    }
}

fn overflow() -> EngineError {
    EngineError::invariant("order total exceeds the largest amount that can be charged")
}

// =============================================================================
// Totals & Order
// =============================================================================

/// The three numbers of an order, all in minor units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Totals {
    pub subtotal: Money,
    pub fee: Money,
    /// What the customer is charged.
    pub total: Money,
    pub mode: FeeMode,
    pub origin: PaymentOrigin,
}

impl Totals {
    /// What the operator keeps once the processor deducts its fee.
    pub fn operator_net(&self, table: &RateTable) -> Money {
        match self.mode {
            FeeMode::Absorbed => self.subtotal - self.fee,
            FeeMode::PassedToCustomer => self.total - table.processor_fee(self.total),
        }
    }
}

/// Line items plus their totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub line_items: Vec<LineItem>,
    pub totals: Totals,
}

impl Order {
    pub fn price(
        line_items: Vec<LineItem>,
        schedule: &FeeSchedule,
        mode: FeeMode,
        origin: PaymentOrigin,
    ) -> EngineResult<Order> {
        let totals = schedule.compute_totals(&line_items, mode, origin)?;
        Ok(Order { line_items, totals })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
