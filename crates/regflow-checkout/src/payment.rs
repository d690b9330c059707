//! # Payment Gateway
//!
//! The engine hands the gateway an amount, a billing record and a currency.
//! Card capture, tokenization and 3-D Secure all happen on the other side.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regflow_core::{Money, PaymentRequest};
use serde::{Deserialize, Serialize};

use crate::error::CheckoutResult;

/// Proof of a successful charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentReceipt {
    /// Processor reference; becomes the confirmation number.
    pub reference: String,
    pub amount: Money,
    pub currency: String,
    pub charged_at: DateTime<Utc>,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charges exactly `request.total_payable_minor_units`.
    ///
    /// Must either take the full amount or nothing.
    async fn charge(&self, request: &PaymentRequest) -> CheckoutResult<PaymentReceipt>;
}
