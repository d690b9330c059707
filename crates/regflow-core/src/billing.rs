//! # Billing Details
//!
//! Who pays, and where the card was issued.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  [x] Bill to primary attendee                                          │
//! │        │                                                                │
//! │        ▼  copies first/last name, email, phone                          │
//! │  BillingDetails { bill_to_primary: true, ... }                          │
//! │        │                                                                │
//! │        │  untick, or edit any field                                     │
//! │        ▼                                                                │
//! │  BillingDetails { bill_to_primary: false, ... }  ← detached snapshot    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Country and state are structured references as resolved by the address
//! lookup, never raw strings. The country decides the payment origin.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::attendee::Attendee;
use crate::error::{EngineResult, ValidationError};
use crate::money::Money;
use crate::validation;

// =============================================================================
// Location References
// =============================================================================

/// A resolved country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CountryRef {
    /// ISO 3166-1 alpha-2, upper case.
    pub code: String,
    pub name: String,
}

impl CountryRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        CountryRef {
            code: code.into().trim().to_ascii_uppercase(),
            name: name.into(),
        }
    }

    pub fn matches(&self, code: &str) -> bool {
        self.code.eq_ignore_ascii_case(code.trim())
    }

    fn validate(&self) -> Result<(), ValidationError> {
        if self.code.len() != 2 || !self.code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::InvalidFormat {
                field: "country".to_string(),
                reason: "must be a two-letter country code".to_string(),
            });
        }
        Ok(())
    }
}

/// A resolved state or territory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StateRef {
    pub code: String,
    pub name: String,
}

impl StateRef {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        StateRef {
            code: code.into(),
            name: name.into(),
        }
    }
}

// =============================================================================
// Billing Details
// =============================================================================

/// The billing record handed to the payment collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillingDetails {
    /// While set, contact fields mirror the primary attendee.
    #[serde(default)]
    pub bill_to_primary: bool,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub business_name: Option<String>,
    /// Tax or company registration number.
    #[serde(default)]
    pub business_number: Option<String>,
    #[serde(default)]
    pub address_line1: String,
    #[serde(default)]
    pub address_line2: Option<String>,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub postcode: String,
    #[serde(default)]
    pub state: Option<StateRef>,
    #[serde(default)]
    pub country: Option<CountryRef>,
}

impl BillingDetails {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the primary attendee's contact fields and ticks the toggle.
    pub fn bill_to_primary(&mut self, primary: &Attendee) {
        self.bill_to_primary = true;
        self.sync_from_primary(primary);
    }

    /// Refreshes the mirrored fields. No-op once detached.
    pub fn sync_from_primary(&mut self, primary: &Attendee) {
        if !self.bill_to_primary {
            return;
        }
        self.first_name = primary.first_name.clone();
        self.last_name = primary.last_name.clone();
        self.email = primary.email.clone().unwrap_or_default();
        self.phone = primary.phone.clone();
    }

    /// Unticks the toggle. The copied values stay as an independent snapshot.
    pub fn detach(&mut self) {
        self.bill_to_primary = false;
    }

    /// Applies an edit and detaches from the primary.
    ///
    /// Nothing changes if validation fails.
    pub fn update(&mut self, patch: BillingPatch) -> EngineResult<()> {
        patch.validate()?;
        patch.apply(self);
        self.detach();
        Ok(())
    }

    /// Checks the record is complete enough to take payment.
    pub fn validate(&self) -> EngineResult<()> {
        validation::validate_required("first name", &self.first_name)?;
        validation::validate_required("last name", &self.last_name)?;
        validation::validate_email(&self.email)?;
        validation::validate_required("address", &self.address_line1)?;
        validation::validate_required("city", &self.city)?;
        validation::validate_required("postcode", &self.postcode)?;
        match &self.country {
            Some(country) => country.validate()?,
            None => {
                return Err(ValidationError::Required {
                    field: "country".to_string(),
                }
                .into())
            }
        }
        Ok(())
    }

    /// True if the billing country is `domestic_country`.
    ///
    /// An unset country counts as international.
    pub fn is_domestic(&self, domestic_country: &str) -> bool {
        self.country
            .as_ref()
            .is_some_and(|country| country.matches(domestic_country))
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

// =============================================================================
// Billing Patch
// =============================================================================

/// Partial billing edit. `None` leaves a field unchanged; an empty string
/// clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct BillingPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub business_name: Option<String>,
    pub business_number: Option<String>,
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
    pub city: Option<String>,
    pub postcode: Option<String>,
    pub state: Option<StateRef>,
    /// Changing country without also sending `state` clears the state.
    pub country: Option<CountryRef>,
}

impl BillingPatch {
    fn validate(&self) -> EngineResult<()> {
        for (field, value) in [
            ("first name", &self.first_name),
            ("last name", &self.last_name),
            ("phone", &self.phone),
            ("business name", &self.business_name),
            ("business number", &self.business_number),
            ("address", &self.address_line1),
            ("address line 2", &self.address_line2),
            ("city", &self.city),
            ("postcode", &self.postcode),
        ] {
            if let Some(value) = value {
                validation::validate_short_text(field, value)?;
            }
        }
        if let Some(email) = &self.email {
            if !email.trim().is_empty() {
                validation::validate_email(email)?;
            }
        }
        if let Some(country) = &self.country {
            country.validate()?;
        }
        Ok(())
    }

    fn apply(self, details: &mut BillingDetails) {
        fn optional(value: String) -> Option<String> {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        fn set(target: &mut String, value: Option<String>) {
            if let Some(value) = value {
                *target = value.trim().to_string();
            }
        }

        set(&mut details.first_name, self.first_name);
        set(&mut details.last_name, self.last_name);
        set(&mut details.email, self.email);
        set(&mut details.address_line1, self.address_line1);
        set(&mut details.city, self.city);
        set(&mut details.postcode, self.postcode);
        if let Some(phone) = self.phone {
            details.phone = optional(phone);
        }
        if let Some(name) = self.business_name {
            details.business_name = optional(name);
        }
        if let Some(number) = self.business_number {
            details.business_number = optional(number);
        }
        if let Some(line2) = self.address_line2 {
            details.address_line2 = optional(line2);
        }
        if let Some(country) = self.country {
            if details.country.as_ref() != Some(&country) {
                details.state = None;
            }
            details.country = Some(country);
        }
        if let Some(state) = self.state {
            details.state = Some(state);
        }
    }
}

// =============================================================================
// Payment Request
// =============================================================================

/// Everything the payment collaborator receives. No card data, no tokens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub total_payable_minor_units: Money,
    pub billing_details: BillingDetails,
    /// ISO 4217 code.
    pub currency: String,
}

// =============================================================================
// Unit Tests
// =============================================================================
