//! # Checkout Error Types
//!
//! Errors raised at the collaborator seams.
//!
//! ## Error Categories
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Checkout Error Categories                           │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────┐ │
//! │  │  Configuration  │  │   Collaborators │  │     Engine              │ │
//! │  │                 │  │                 │  │                         │ │
//! │  │  InvalidConfig  │  │  CatalogUnavail.│  │  Engine(EngineError)    │ │
//! │  │  ConfigLoad     │  │  PaymentDeclined│  │                         │ │
//! │  │  ConfigSave     │  │  PaymentFailed  │  │                         │ │
//! │  │                 │  │  AmountMismatch │  │                         │ │
//! │  └─────────────────┘  └─────────────────┘  └─────────────────────────┘ │
//! │                                                                         │
//! │  ┌─────────────────┐  ┌─────────────────┐                              │
//! │  │   Drafts        │  │   Lifecycle     │                              │
//! │  │                 │  │                 │                              │
//! │  │  DraftNotFound  │  │  AlreadyComplete│                              │
//! │  │  DraftStorage   │  │                 │                              │
//! │  │  Serialization  │  │                 │                              │
//! │  └─────────────────┘  └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use regflow_core::{EngineError, RegistrationId};
use thiserror::Error;

/// Result type alias for checkout operations.
pub type CheckoutResult<T> = Result<T, CheckoutError>;

#[derive(Debug, Error)]
pub enum CheckoutError {
    // =========================================================================
    // Configuration Errors
    // =========================================================================
    /// Invalid checkout configuration.
    #[error("Invalid checkout configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to load config: {0}")]
    ConfigLoadFailed(String),

    #[error("Failed to save config: {0}")]
    ConfigSaveFailed(String),

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    /// The catalog for a function could not be fetched.
    #[error("Catalog for {function_id} is unavailable: {reason}")]
    CatalogUnavailable { function_id: String, reason: String },

    /// The processor refused the charge. Nothing was taken.
    #[error("Payment declined: {0}")]
    PaymentDeclined(String),

    /// The processor could not be reached or errored.
    #[error("Payment failed: {0}")]
    PaymentFailed(String),

    /// The processor took a different amount than was shown. The
    /// registration is not confirmed; the charge needs reconciling.
    #[error("Charge {reference} took {charged} minor units, {requested} were requested")]
    AmountMismatch {
        reference: String,
        requested: i64,
        charged: i64,
    },

    // =========================================================================
    // Draft Errors
    // =========================================================================
    #[error("No saved draft for registration {0}")]
    DraftNotFound(RegistrationId),

    #[error("Draft storage error: {0}")]
    DraftStorage(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),

    // =========================================================================
    // Lifecycle Errors
    // =========================================================================
    /// The registration was already confirmed.
    #[error("Registration {0} is already complete")]
    AlreadyComplete(RegistrationId),

    // =========================================================================
    // Engine Errors
    // =========================================================================
    /// A registration or pricing rule rejected the operation.
    #[error(transparent)]
    Engine(#[from] EngineError),
}

// =============================================================================
// Error Conversions
// =============================================================================

impl From<serde_json::Error> for CheckoutError {
    fn from(err: serde_json::Error) -> Self {
        CheckoutError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CheckoutError {
    fn from(err: std::io::Error) -> Self {
        CheckoutError::DraftStorage(err.to_string())
    }
}

impl From<toml::de::Error> for CheckoutError {
    fn from(err: toml::de::Error) -> Self {
        CheckoutError::ConfigLoadFailed(err.to_string())
    }
}

impl From<toml::ser::Error> for CheckoutError {
    fn from(err: toml::ser::Error) -> Self {
        CheckoutError::ConfigSaveFailed(err.to_string())
    }
}

// =============================================================================
// Error Categorization
// =============================================================================

impl CheckoutError {
    /// Returns true if the same call may succeed when tried again.
    ///
    /// A declined payment is final for that card; a failed one is not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CheckoutError::CatalogUnavailable { .. }
                | CheckoutError::PaymentFailed(_)
                | CheckoutError::DraftStorage(_)
        )
    }

    /// Returns true if this error indicates a configuration problem.
    ///
    /// Fee configuration errors from the engine count: checkout must stop.
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            CheckoutError::InvalidConfig(_)
                | CheckoutError::ConfigLoadFailed(_)
                | CheckoutError::ConfigSaveFailed(_)
                | CheckoutError::Engine(EngineError::FeeConfiguration(_))
        )
    }

    /// Returns true if the error should become a message next to a field.
    pub fn is_field_level(&self) -> bool {
        match self {
            CheckoutError::Engine(err) => err.is_field_level(),
            CheckoutError::PaymentDeclined(_) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_errors() {
        assert!(CheckoutError::PaymentFailed("gateway timeout".into()).is_retryable());
        assert!(CheckoutError::CatalogUnavailable {
            function_id: "gi-2025".into(),
            reason: "503".into(),
        }
        .is_retryable());

        assert!(!CheckoutError::PaymentDeclined("insufficient funds".into()).is_retryable());
        assert!(!CheckoutError::AmountMismatch {
            reference: "ch_1".into(),
            requested: 10_205,
            charged: 10_000,
        }
        .is_retryable());
        assert!(!CheckoutError::InvalidConfig("bad".into()).is_retryable());
    }

    #[test]
    fn test_fee_configuration_is_config_error() {
        let err: CheckoutError = EngineError::FeeConfiguration("no table".into()).into();
        assert!(err.is_config_error());
        assert!(!err.is_field_level());
        assert!(err.to_string().contains("no table"));
    }

    #[test]
    fn test_engine_field_errors_pass_through() {
        let err: CheckoutError = EngineError::IneligibleSelection {
            catalog_id: "pkg-lodge".into(),
            attendee_type: "guest".into(),
        }
        .into();
        assert!(err.is_field_level());
    }
}
