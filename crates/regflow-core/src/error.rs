//! # Error Types
//!
//! Domain-specific error types for regflow-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  regflow-core errors (this file)                                       │
//! │  ├── EngineError      - Registration / pricing rule failures           │
//! │  └── ValidationError  - Field-level input failures                     │
//! │                                                                         │
//! │  regflow-checkout errors (separate crate)                              │
//! │  └── CheckoutError    - Config, persistence, payment failures          │
//! │                                                                         │
//! │  Flow: ValidationError → EngineError → CheckoutError → UI              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Propagation Policy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FIELD-LEVEL (recover at call site, prior state untouched)              │
//! │    NotFound, IneligibleSelection, Unavailable, Validation               │
//! │                                                                         │
//! │  BLOCKING (surface to caller, no progression to next wizard step)       │
//! │    InvariantViolation, FeeConfiguration                                 │
//! │                                                                         │
//! │  RECOVERED (never returned from derivation, logged as a warning)        │
//! │    StaleCatalogReference                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Engine Error
// =============================================================================

/// Registration and pricing rule failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Referenced attendee, item or package id is absent.
    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// The attendee (or bulk group) type is not in the eligibility set.
    ///
    /// ## User Workflow
    /// ```text
    /// Guest attendee ──► select "Lodge Package" (members only)
    ///      │
    ///      ▼
    /// IneligibleSelection { catalog_id: "pkg-lodge", attendee_type: "guest" }
    ///      │
    ///      ▼
    /// UI shows: "Lodge Package is not available to guests"
    /// ```
    #[error("{catalog_id} is not available to {attendee_type} attendees")]
    IneligibleSelection {
        catalog_id: String,
        attendee_type: String,
    },

    /// Item or package is inactive or sold out.
    #[error("{catalog_id} is no longer available: {reason}")]
    Unavailable { catalog_id: String, reason: String },

    /// A structural rule of the registration would be broken.
    #[error("Registration is invalid: {0}")]
    InvariantViolation(String),

    /// A selection references an id that is no longer in the catalog.
    #[error("Selection for {key} references {catalog_id}, which is not in the current catalog")]
    StaleCatalogReference { key: String, catalog_id: String },

    /// The fee rate tables are missing or invalid. Checkout must stop.
    #[error("Fee configuration error: {0}")]
    FeeConfiguration(String),

    /// The wizard cannot move in the requested direction.
    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    /// Field-level validation error.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

/// What kind of entity a `NotFound` refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Attendee,
    Item,
    Package,
    Selection,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Attendee => write!(f, "Attendee"),
            EntityKind::Item => write!(f, "Item"),
            EntityKind::Package => write!(f, "Package"),
            EntityKind::Selection => write!(f, "Selection"),
        }
    }
}

impl EngineError {
    pub(crate) fn attendee_not_found(id: impl Into<String>) -> Self {
        EngineError::NotFound {
            kind: EntityKind::Attendee,
            id: id.into(),
        }
    }

    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        EngineError::InvariantViolation(message.into())
    }

    /// Returns true if the error should become a field-level validation
    /// message and the mutation that caused it was rejected without effect.
    pub fn is_field_level(&self) -> bool {
        matches!(
            self,
            EngineError::NotFound { .. }
                | EngineError::IneligibleSelection { .. }
                | EngineError::Unavailable { .. }
                | EngineError::Validation(_)
        )
    }

    /// Returns true if the error must block progression to the next step.
    ///
    /// Fee configuration errors produce a non-dismissable error state rather
    /// than letting checkout continue at an incorrect price.
    pub fn is_blocking(&self) -> bool {
        matches!(
            self,
            EngineError::InvariantViolation(_) | EngineError::FeeConfiguration(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These errors occur when user input doesn't meet requirements.
/// Each variant names the offending field for the form to highlight.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., malformed email, unknown attendee type).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with EngineError.
pub type EngineResult<T> = Result<T, EngineError>;

// =============================================================================
// Unit Tests
// =============================================================================
