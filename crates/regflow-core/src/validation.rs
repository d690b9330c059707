//! # Validation Module
//!
//! Field-level input validation for attendee and billing forms.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Wizard UI                                                    │
//! │  ├── Widget-level checks (empty, length)                               │
//! │  └── Immediate feedback                                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Called before any mutation is applied                             │
//! │  └── A failure leaves registration state untouched                     │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Registration rules (attendee graph, selections, fees)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Longest single-line text field (names, titles, phone).
pub const MAX_SHORT_TEXT: usize = 120;

/// Longest free-text note (dietary, special needs).
pub const MAX_NOTES: usize = 500;

/// Largest bulk headcount a single lodge registration can carry.
pub const MAX_BULK_HEADCOUNT: u32 = 500;

/// Largest catalog price in minor units. A full bulk order of many lines at
/// this price still fits an i64.
pub const MAX_PRICE_MINOR: i64 = 100_000_000_000;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a single-line text field. Empty is allowed.
pub fn validate_short_text(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().chars().count() > MAX_SHORT_TEXT {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_SHORT_TEXT,
        });
    }
    Ok(())
}

/// Validates a free-text note. Empty is allowed.
pub fn validate_notes(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().chars().count() > MAX_NOTES {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max: MAX_NOTES,
        });
    }
    Ok(())
}

/// Validates a required single-line field.
///
/// ```rust
/// use regflow_core::validation::validate_required;
///
/// assert!(validate_required("first name", "Ada").is_ok());
/// assert!(validate_required("first name", "   ").is_err());
/// ```
pub fn validate_required(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    validate_short_text(field, value)
}

/// Validates an email address.
///
/// ## Rules
/// - Exactly one `@` with a non-empty local part
/// - Domain contains a dot that is neither first nor last
/// - No whitespace
///
/// ```rust
/// use regflow_core::validation::validate_email;
///
/// assert!(validate_email("secretary@lodge.org.au").is_ok());
/// assert!(validate_email("secretary@lodge").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }
    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let mut parts = email.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err(invalid("must contain a single @")),
    };
    if local.is_empty() {
        return Err(invalid("missing name before @"));
    }
    let dot_ok = domain
        .find('.')
        .is_some_and(|i| i > 0 && !domain.ends_with('.'));
    if !dot_ok {
        return Err(invalid("domain must look like example.org"));
    }

    validate_short_text("email", email)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates the headcount of a bulk lodge group.
pub fn validate_headcount(headcount: u32, minimum: u32) -> ValidationResult<()> {
    if headcount == 0 {
        return Err(ValidationError::MustBePositive {
            field: "headcount".to_string(),
        });
    }
    if headcount < minimum || headcount > MAX_BULK_HEADCOUNT {
        return Err(ValidationError::OutOfRange {
            field: "headcount".to_string(),
            min: i64::from(minimum),
            max: i64::from(MAX_BULK_HEADCOUNT),
        });
    }
    Ok(())
}

/// Validates a catalog price in minor units. Zero (free) is allowed.
pub fn validate_price_minor(minor: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_MINOR).contains(&minor) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_MINOR,
        });
    }
    Ok(())
}

/// Validates a percentage fee rate in basis points.
///
/// ## Rules
/// - Must be below 10000 (100%); a 100% fee cannot be grossed up
pub fn validate_rate_bps(field: &str, bps: u32) -> ValidationResult<()> {
    if bps >= 10_000 {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 9_999,
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
