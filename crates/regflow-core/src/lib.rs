//! # regflow-core: Registration Composition & Pricing Engine
//!
//! Pure rules for an event-registration checkout: who is attending, what
//! each of them picked, what that costs, and what the customer is charged.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Regflow Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Wizard UI (external)                         │   │
//! │  │  Type ─► Attendees ─► Tickets ─► Review ─► Payment ─► Confirm   │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            regflow-checkout (config, resolvers, drafts)         │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ regflow-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │  ┌──────────┐  ┌───────────┐  ┌────────────┐  ┌────────────┐   │   │
//! │  │  │ attendee │  │ selection │  │ derivation │  │  pricing   │   │   │
//! │  │  │  graph   │─►│   store   │─►│ line items │─►│ fee/totals │   │   │
//! │  │  └──────────┘  └───────────┘  └────────────┘  └────────────┘   │   │
//! │  │        registration (state container) + wizard (steps)         │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO NETWORK • NO FLOATING POINT MONEY                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`attendee`] - Attendee arena with partner links and display order
//! - [`selection`] - Package XOR items, per attendee or bulk block
//! - [`derivation`] - Line items derived on every read
//! - [`pricing`] - Subtotal, processor fee, payable total
//! - [`registration`] - The per-session state container and step guards
//! - [`catalog`], [`billing`], [`wizard`], [`money`], [`types`], [`error`],
//!   [`validation`]
//!
//! ## Example Usage
//!
//! ```rust
//! use regflow_core::pricing::{FeeBasis, FeeMode, FeeSchedule, PaymentOrigin, RateTable};
//!
//! let schedule = FeeSchedule::new(
//!     FeeBasis::Subtotal,
//!     RateTable::new(175, 30),
//!     RateTable::new(350, 30),
//! );
//! let totals = schedule
//!     .compute_totals(&[], FeeMode::PassedToCustomer, PaymentOrigin::Domestic)
//!     .unwrap();
//!
//! // Nothing selected, nothing charged
//! assert!(totals.total.is_zero());
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod attendee;
pub mod billing;
pub mod catalog;
pub mod derivation;
pub mod error;
pub mod money;
pub mod pricing;
pub mod registration;
pub mod selection;
pub mod types;
pub mod validation;
pub mod wizard;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use attendee::{Attendee, AttendeeGraph, AttendeePatch};
pub use billing::{BillingDetails, BillingPatch, CountryRef, PaymentRequest, StateRef};
pub use catalog::{AvailabilityUpdate, Catalog, Item, ItemStatus, Package};
pub use derivation::{DerivationScope, LineItem};
pub use error::{EngineError, EngineResult, ValidationError};
pub use money::Money;
pub use pricing::{FeeBasis, FeeMode, FeeSchedule, Order, PaymentOrigin, RateTable, Totals};
pub use registration::{BulkGroup, DraftSnapshot, Registration, RegistrationRules};
pub use selection::{Selection, SelectionKey, SelectionStore};
pub use types::*;
pub use wizard::WizardStep;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Non-partner, non-guest attendees a lodge registration needs by default.
pub const DEFAULT_LODGE_MINIMUM: u32 = 3;
