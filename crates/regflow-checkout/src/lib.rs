//! # regflow-checkout: Collaborator Seams
//!
//! Runs a registration against the outside world: the function's catalog,
//! the live availability feed, the payment processor and draft storage.
//! Every rule and every number still comes from `regflow-core`.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        CheckoutService                                  │
//! │                                                                         │
//! │   CheckoutConfig ──► fee schedule, fee mode, currency, lodge minimum    │
//! │                                                                         │
//! │   ┌───────────────┐   ┌────────────────────┐   ┌──────────────────┐    │
//! │   │CatalogResolver│   │AvailabilityTracker │   │  PaymentGateway  │    │
//! │   │  resolve()    │   │  consume(stream)   │   │  charge()        │    │
//! │   └───────┬───────┘   └─────────┬──────────┘   └────────▲─────────┘    │
//! │           └──── catalog ◄───────┘                       │              │
//! │                    │                                    │              │
//! │                    ▼                                    │              │
//! │            Registration (core) ── PaymentRequest ───────┘              │
//! │                    │                                                    │
//! │                    ▼                                                    │
//! │               DraftStore  (save / load / discard)                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use regflow_checkout::{CheckoutConfig, CheckoutService, JsonFileDraftStore};
//!
//! let config = CheckoutConfig::load(None)?;
//! let drafts = JsonFileDraftStore::new(config.draft_directory().unwrap_or_default());
//! let service = CheckoutService::new("gi-2025", config, catalogs, gateway, Arc::new(drafts))?;
//!
//! let mut registration = service.start(RegistrationMode::Individual);
//! // ... attendees, tickets, billing, advance() through the wizard ...
//! let confirmation = service.submit(&mut registration).await?;
//! println!("Confirmed: {}", confirmation.confirmation_number);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod availability;
pub mod catalog;
pub mod config;
pub mod drafts;
pub mod error;
pub mod payment;
pub mod service;
pub mod telemetry;

// =============================================================================
// Re-exports
// =============================================================================

pub use availability::AvailabilityTracker;
pub use catalog::{check_catalog, CatalogResolver, StaticCatalogResolver};
pub use config::{CheckoutConfig, CurrencyConfig, DraftSettings, FeeSettings, RegistrationSettings};
pub use drafts::{DraftStore, JsonFileDraftStore, MemoryDraftStore};
pub use error::{CheckoutError, CheckoutResult};
pub use payment::{PaymentGateway, PaymentReceipt};
pub use service::{CheckoutService, Confirmation};
pub use telemetry::init_tracing;
