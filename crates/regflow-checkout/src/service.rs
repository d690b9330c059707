//! # Checkout Service
//!
//! Wires the engine to its collaborators for one function.
//!
//! ## Submission
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  submit(&mut registration)                                              │
//! │                                                                         │
//! │   1. resolve catalog again        (never trust the one from selection)  │
//! │   2. apply latest availability                                          │
//! │   3. validate fee schedule        ── FeeConfiguration stops here        │
//! │   4. revalidate selections        ── Ineligible / Unavailable stop here │
//! │   5. price order, build request   (billing country → payment origin)    │
//! │   6. charge                       ── declined: registration unchanged   │
//! │      receipt amount must match    ── AmountMismatch: not confirmed      │
//! │   7. complete + discard draft                                           │
//! │                                                                         │
//! │  Nothing outside the registration changes before step 6 succeeds.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;

use chrono::Utc;
use regflow_core::registration::{Registration, RegistrationStatus};
use regflow_core::{Catalog, Order, RegistrationId, RegistrationMode};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::availability::AvailabilityTracker;
use crate::catalog::{check_catalog, CatalogResolver};
use crate::config::CheckoutConfig;
use crate::drafts::DraftStore;
use crate::error::{CheckoutError, CheckoutResult};
use crate::payment::{PaymentGateway, PaymentReceipt};

/// Result of a successful submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Confirmation {
    pub registration_id: RegistrationId,
    pub confirmation_number: String,
    pub order: Order,
    pub receipt: PaymentReceipt,
}

pub struct CheckoutService {
    function_id: String,
    config: CheckoutConfig,
    catalogs: Arc<dyn CatalogResolver>,
    payments: Arc<dyn PaymentGateway>,
    drafts: Arc<dyn DraftStore>,
    availability: AvailabilityTracker,
}

impl CheckoutService {
    /// Builds the service. Fails on an invalid config, so a missing rate
    /// table is caught before anyone starts registering.
    pub fn new(
        function_id: impl Into<String>,
        config: CheckoutConfig,
        catalogs: Arc<dyn CatalogResolver>,
        payments: Arc<dyn PaymentGateway>,
        drafts: Arc<dyn DraftStore>,
    ) -> CheckoutResult<Self> {
        config.validate()?;
        Ok(CheckoutService {
            function_id: function_id.into(),
            config,
            catalogs,
            payments,
            drafts,
            availability: AvailabilityTracker::new(),
        })
    }

    /// Shares an existing tracker, typically one already fed by a stream.
    pub fn with_availability(mut self, tracker: AvailabilityTracker) -> Self {
        self.availability = tracker;
        self
    }

    pub fn function_id(&self) -> &str {
        &self.function_id
    }

    pub fn config(&self) -> &CheckoutConfig {
        &self.config
    }

    pub fn availability(&self) -> &AvailabilityTracker {
        &self.availability
    }

    // =========================================================================
    // Session Lifecycle
    // =========================================================================

    pub fn start(&self, mode: RegistrationMode) -> Registration {
        Registration::start(mode, self.config.rules())
    }

    /// Reloads a saved draft.
    pub async fn resume(&self, id: &RegistrationId) -> CheckoutResult<Registration> {
        let snapshot = self.drafts.load(id).await?;
        let registration = Registration::restore(snapshot)?;
        info!(registration_id = %id, step = %registration.step(), "Draft resumed");
        Ok(registration)
    }

    pub async fn save_draft(&self, registration: &Registration) -> CheckoutResult<()> {
        if registration.status() == RegistrationStatus::Completed {
            return Err(CheckoutError::AlreadyComplete(registration.id().clone()));
        }
        self.drafts.save(&registration.snapshot()).await
    }

    /// Abandons a registration. Only the saved draft is touched.
    pub async fn abandon(&self, id: &RegistrationId) -> CheckoutResult<()> {
        self.drafts.discard(id).await?;
        info!(registration_id = %id, "Registration abandoned");
        Ok(())
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// The catalog as of now, checked and with the latest availability applied.
    pub async fn catalog(&self) -> CheckoutResult<Catalog> {
        let mut catalog = self.catalogs.resolve(&self.function_id).await?;
        check_catalog(&catalog)?;
        self.availability.apply_to(&mut catalog).await;
        Ok(catalog)
    }

    /// Prices a registration the same way `submit` will charge it.
    pub async fn quote(&self, registration: &Registration) -> CheckoutResult<Order> {
        let catalog = self.catalog().await?;
        self.price(registration, &catalog)
    }

    fn price(&self, registration: &Registration, catalog: &Catalog) -> CheckoutResult<Order> {
        let origin = registration.payment_origin(&self.config.currency.domestic_country);
        Ok(registration.order(
            catalog,
            &self.config.fee_schedule(),
            self.config.fee_mode(),
            origin,
        )?)
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Charges the registration and marks it confirmed.
    ///
    /// On any error the registration is left as it was and nothing has been
    /// charged.
    pub async fn submit(&self, registration: &mut Registration) -> CheckoutResult<Confirmation> {
        if registration.status() == RegistrationStatus::Completed {
            return Err(CheckoutError::AlreadyComplete(registration.id().clone()));
        }
        let catalog = self.catalog().await?;
        let schedule = self.config.fee_schedule();
        schedule.validate()?;
        registration.revalidate(&catalog)?;

        let order = self.price(registration, &catalog)?;
        let request = registration.payment_request(&order, &self.config.currency.code)?;

        let receipt = if request.total_payable_minor_units.is_zero() {
            PaymentReceipt {
                reference: format!("NOCHARGE-{}", registration.id()),
                amount: request.total_payable_minor_units,
                currency: request.currency.clone(),
                charged_at: Utc::now(),
            }
        } else {
            self.payments.charge(&request).await?
        };

        if receipt.amount != request.total_payable_minor_units {
            error!(
                registration_id = %registration.id(),
                reference = %receipt.reference,
                requested = request.total_payable_minor_units.minor(),
                charged = receipt.amount.minor(),
                "Gateway charged a different amount than requested"
            );
            return Err(CheckoutError::AmountMismatch {
                reference: receipt.reference,
                requested: request.total_payable_minor_units.minor(),
                charged: receipt.amount.minor(),
            });
        }

        registration.complete(receipt.reference.clone())?;
        info!(
            registration_id = %registration.id(),
            total = order.totals.total.minor(),
            display_total = %self.config.currency.format_minor(order.totals.total),
            "Registration confirmed"
        );

        if let Err(e) = self.drafts.discard(registration.id()).await {
            warn!(registration_id = %registration.id(), error = %e, "Failed to discard draft");
        }

        Ok(Confirmation {
            registration_id: registration.id().clone(),
            confirmation_number: receipt.reference.clone(),
            order,
            receipt,
        })
    }
}
