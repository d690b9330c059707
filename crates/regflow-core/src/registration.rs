//! # Registration
//!
//! The state container for one registration session. It owns the attendee
//! graph, the selection store, the billing record and the wizard position,
//! and is passed explicitly to whatever drives the wizard.
//!
//! ## Cross-Component Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  remove_attendee(A)      → graph removes A (and A's partner)            │
//! │                          → selections cleared for every removed id      │
//! │                                                                         │
//! │  select / toggle (key)   → purchaser type looked up from the graph,     │
//! │                            or from the bulk group for the bulk key      │
//! │                                                                         │
//! │  update primary contact  → billing re-synced while "bill to primary"    │
//! │                                                                         │
//! │  line_items / order      → recomputed from scratch on every call        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Step Guards
//! ```text
//!   TypeSelection   → AttendeeDetails   always
//!   AttendeeDetails → TicketSelection   graph valid for the mode, or a
//!                                       valid bulk group
//!   TicketSelection → OrderReview       every selection key non-empty
//!   OrderReview     → Payment           fee schedule valid, selections
//!                                       still eligible and available
//!   Payment         → Confirmation      only through `complete()`
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::attendee::{AttendeeGraph, AttendeePatch};
use crate::billing::{BillingDetails, BillingPatch, PaymentRequest};
use crate::catalog::Catalog;
use crate::derivation::{self, Derivation, DerivationScope, LineItem};
use crate::error::{EngineError, EngineResult, EntityKind};
use crate::pricing::{FeeMode, FeeSchedule, Order, PaymentOrigin};
use crate::selection::{Purchaser, Selection, SelectionKey, SelectionStore};
use crate::types::{AttendeeId, AttendeeType, ItemId, PackageId, RegistrationId, RegistrationMode};
use crate::validation;
use crate::wizard::WizardStep;
use crate::DEFAULT_LODGE_MINIMUM;

/// Snapshot layout version. Bump when a field changes meaning.
pub const SNAPSHOT_VERSION: u32 = 1;

// =============================================================================
// Rules, Status, Bulk Group
// =============================================================================

/// Tunable registration rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRules {
    /// Members needed before a lodge registration can leave attendee details.
    pub lodge_minimum: u32,
}

impl Default for RegistrationRules {
    fn default() -> Self {
        RegistrationRules {
            lodge_minimum: DEFAULT_LODGE_MINIMUM,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationStatus {
    #[default]
    Draft,
    Completed,
}

/// A lodge buying tickets as a block before names are known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkGroup {
    pub headcount: u32,
    /// Type used for eligibility checks on the bulk key.
    pub attendee_type: AttendeeType,
    pub lodge_name: String,
}

// =============================================================================
// Registration
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Registration {
    id: RegistrationId,
    mode: RegistrationMode,
    step: WizardStep,
    status: RegistrationStatus,
    attendees: AttendeeGraph,
    selections: SelectionStore,
    bulk: Option<BulkGroup>,
    billing: BillingDetails,
    rules: RegistrationRules,
    confirmation_number: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Registration {
    /// A fresh registration whose type has just been chosen.
    pub fn start(mode: RegistrationMode, rules: RegistrationRules) -> Self {
        let now = Utc::now();
        let registration = Registration {
            id: RegistrationId::generate(),
            mode,
            step: WizardStep::AttendeeDetails,
            status: RegistrationStatus::Draft,
            attendees: AttendeeGraph::new(),
            selections: SelectionStore::new(),
            bulk: None,
            billing: BillingDetails::new(),
            rules,
            confirmation_number: None,
            created_at: now,
            updated_at: now,
        };
        info!(registration_id = %registration.id, mode = %mode, "Registration started");
        registration
    }

    pub fn id(&self) -> &RegistrationId {
        &self.id
    }

    pub fn mode(&self) -> RegistrationMode {
        self.mode
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn status(&self) -> RegistrationStatus {
        self.status
    }

    pub fn attendees(&self) -> &AttendeeGraph {
        &self.attendees
    }

    pub fn selections(&self) -> &SelectionStore {
        &self.selections
    }

    pub fn bulk_group(&self) -> Option<&BulkGroup> {
        self.bulk.as_ref()
    }

    pub fn billing(&self) -> &BillingDetails {
        &self.billing
    }

    pub fn rules(&self) -> RegistrationRules {
        self.rules
    }

    pub fn confirmation_number(&self) -> Option<&str> {
        self.confirmation_number.as_deref()
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    // =========================================================================
    // Registration Type
    // =========================================================================

    /// Chooses the registration type from the first step.
    ///
    /// Switching to a different type discards attendees and selections.
    pub fn choose_mode(&mut self, mode: RegistrationMode) -> EngineResult<()> {
        self.ensure_draft()?;
        if self.step != WizardStep::TypeSelection {
            return Err(EngineError::InvalidTransition {
                from: self.step.to_string(),
                to: WizardStep::AttendeeDetails.to_string(),
            });
        }
        if mode != self.mode {
            self.attendees.clear();
            self.selections.clear_all();
            self.bulk = None;
            self.mode = mode;
        }
        self.move_to(WizardStep::AttendeeDetails);
        Ok(())
    }

    // =========================================================================
    // Attendees
    // =========================================================================

    pub fn add_attendee(&mut self, attendee_type: AttendeeType) -> EngineResult<AttendeeId> {
        self.ensure_editable()?;
        let id = self.attendees.add_attendee(attendee_type);
        self.touch();
        Ok(id)
    }

    pub fn add_partner(
        &mut self,
        owner: &AttendeeId,
        attendee_type: AttendeeType,
    ) -> EngineResult<AttendeeId> {
        self.ensure_editable()?;
        let id = self.attendees.add_partner(owner, attendee_type)?;
        self.touch();
        Ok(id)
    }

    /// Merges `patch` into the attendee.
    ///
    /// A type change keeps existing selections; eligibility is re-checked by
    /// [`Registration::revalidate`] before payment.
    pub fn update_attendee(&mut self, id: &AttendeeId, patch: AttendeePatch) -> EngineResult<()> {
        self.ensure_editable()?;
        self.attendees.update_attendee(id, patch)?;
        if let Some(primary) = self.attendees.primary().filter(|p| &p.id == id) {
            self.billing.sync_from_primary(primary);
        }
        self.touch();
        Ok(())
    }

    /// Removes an attendee (and partner) and clears their selections.
    pub fn remove_attendee(&mut self, id: &AttendeeId) -> EngineResult<Vec<AttendeeId>> {
        self.ensure_editable()?;
        let removed = self.attendees.remove_attendee(id)?;
        for gone in &removed {
            self.selections.clear(&SelectionKey::attendee(gone));
        }
        if self.attendees.is_empty() {
            self.billing.detach();
        }
        self.touch();
        Ok(removed)
    }

    // =========================================================================
    // Bulk Group
    // =========================================================================

    /// Switches a lodge registration to bulk purchasing.
    ///
    /// Per-attendee selections are dropped: in bulk mode the bulk key is the
    /// only selection key.
    pub fn set_bulk_group(&mut self, group: BulkGroup) -> EngineResult<()> {
        self.ensure_editable()?;
        if self.mode != RegistrationMode::Lodge {
            return Err(EngineError::invariant(format!(
                "bulk purchasing is only available to lodge registrations, not {}",
                self.mode
            )));
        }
        validation::validate_headcount(group.headcount, self.rules.lodge_minimum)?;
        validation::validate_required("lodge name", &group.lodge_name)?;

        self.selections.retain_keys(&[SelectionKey::Bulk]);
        debug!(
            headcount = group.headcount,
            lodge = %group.lodge_name,
            "Bulk group set"
        );
        self.bulk = Some(group);
        self.touch();
        Ok(())
    }

    /// Returns to per-attendee purchasing.
    pub fn clear_bulk_group(&mut self) -> EngineResult<()> {
        self.ensure_editable()?;
        if self.bulk.take().is_some() {
            self.selections.clear(&SelectionKey::Bulk);
            debug!("Bulk group cleared");
            self.touch();
        }
        Ok(())
    }

    // =========================================================================
    // Selections
    // =========================================================================

    pub fn select_package(
        &mut self,
        key: &SelectionKey,
        package_id: &PackageId,
        catalog: &Catalog,
    ) -> EngineResult<()> {
        self.ensure_editable()?;
        let purchaser = self.purchaser(key)?;
        self.selections
            .select_package(key, package_id, purchaser, catalog)?;
        self.touch();
        Ok(())
    }

    pub fn toggle_item(
        &mut self,
        key: &SelectionKey,
        item_id: &ItemId,
        catalog: &Catalog,
    ) -> EngineResult<()> {
        self.ensure_editable()?;
        let purchaser = self.purchaser(key)?;
        self.selections
            .toggle_item(key, item_id, purchaser, catalog)?;
        self.touch();
        Ok(())
    }

    pub fn clear_selection(&mut self, key: &SelectionKey) -> EngineResult<()> {
        self.ensure_editable()?;
        self.purchaser(key)?;
        self.selections.clear(key);
        self.touch();
        Ok(())
    }

    /// Who is buying under `key`, and how many tickets one selection means.
    fn purchaser(&self, key: &SelectionKey) -> EngineResult<Purchaser> {
        match (key, &self.bulk) {
            (SelectionKey::Bulk, Some(group)) => Ok(Purchaser {
                attendee_type: group.attendee_type,
                quantity: group.headcount,
            }),
            (SelectionKey::Bulk, None) => Err(EngineError::NotFound {
                kind: EntityKind::Selection,
                id: key.to_string(),
            }),
            (SelectionKey::Attendee(_), Some(_)) => Err(EngineError::invariant(
                "a bulk registration only takes selections for the bulk group",
            )),
            (SelectionKey::Attendee(id), None) => {
                let attendee = self.attendees.require(id)?;
                Ok(Purchaser {
                    attendee_type: attendee.attendee_type,
                    quantity: 1,
                })
            }
        }
    }

    // =========================================================================
    // Billing
    // =========================================================================

    /// Ticks "bill to primary" and copies the primary's contact details.
    pub fn bill_to_primary(&mut self) -> EngineResult<()> {
        self.ensure_draft()?;
        let primary = self
            .attendees
            .primary()
            .ok_or_else(|| EngineError::invariant("there is no primary attendee to bill"))?;
        self.billing.bill_to_primary(primary);
        self.touch();
        Ok(())
    }

    /// Edits billing details, detaching them from the primary attendee.
    pub fn update_billing(&mut self, patch: BillingPatch) -> EngineResult<()> {
        self.ensure_draft()?;
        self.billing.update(patch)?;
        self.touch();
        Ok(())
    }

    pub fn detach_billing(&mut self) -> EngineResult<()> {
        self.ensure_draft()?;
        self.billing.detach();
        self.touch();
        Ok(())
    }

    /// Payment origin implied by the billing country.
    pub fn payment_origin(&self, domestic_country: &str) -> PaymentOrigin {
        PaymentOrigin::from_is_domestic(self.billing.is_domestic(domestic_country))
    }

    // =========================================================================
    // Derived Views
    // =========================================================================

    pub fn scope(&self) -> DerivationScope {
        match &self.bulk {
            Some(group) => DerivationScope::Bulk {
                headcount: group.headcount,
            },
            None => DerivationScope::PerAttendee(self.mode),
        }
    }

    /// Selection keys that must be filled before the order can be reviewed.
    pub fn selection_keys(&self) -> Vec<SelectionKey> {
        self.scope()
            .keys(&self.attendees)
            .into_iter()
            .map(|(key, _)| key)
            .collect()
    }

    pub fn is_selection_complete(&self) -> bool {
        let keys = self.selection_keys();
        !keys.is_empty() && self.selections.is_complete(&keys)
    }

    pub fn derive(&self, catalog: &Catalog) -> Derivation {
        derivation::derive(&self.attendees, &self.selections, catalog, self.scope())
    }

    pub fn line_items(&self, catalog: &Catalog) -> Vec<LineItem> {
        derivation::derive_line_items(&self.attendees, &self.selections, catalog, self.scope())
    }

    /// Prices the current selections.
    pub fn order(
        &self,
        catalog: &Catalog,
        schedule: &FeeSchedule,
        fee_mode: FeeMode,
        origin: PaymentOrigin,
    ) -> EngineResult<Order> {
        Order::price(self.line_items(catalog), schedule, fee_mode, origin)
    }

    /// Builds the outbound payment request from a priced order.
    ///
    /// Billing details must be complete.
    pub fn payment_request(&self, order: &Order, currency: &str) -> EngineResult<PaymentRequest> {
        if self.step != WizardStep::Payment {
            return Err(EngineError::InvalidTransition {
                from: self.step.to_string(),
                to: WizardStep::Payment.to_string(),
            });
        }
        self.billing.validate()?;
        Ok(PaymentRequest {
            total_payable_minor_units: order.totals.total,
            billing_details: self.billing.clone(),
            currency: currency.to_string(),
        })
    }

    /// Re-checks every selection against the catalog as it is now.
    ///
    /// Demand is aggregated per item across all keys, so two attendees
    /// picking the last ticket are caught. References the catalog no longer
    /// has are left to derivation, which drops them.
    pub fn revalidate(&self, catalog: &Catalog) -> EngineResult<()> {
        let mut demand: BTreeMap<ItemId, u32> = BTreeMap::new();

        for (key, quantity) in self.scope().keys(&self.attendees) {
            let purchaser = self.purchaser(&key)?;
            match self.selections.get(&key) {
                Selection::Package { id } => {
                    let Some(package) = catalog.package(&id) else {
                        continue;
                    };
                    if !package.is_eligible(purchaser.attendee_type) {
                        return Err(EngineError::IneligibleSelection {
                            catalog_id: id.to_string(),
                            attendee_type: purchaser.attendee_type.to_string(),
                        });
                    }
                    if let Some(reason) = catalog.package_unavailable_reason(package, quantity) {
                        return Err(EngineError::Unavailable {
                            catalog_id: id.to_string(),
                            reason,
                        });
                    }
                    for included in &package.includes {
                        *demand.entry(included.clone()).or_default() += quantity;
                    }
                }
                Selection::Items { ids } => {
                    for id in ids {
                        let Some(item) = catalog.item(&id) else {
                            continue;
                        };
                        if !item.is_eligible(purchaser.attendee_type) {
                            return Err(EngineError::IneligibleSelection {
                                catalog_id: id.to_string(),
                                attendee_type: purchaser.attendee_type.to_string(),
                            });
                        }
                        *demand.entry(id).or_default() += quantity;
                    }
                }
            }
        }

        for (id, wanted) in demand {
            if let Some(reason) = catalog.item(&id).and_then(|i| i.unavailable_reason(wanted)) {
                return Err(EngineError::Unavailable {
                    catalog_id: id.to_string(),
                    reason,
                });
            }
        }
        Ok(())
    }

    // =========================================================================
    // Wizard
    // =========================================================================

    /// Moves to the next step if the guard for the current step passes.
    pub fn advance(&mut self, catalog: &Catalog, schedule: &FeeSchedule) -> EngineResult<WizardStep> {
        self.ensure_draft()?;
        let next = self.step.forward()?;

        match self.step {
            WizardStep::TypeSelection => {}
            WizardStep::AttendeeDetails => self.check_attendees()?,
            WizardStep::TicketSelection => {
                if !self.is_selection_complete() {
                    return Err(EngineError::invariant(
                        "every attendee needs a package or at least one ticket",
                    ));
                }
            }
            WizardStep::OrderReview => {
                schedule.validate()?;
                self.revalidate(catalog)?;
            }
            WizardStep::Payment | WizardStep::Confirmation => {
                return Err(EngineError::InvalidTransition {
                    from: self.step.to_string(),
                    to: next.to_string(),
                });
            }
        }

        self.move_to(next);
        Ok(next)
    }

    /// Moves to the immediately preceding step.
    pub fn back(&mut self) -> EngineResult<WizardStep> {
        self.ensure_draft()?;
        let previous = self.step.backward()?;
        self.move_to(previous);
        Ok(previous)
    }

    fn check_attendees(&self) -> EngineResult<()> {
        match &self.bulk {
            Some(group) => {
                validation::validate_headcount(group.headcount, self.rules.lodge_minimum)?;
                self.attendees.validate_links()
            }
            None => self
                .attendees
                .validate_for_progression(self.mode, self.rules.lodge_minimum as usize),
        }
    }

    /// Marks payment as confirmed. Terminal.
    pub fn complete(&mut self, confirmation_number: impl Into<String>) -> EngineResult<()> {
        self.ensure_draft()?;
        if self.step != WizardStep::Payment {
            return Err(EngineError::InvalidTransition {
                from: self.step.to_string(),
                to: WizardStep::Confirmation.to_string(),
            });
        }
        self.confirmation_number = Some(confirmation_number.into());
        self.status = RegistrationStatus::Completed;
        self.move_to(WizardStep::Confirmation);
        Ok(())
    }

    /// Starts over with a fresh id, keeping only the rules.
    pub fn reset(&mut self) {
        let previous = self.id.clone();
        *self = Registration::start(self.mode, self.rules);
        self.step = WizardStep::TypeSelection;
        info!(previous = %previous, registration_id = %self.id, "Registration reset");
    }

    fn move_to(&mut self, step: WizardStep) {
        info!(
            registration_id = %self.id,
            from = %self.step,
            to = %step,
            "Wizard step changed"
        );
        self.step = step;
        self.touch();
    }

    fn ensure_draft(&self) -> EngineResult<()> {
        if self.status == RegistrationStatus::Completed {
            return Err(EngineError::invariant(
                "this registration is complete; start a new one",
            ));
        }
        Ok(())
    }

    fn ensure_editable(&self) -> EngineResult<()> {
        self.ensure_draft()?;
        if !self.step.allows_edits() {
            return Err(EngineError::invariant(format!(
                "attendees and tickets cannot be changed during {}",
                self.step
            )));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    // =========================================================================
    // Snapshots
    // =========================================================================

    pub fn snapshot(&self) -> DraftSnapshot {
        DraftSnapshot {
            version: SNAPSHOT_VERSION,
            id: self.id.clone(),
            mode: self.mode,
            step: self.step,
            attendees: self.attendees.clone(),
            selections: self.selections.clone(),
            bulk: self.bulk.clone(),
            billing: self.billing.clone(),
            rules: self.rules,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// Rebuilds a registration from a saved draft.
    ///
    /// Selections whose key no longer belongs to the registration are dropped.
    pub fn restore(snapshot: DraftSnapshot) -> EngineResult<Registration> {
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(EngineError::invariant(format!(
                "draft was saved by a newer version (layout {})",
                snapshot.version
            )));
        }
        if snapshot.step.is_terminal() {
            return Err(EngineError::invariant(
                "a confirmed registration cannot be resumed",
            ));
        }
        if snapshot.bulk.is_some() && snapshot.mode != RegistrationMode::Lodge {
            return Err(EngineError::invariant(format!(
                "a bulk group is only valid for lodge registrations, draft is {}",
                snapshot.mode
            )));
        }
        snapshot.attendees.validate_links()?;

        let mut registration = Registration {
            id: snapshot.id,
            mode: snapshot.mode,
            step: snapshot.step,
            status: RegistrationStatus::Draft,
            attendees: snapshot.attendees,
            selections: snapshot.selections,
            bulk: snapshot.bulk,
            billing: snapshot.billing,
            rules: snapshot.rules,
            confirmation_number: None,
            created_at: snapshot.created_at,
            updated_at: snapshot.updated_at,
        };

        let keys = registration.selection_keys();
        let before = registration.selections.iter().count();
        registration.selections.retain_keys(&keys);
        let dropped = before - registration.selections.iter().count();
        if dropped > 0 {
            warn!(
                registration_id = %registration.id,
                dropped,
                "Draft selections without a matching attendee were dropped"
            );
        }

        debug!(registration_id = %registration.id, step = %registration.step, "Draft restored");
        Ok(registration)
    }
}

// =============================================================================
// Draft Snapshot
// =============================================================================

/// The serializable form of a draft registration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSnapshot {
    pub version: u32,
    pub id: RegistrationId,
    pub mode: RegistrationMode,
    pub step: WizardStep,
    pub attendees: AttendeeGraph,
    pub selections: SelectionStore,
    #[serde(default)]
    pub bulk: Option<BulkGroup>,
    #[serde(default)]
    pub billing: BillingDetails,
    #[serde(default)]
    pub rules: RegistrationRules,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::billing::CountryRef;
    use crate::catalog::{Item, ItemStatus, Package};
    use crate::money::Money;
    use crate::pricing::{FeeBasis, RateTable};
    use std::collections::BTreeSet;

    fn members() -> BTreeSet<AttendeeType> {
        BTreeSet::from([
            AttendeeType::PrimaryMember,
            AttendeeType::SecondaryMember,
            AttendeeType::OfficialDelegate,
        ])
    }

    fn catalog() -> Catalog {
        let everyone: BTreeSet<AttendeeType> = AttendeeType::ALL.into_iter().collect();
        Catalog::new(
            "grand-installation",
            vec![
                Item {
                    id: ItemId::from("installation"),
                    name: "Installation".into(),
                    description: None,
                    price: Money::from_minor(12_000),
                    eligibility: members(),
                    available: None,
                    status: ItemStatus::Active,
                },
                Item {
                    id: ItemId::from("banquet"),
                    name: "Banquet".into(),
                    description: None,
                    price: Money::from_minor(18_000),
                    eligibility: everyone.clone(),
                    available: Some(1),
                    status: ItemStatus::Active,
                },
            ],
            vec![Package {
                id: PackageId::from("weekend"),
                name: "Full Weekend".into(),
                price: Money::from_minor(25_000),
                includes: vec![ItemId::from("installation")],
                eligibility: members(),
                description: None,
                status: ItemStatus::Active,
            }],
        )
    }

    fn schedule() -> FeeSchedule {
        FeeSchedule::new(
            FeeBasis::Subtotal,
            RateTable::new(175, 30),
            RateTable::new(350, 30),
        )
    }

    #[test]
    fn test_remove_attendee_clears_selections() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        let guest = reg.add_attendee(AttendeeType::Guest).unwrap();
        let partner = reg.add_partner(&guest, AttendeeType::Partner).unwrap();

        reg.toggle_item(&SelectionKey::attendee(&guest), &ItemId::from("banquet"), &catalog)
            .unwrap();
        reg.select_package(&SelectionKey::attendee(&primary), &PackageId::from("weekend"), &catalog)
            .unwrap();

        let removed = reg.remove_attendee(&guest).unwrap();
        assert_eq!(removed, vec![guest.clone(), partner.clone()]);
        assert!(reg.selections().get(&SelectionKey::attendee(&guest)).is_empty());
        assert_eq!(reg.line_items(&catalog).len(), 1);
    }

    #[test]
    fn test_guest_cannot_select_member_package() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        let guest = reg.add_attendee(AttendeeType::Guest).unwrap();
        let key = SelectionKey::attendee(&guest);

        reg.toggle_item(&key, &ItemId::from("banquet"), &catalog).unwrap();
        let err = reg
            .select_package(&key, &PackageId::from("weekend"), &catalog)
            .unwrap_err();
        assert!(matches!(err, EngineError::IneligibleSelection { .. }));
        assert_eq!(reg.selections().get(&key).line_count(), 1);
    }

    #[test]
    fn test_lodge_minimum_blocks_progression() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Lodge, RegistrationRules::default());
        let first = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.add_attendee(AttendeeType::SecondaryMember).unwrap();
        reg.add_partner(&first, AttendeeType::Partner).unwrap();

        let err = reg.advance(&catalog, &schedule()).unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
        assert_eq!(reg.step(), WizardStep::AttendeeDetails);

        reg.add_attendee(AttendeeType::SecondaryMember).unwrap();
        assert_eq!(
            reg.advance(&catalog, &schedule()).unwrap(),
            WizardStep::TicketSelection
        );
    }

    #[test]
    fn test_bulk_order_prices_per_head() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Lodge, RegistrationRules::default());
        reg.set_bulk_group(BulkGroup {
            headcount: 30,
            attendee_type: AttendeeType::SecondaryMember,
            lodge_name: "Lodge Harmony No. 12".into(),
        })
        .unwrap();
        reg.select_package(&SelectionKey::Bulk, &PackageId::from("weekend"), &catalog)
            .unwrap();

        let order = reg
            .order(&catalog, &schedule(), FeeMode::Absorbed, PaymentOrigin::Domestic)
            .unwrap();
        assert_eq!(order.line_items.len(), 1);
        assert_eq!(order.line_items[0].quantity, 30);
        assert_eq!(order.totals.subtotal.minor(), 750_000);
        assert_eq!(order.totals.total, order.totals.subtotal);
    }

    #[test]
    fn test_bulk_rejects_attendee_keys_and_small_groups() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Lodge, RegistrationRules::default());
        let id = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();

        assert!(reg
            .set_bulk_group(BulkGroup {
                headcount: 2,
                attendee_type: AttendeeType::SecondaryMember,
                lodge_name: "Lodge Harmony".into(),
            })
            .is_err());

        reg.set_bulk_group(BulkGroup {
            headcount: 10,
            attendee_type: AttendeeType::SecondaryMember,
            lodge_name: "Lodge Harmony".into(),
        })
        .unwrap();
        assert!(reg
            .toggle_item(&SelectionKey::attendee(&id), &ItemId::from("banquet"), &catalog)
            .is_err());
        assert_eq!(reg.selection_keys(), vec![SelectionKey::Bulk]);
    }

    #[test]
    fn test_bulk_requires_lodge_mode() {
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let err = reg
            .set_bulk_group(BulkGroup {
                headcount: 10,
                attendee_type: AttendeeType::SecondaryMember,
                lodge_name: "Lodge Harmony".into(),
            })
            .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn test_oversized_bulk_order_errors_instead_of_panicking() {
        let everyone: BTreeSet<AttendeeType> = AttendeeType::ALL.into_iter().collect();
        let catalog = Catalog::new(
            "grand-installation",
            vec![Item {
                id: ItemId::from("gala"),
                name: "Gala".into(),
                description: None,
                price: Money::from_minor(i64::MAX / 100),
                eligibility: everyone,
                available: None,
                status: ItemStatus::Active,
            }],
            vec![],
        );
        let mut reg = Registration::start(RegistrationMode::Lodge, RegistrationRules::default());
        reg.set_bulk_group(BulkGroup {
            headcount: 500,
            attendee_type: AttendeeType::SecondaryMember,
            lodge_name: "Lodge Harmony".into(),
        })
        .unwrap();
        reg.toggle_item(&SelectionKey::Bulk, &ItemId::from("gala"), &catalog)
            .unwrap();

        let lines = reg.line_items(&catalog);
        assert_eq!(lines[0].line_total().minor(), i64::MAX);
        assert!(lines[0].checked_line_total().is_none());

        let err = reg
            .order(&catalog, &schedule(), FeeMode::Absorbed, PaymentOrigin::Domestic)
            .unwrap_err();
        assert!(matches!(err, EngineError::InvariantViolation(_)));
    }

    #[test]
    fn test_full_wizard_walk() {
        let catalog = catalog();
        let schedule = schedule();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.update_attendee(
            &primary,
            AttendeePatch {
                first_name: Some("William".into()),
                last_name: Some("Preston".into()),
                email: Some("w.preston@example.org".into()),
                ..Default::default()
            },
        )
        .unwrap();

        reg.advance(&catalog, &schedule).unwrap();
        let err = reg.advance(&catalog, &schedule).unwrap_err();
        assert!(err.is_blocking());

        reg.select_package(&SelectionKey::attendee(&primary), &PackageId::from("weekend"), &catalog)
            .unwrap();
        assert_eq!(reg.advance(&catalog, &schedule).unwrap(), WizardStep::OrderReview);
        assert_eq!(reg.advance(&catalog, &schedule).unwrap(), WizardStep::Payment);

        assert!(reg
            .add_attendee(AttendeeType::Guest)
            .is_err());
        assert!(matches!(
            reg.advance(&catalog, &schedule),
            Err(EngineError::InvalidTransition { .. })
        ));

        reg.bill_to_primary().unwrap();
        reg.update_billing(BillingPatch {
            address_line1: Some("1 Lodge St".into()),
            city: Some("Sydney".into()),
            postcode: Some("2000".into()),
            country: Some(CountryRef::new("AU", "Australia")),
            ..Default::default()
        })
        .unwrap();

        let origin = reg.payment_origin("AU");
        assert_eq!(origin, PaymentOrigin::Domestic);
        let order = reg
            .order(&catalog, &schedule, FeeMode::PassedToCustomer, origin)
            .unwrap();
        let request = reg.payment_request(&order, "AUD").unwrap();
        assert_eq!(request.total_payable_minor_units, order.totals.total);
        assert_eq!(request.total_payable_minor_units.minor(), 25_000 + 438 + 30);

        reg.complete("CONF-0001").unwrap();
        assert_eq!(reg.step(), WizardStep::Confirmation);
        assert_eq!(reg.status(), RegistrationStatus::Completed);
        assert!(reg.back().is_err());
        let billed = reg.billing().clone();
        assert!(reg.detach_billing().is_err());
        assert_eq!(reg.billing(), &billed);
        assert!(Registration::restore(reg.snapshot()).is_err());
    }

    #[test]
    fn test_review_blocked_by_missing_fee_table() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.advance(&catalog, &schedule()).unwrap();
        reg.select_package(&SelectionKey::attendee(&primary), &PackageId::from("weekend"), &catalog)
            .unwrap();
        reg.advance(&catalog, &schedule()).unwrap();

        let broken = FeeSchedule {
            international: None,
            ..schedule()
        };
        let err = reg.advance(&catalog, &broken).unwrap_err();
        assert!(matches!(err, EngineError::FeeConfiguration(_)));
        assert_eq!(reg.step(), WizardStep::OrderReview);
    }

    #[test]
    fn test_revalidate_aggregates_demand() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let a = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        let b = reg.add_attendee(AttendeeType::Guest).unwrap();
        let banquet = ItemId::from("banquet");

        reg.toggle_item(&SelectionKey::attendee(&a), &banquet, &catalog).unwrap();
        reg.toggle_item(&SelectionKey::attendee(&b), &banquet, &catalog).unwrap();

        let err = reg.revalidate(&catalog).unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { .. }));
    }

    #[test]
    fn test_revalidate_catches_type_change() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        let second = reg.add_attendee(AttendeeType::SecondaryMember).unwrap();
        reg.select_package(&SelectionKey::attendee(&second), &PackageId::from("weekend"), &catalog)
            .unwrap();
        assert!(reg.revalidate(&catalog).is_ok());

        reg.update_attendee(
            &second,
            AttendeePatch {
                attendee_type: Some(AttendeeType::Guest),
                ..Default::default()
            },
        )
        .unwrap();
        assert!(matches!(
            reg.revalidate(&catalog),
            Err(EngineError::IneligibleSelection { .. })
        ));
    }

    #[test]
    fn test_snapshot_round_trip() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Delegation, RegistrationRules::default());
        let head = reg.add_attendee(AttendeeType::OfficialDelegate).unwrap();
        let second = reg.add_attendee(AttendeeType::OfficialDelegate).unwrap();
        reg.update_attendee(
            &second,
            AttendeePatch {
                protocol_rank: Some(1),
                ..Default::default()
            },
        )
        .unwrap();
        reg.select_package(&SelectionKey::attendee(&head), &PackageId::from("weekend"), &catalog)
            .unwrap();
        reg.toggle_item(&SelectionKey::attendee(&second), &ItemId::from("banquet"), &catalog)
            .unwrap();

        let json = serde_json::to_string(&reg.snapshot()).unwrap();
        let restored = Registration::restore(serde_json::from_str(&json).unwrap()).unwrap();

        assert_eq!(restored.line_items(&catalog), reg.line_items(&catalog));
        assert_eq!(restored, reg);
    }

    #[test]
    fn test_restore_rejects_bulk_outside_lodge_mode() {
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        reg.add_attendee(AttendeeType::PrimaryMember).unwrap();

        let mut snapshot = reg.snapshot();
        snapshot.bulk = Some(BulkGroup {
            headcount: 10,
            attendee_type: AttendeeType::SecondaryMember,
            lodge_name: "Lodge Harmony".into(),
        });
        assert!(matches!(
            Registration::restore(snapshot.clone()),
            Err(EngineError::InvariantViolation(_))
        ));

        snapshot.mode = RegistrationMode::Lodge;
        assert!(Registration::restore(snapshot).is_ok());
    }

    #[test]
    fn test_restore_drops_orphan_selections() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.select_package(&SelectionKey::attendee(&primary), &PackageId::from("weekend"), &catalog)
            .unwrap();

        let mut snapshot = reg.snapshot();
        snapshot.attendees = AttendeeGraph::new();
        let restored = Registration::restore(snapshot).unwrap();
        assert_eq!(restored.selections().iter().count(), 0);
    }

    #[test]
    fn test_back_and_reset() {
        let catalog = catalog();
        let mut reg = Registration::start(RegistrationMode::Lodge, RegistrationRules::default());
        reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        assert_eq!(reg.back().unwrap(), WizardStep::TypeSelection);
        assert!(reg.back().is_err());

        reg.choose_mode(RegistrationMode::Individual).unwrap();
        assert!(reg.attendees().is_empty());
        assert_eq!(reg.step(), WizardStep::AttendeeDetails);

        reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.advance(&catalog, &schedule()).unwrap();
        let old_id = reg.id().clone();
        reg.reset();
        assert_ne!(reg.id(), &old_id);
        assert_eq!(reg.step(), WizardStep::TypeSelection);
        assert!(reg.attendees().is_empty());
    }

    #[test]
    fn test_billing_follows_primary_until_detached() {
        let mut reg = Registration::start(RegistrationMode::Individual, RegistrationRules::default());
        let primary = reg.add_attendee(AttendeeType::PrimaryMember).unwrap();
        reg.bill_to_primary().unwrap();
        reg.update_attendee(
            &primary,
            AttendeePatch {
                first_name: Some("Ada".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(reg.billing().first_name, "Ada");

        reg.detach_billing().unwrap();
        reg.update_attendee(
            &primary,
            AttendeePatch {
                first_name: Some("Grace".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(reg.billing().first_name, "Ada");
    }
}
