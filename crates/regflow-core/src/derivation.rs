//! # Order Derivation
//!
//! Turns the attendee graph, the selection store and the catalog into the
//! ordered list of priced line items.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  DerivationScope ──► selection keys in display order                    │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  for each key:   Package(P) ──► 1 line  (bundle, never expanded)        │
//! │                  Items{..}  ──► 1 line per item, catalog order          │
//! │                  missing id ──► dropped + warn!  (stale reference)      │
//! │        │                                                                │
//! │        ▼                                                                │
//! │  Vec<LineItem>   quantity = 1 per attendee, headcount for bulk          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Derivation is a pure function of its inputs: it is re-run on every read
//! instead of being patched incrementally, so there is no cache to go stale.

use serde::{Deserialize, Serialize};
use tracing::warn;
use ts_rs::TS;

use crate::attendee::AttendeeGraph;
use crate::catalog::{Catalog, Item};
use crate::error::EngineError;
use crate::money::Money;
use crate::selection::{Selection, SelectionKey, SelectionStore};
use crate::types::RegistrationMode;

// =============================================================================
// Line Item
// =============================================================================

/// One priced row of the order. Derived, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    /// `{selection key}-{catalog id}`.
    pub id: String,
    pub catalog_id: String,
    pub name: String,
    pub unit_price: Money,
    pub quantity: u32,
    #[ts(as = "String")]
    pub selection_key: SelectionKey,
    pub is_package: bool,
    /// Included item names for a package, the item's own description otherwise.
    pub description: String,
}

impl LineItem {
    /// Saturates on overflow; see [`LineItem::checked_line_total`].
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }

    pub fn checked_line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Scope
// =============================================================================

/// Which selection keys take part in the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivationScope {
    /// One key per attendee, in display order for the mode.
    PerAttendee(RegistrationMode),
    /// The single bulk key, priced per head.
    Bulk { headcount: u32 },
}

impl DerivationScope {
    /// Selection keys in the order their lines appear, with their quantity.
    pub fn keys(&self, graph: &AttendeeGraph) -> Vec<(SelectionKey, u32)> {
        match *self {
            DerivationScope::PerAttendee(mode) => graph
                .order_for_display(mode)
                .into_iter()
                .map(|a| (SelectionKey::attendee(&a.id), 1))
                .collect(),
            DerivationScope::Bulk { headcount } => vec![(SelectionKey::Bulk, headcount)],
        }
    }
}

// =============================================================================
// Derivation
// =============================================================================

/// A selection that points at something the catalog no longer has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleReference {
    pub key: SelectionKey,
    pub catalog_id: String,
}

impl From<&StaleReference> for EngineError {
    fn from(stale: &StaleReference) -> Self {
        EngineError::StaleCatalogReference {
            key: stale.key.to_string(),
            catalog_id: stale.catalog_id.clone(),
        }
    }
}

/// Line items plus the references that had to be dropped to produce them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Derivation {
    pub line_items: Vec<LineItem>,
    pub stale: Vec<StaleReference>,
}

/// Derives the priced line items for the current state.
///
/// Stale references are dropped and logged; use [`derive`] to inspect them.
pub fn derive_line_items(
    graph: &AttendeeGraph,
    selections: &SelectionStore,
    catalog: &Catalog,
    scope: DerivationScope,
) -> Vec<LineItem> {
    derive(graph, selections, catalog, scope).line_items
}

/// Derives line items and reports every stale reference encountered.
pub fn derive(
    graph: &AttendeeGraph,
    selections: &SelectionStore,
    catalog: &Catalog,
    scope: DerivationScope,
) -> Derivation {
    let mut derivation = Derivation::default();

    for (key, quantity) in scope.keys(graph) {
        match selections.get(&key) {
            Selection::Package { id } => match catalog.package(&id) {
                Some(package) => {
                    let names = catalog.included_item_names(package);
                    let description = if names.is_empty() {
                        package
                            .description
                            .clone()
                            .unwrap_or_else(|| package.name.clone())
                    } else {
                        names.join(", ")
                    };
                    derivation.line_items.push(LineItem {
                        id: format!("{}-{}", key, id),
                        catalog_id: id.to_string(),
                        name: package.name.clone(),
                        unit_price: package.price,
                        quantity,
                        selection_key: key.clone(),
                        is_package: true,
                        description,
                    });
                }
                None => record_stale(&mut derivation, &key, id.to_string()),
            },
            Selection::Items { ids } => {
                let mut found: Vec<(usize, &Item)> = Vec::with_capacity(ids.len());
                for id in &ids {
                    match catalog.item_position(id).zip(catalog.item(id)) {
                        Some(entry) => found.push(entry),
                        None => record_stale(&mut derivation, &key, id.to_string()),
                    }
                }
                found.sort_by_key(|(position, _)| *position);

                derivation
                    .line_items
                    .extend(found.into_iter().map(|(_, item)| LineItem {
                        id: format!("{}-{}", key, item.id),
                        catalog_id: item.id.to_string(),
                        name: item.name.clone(),
                        unit_price: item.price,
                        quantity,
                        selection_key: key.clone(),
                        is_package: false,
                        description: item.display_description(),
                    }));
            }
        }
    }

    derivation
}

fn record_stale(derivation: &mut Derivation, key: &SelectionKey, catalog_id: String) {
    warn!(
        key = %key,
        catalog_id = %catalog_id,
        "Selection references an id missing from the catalog; dropping it"
    );
    derivation.stale.push(StaleReference {
        key: key.clone(),
        catalog_id,
    });
}

/// Sum of `unit_price × quantity` across all lines, saturating.
pub fn subtotal(line_items: &[LineItem]) -> Money {
    line_items.iter().map(LineItem::line_total).sum()
}

/// Like [`subtotal`], but `None` if any product or sum overflows.
pub fn checked_subtotal(line_items: &[LineItem]) -> Option<Money> {
    line_items
        .iter()
        .try_fold(Money::zero(), |acc, line| acc.checked_add(line.checked_line_total()?))
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{ItemStatus, Package};
    use crate::selection::Purchaser;
    use crate::types::{AttendeeType, ItemId, PackageId};

    fn catalog() -> Catalog {
        let item = |id: &str, price: i64, description: Option<&str>| Item {
            id: ItemId::from(id),
            name: format!("{} ticket", id),
            description: description.map(str::to_string),
            price: Money::from_minor(price),
            eligibility: AttendeeType::ALL.into_iter().collect(),
            available: None,
            status: ItemStatus::Active,
        };
        Catalog::new(
            "fn",
            vec![
                item("installation", 12_000, Some("Sunday installation ceremony")),
                item("banquet", 18_000, None),
                item("brunch", 6_000, None),
            ],
            vec![Package {
                id: PackageId::from("q"),
                name: "Lodge Package".to_string(),
                price: Money::from_minor(25_000),
                includes: vec![ItemId::from("installation"), ItemId::from("banquet")],
                eligibility: AttendeeType::ALL.into_iter().collect(),
                description: None,
                status: ItemStatus::Active,
            }],
        )
    }

    fn anyone() -> Purchaser {
        Purchaser {
            attendee_type: AttendeeType::PrimaryMember,
            quantity: 1,
        }
    }

    #[test]
    fn test_package_is_one_line_with_item_names() {
        let catalog = catalog();
        let mut graph = AttendeeGraph::new();
        let a = graph.add_attendee(AttendeeType::PrimaryMember);
        let mut store = SelectionStore::new();
        store
            .select_package(&(&a).into(), &PackageId::from("q"), anyone(), &catalog)
            .unwrap();

        let lines = derive_line_items(
            &graph,
            &store,
            &catalog,
            DerivationScope::PerAttendee(RegistrationMode::Individual),
        );
        assert_eq!(lines.len(), 1);
        assert!(lines[0].is_package);
        assert_eq!(lines[0].id, format!("{}-q", a));
        assert_eq!(lines[0].description, "installation ticket, banquet ticket");
        assert_eq!(lines[0].quantity, 1);
    }

    #[test]
    fn test_items_follow_catalog_order_and_attendee_order() {
        let catalog = catalog();
        let mut graph = AttendeeGraph::new();
        let a = graph.add_attendee(AttendeeType::PrimaryMember);
        let b = graph.add_attendee(AttendeeType::Guest);
        let partner = graph.add_partner(&a, AttendeeType::Partner).unwrap();
        let mut store = SelectionStore::new();

        for id in ["brunch", "installation"] {
            store
                .toggle_item(&(&b).into(), &ItemId::from(id), anyone(), &catalog)
                .unwrap();
        }
        store
            .toggle_item(&(&partner).into(), &ItemId::from("banquet"), anyone(), &catalog)
            .unwrap();
        store
            .select_package(&(&a).into(), &PackageId::from("q"), anyone(), &catalog)
            .unwrap();

        let lines = derive_line_items(
            &graph,
            &store,
            &catalog,
            DerivationScope::PerAttendee(RegistrationMode::Individual),
        );
        let ids: Vec<&str> = lines.iter().map(|l| l.catalog_id.as_str()).collect();
        assert_eq!(ids, vec!["q", "banquet", "installation", "brunch"]);
        assert_eq!(lines[2].description, "Sunday installation ceremony");
        assert_eq!(lines[1].description, "banquet ticket");
    }

    #[test]
    fn test_stale_references_dropped_and_reported() {
        let mut catalog = catalog();
        let mut graph = AttendeeGraph::new();
        let a = graph.add_attendee(AttendeeType::PrimaryMember);
        let mut store = SelectionStore::new();
        for id in ["banquet", "brunch"] {
            store
                .toggle_item(&(&a).into(), &ItemId::from(id), anyone(), &catalog)
                .unwrap();
        }

        catalog.items.retain(|i| i.id.as_str() != "brunch");
        let derivation = derive(
            &graph,
            &store,
            &catalog,
            DerivationScope::PerAttendee(RegistrationMode::Individual),
        );
        assert_eq!(derivation.line_items.len(), 1);
        assert_eq!(derivation.stale.len(), 1);
        assert_eq!(derivation.stale[0].catalog_id, "brunch");

        let err = EngineError::from(&derivation.stale[0]);
        assert!(!err.is_blocking());
    }

    #[test]
    fn test_bulk_package_quantity_is_headcount() {
        let catalog = catalog();
        let graph = AttendeeGraph::new();
        let mut store = SelectionStore::new();
        store
            .select_package(
                &SelectionKey::Bulk,
                &PackageId::from("q"),
                Purchaser {
                    attendee_type: AttendeeType::PrimaryMember,
                    quantity: 30,
                },
                &catalog,
            )
            .unwrap();

        let lines = derive_line_items(
            &graph,
            &store,
            &catalog,
            DerivationScope::Bulk { headcount: 30 },
        );
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].quantity, 30);
        assert_eq!(lines[0].id, "bulk-q");
        assert_eq!(lines[0].line_total().minor(), 750_000);
        assert_eq!(subtotal(&lines).minor(), 750_000);
    }

    #[test]
    fn test_selections_outside_scope_are_ignored() {
        let catalog = catalog();
        let mut graph = AttendeeGraph::new();
        let a = graph.add_attendee(AttendeeType::PrimaryMember);
        let mut store = SelectionStore::new();
        store
            .select_package(&SelectionKey::Bulk, &PackageId::from("q"), anyone(), &catalog)
            .unwrap();
        store
            .toggle_item(&(&a).into(), &ItemId::from("brunch"), anyone(), &catalog)
            .unwrap();

        let per_attendee = derive_line_items(
            &graph,
            &store,
            &catalog,
            DerivationScope::PerAttendee(RegistrationMode::Lodge),
        );
        assert_eq!(per_attendee.len(), 1);
        assert!(!per_attendee[0].is_package);
    }
}
