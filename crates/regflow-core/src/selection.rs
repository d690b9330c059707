//! # Selection Store
//!
//! Per selection key, the chosen package XOR the chosen set of items.
//!
//! ## State Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Items{}  ──select_package(P)──►  Package(P)                           │
//! │     ▲  │                             │    │                             │
//! │     │  └─toggle_item(X)─► Items{X}   │    └─select_package(Q)─► Package(Q)
//! │     │                        ▲       │                                  │
//! │     │                        └───toggle_item(X)  (package is REPLACED,  │
//! │     │                                             not added to)        │
//! │     └──────────── clear(key) ─────────────────────────────────────────  │
//! │                                                                         │
//! │  The variant type makes "package AND items" unrepresentable.            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every operation validates before it mutates, so a rejected call leaves the
//! previous selection exactly as it was.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::catalog::Catalog;
use crate::error::{EngineError, EngineResult};
use crate::types::{AttendeeId, AttendeeType, ItemId, PackageId};

/// Literal key used for a lodge's bulk block.
pub const BULK_KEY: &str = "bulk";

// =============================================================================
// Selection Key
// =============================================================================

/// What a selection belongs to: one attendee, or the lodge's bulk block.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum SelectionKey {
    Attendee(AttendeeId),
    Bulk,
}

impl SelectionKey {
    pub fn attendee(id: &AttendeeId) -> Self {
        SelectionKey::Attendee(id.clone())
    }

    pub fn attendee_id(&self) -> Option<&AttendeeId> {
        match self {
            SelectionKey::Attendee(id) => Some(id),
            SelectionKey::Bulk => None,
        }
    }
}

impl fmt::Display for SelectionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectionKey::Attendee(id) => write!(f, "{}", id),
            SelectionKey::Bulk => f.write_str(BULK_KEY),
        }
    }
}

impl From<String> for SelectionKey {
    fn from(s: String) -> Self {
        if s == BULK_KEY {
            SelectionKey::Bulk
        } else {
            SelectionKey::Attendee(AttendeeId::new(s))
        }
    }
}

impl From<SelectionKey> for String {
    fn from(key: SelectionKey) -> Self {
        key.to_string()
    }
}

impl FromStr for SelectionKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(SelectionKey::from(s.to_string()))
    }
}

impl From<&AttendeeId> for SelectionKey {
    fn from(id: &AttendeeId) -> Self {
        SelectionKey::attendee(id)
    }
}

// =============================================================================
// Selection
// =============================================================================

/// A package, or zero or more individual items. Never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selection {
    Package { id: PackageId },
    Items { ids: BTreeSet<ItemId> },
}

impl Default for Selection {
    fn default() -> Self {
        Selection::Items {
            ids: BTreeSet::new(),
        }
    }
}

impl Selection {
    /// No package and no items: "no tickets chosen yet".
    pub fn is_empty(&self) -> bool {
        matches!(self, Selection::Items { ids } if ids.is_empty())
    }

    pub fn package_id(&self) -> Option<&PackageId> {
        match self {
            Selection::Package { id } => Some(id),
            Selection::Items { .. } => None,
        }
    }

    /// Individually chosen items; empty in package mode.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        let ids = match self {
            Selection::Items { ids } => Some(ids),
            Selection::Package { .. } => None,
        };
        ids.into_iter().flatten()
    }

    /// Number of line items this selection yields against a full catalog.
    pub fn line_count(&self) -> usize {
        match self {
            Selection::Package { .. } => 1,
            Selection::Items { ids } => ids.len(),
        }
    }
}

// =============================================================================
// Selection Store
// =============================================================================

/// Who is selecting and for how many tickets.
///
/// Bulk groups carry the group's type and headcount; attendees carry their
/// own type and a quantity of one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Purchaser {
    pub attendee_type: AttendeeType,
    pub quantity: u32,
}

/// All selections of one registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SelectionStore {
    selections: BTreeMap<SelectionKey, Selection>,
}

impl SelectionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The selection for `key`; an untouched key has the empty selection.
    pub fn get(&self, key: &SelectionKey) -> Selection {
        self.selections.get(key).cloned().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SelectionKey, &Selection)> {
        self.selections.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SelectionKey> {
        self.selections.keys()
    }

    /// Chooses a package, replacing whatever was chosen before.
    pub fn select_package(
        &mut self,
        key: &SelectionKey,
        package_id: &PackageId,
        purchaser: Purchaser,
        catalog: &Catalog,
    ) -> EngineResult<()> {
        let package = catalog.require_package(package_id)?;
        if !package.is_eligible(purchaser.attendee_type) {
            return Err(EngineError::IneligibleSelection {
                catalog_id: package_id.to_string(),
                attendee_type: purchaser.attendee_type.to_string(),
            });
        }
        if let Some(reason) = catalog.package_unavailable_reason(package, purchaser.quantity) {
            return Err(EngineError::Unavailable {
                catalog_id: package_id.to_string(),
                reason,
            });
        }

        debug!(key = %key, package_id = %package_id, "Package selected");
        self.selections.insert(
            key.clone(),
            Selection::Package {
                id: package_id.clone(),
            },
        );
        Ok(())
    }

    /// Adds or removes an individual item.
    ///
    /// ## Behavior
    /// - Package mode: the package is dropped and the selection becomes
    ///   exactly `{item_id}`
    /// - Item mode, item present: the item is removed (no catalog checks, so
    ///   stale items can always be deselected)
    /// - Item mode, item absent: the item is added after eligibility and
    ///   availability checks
    pub fn toggle_item(
        &mut self,
        key: &SelectionKey,
        item_id: &ItemId,
        purchaser: Purchaser,
        catalog: &Catalog,
    ) -> EngineResult<()> {
        let current = self.get(key);
        if let Selection::Items { ids } = &current {
            if ids.contains(item_id) {
                let mut ids = ids.clone();
                ids.remove(item_id);
                debug!(key = %key, item_id = %item_id, "Item deselected");
                self.selections.insert(key.clone(), Selection::Items { ids });
                return Ok(());
            }
        }

        let item = catalog.require_item(item_id)?;
        if !item.is_eligible(purchaser.attendee_type) {
            return Err(EngineError::IneligibleSelection {
                catalog_id: item_id.to_string(),
                attendee_type: purchaser.attendee_type.to_string(),
            });
        }
        if let Some(reason) = item.unavailable_reason(purchaser.quantity) {
            return Err(EngineError::Unavailable {
                catalog_id: item_id.to_string(),
                reason,
            });
        }

        let next = match current {
            Selection::Package { id } => {
                debug!(key = %key, package_id = %id, item_id = %item_id, "Package replaced by item");
                Selection::Items {
                    ids: BTreeSet::from([item_id.clone()]),
                }
            }
            Selection::Items { mut ids } => {
                debug!(key = %key, item_id = %item_id, "Item selected");
                ids.insert(item_id.clone());
                Selection::Items { ids }
            }
        };
        self.selections.insert(key.clone(), next);
        Ok(())
    }

    /// Empties the selection for `key`.
    pub fn clear(&mut self, key: &SelectionKey) {
        if self.selections.remove(key).is_some() {
            debug!(key = %key, "Selection cleared");
        }
    }

    pub fn clear_all(&mut self) {
        self.selections.clear();
    }

    /// Drops selections whose key is not in `keys`.
    pub fn retain_keys(&mut self, keys: &[SelectionKey]) {
        self.selections.retain(|key, _| keys.contains(key));
    }

    /// True iff every key has a package or at least one item.
    pub fn is_complete<'a>(&self, keys: impl IntoIterator<Item = &'a SelectionKey>) -> bool {
        keys.into_iter().all(|key| {
            self.selections
                .get(key)
                .is_some_and(|selection| !selection.is_empty())
        })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Item, ItemStatus, Package};
    use crate::money::Money;

    fn members_only() -> BTreeSet<AttendeeType> {
        [AttendeeType::PrimaryMember, AttendeeType::SecondaryMember]
            .into_iter()
            .collect()
    }

    fn catalog() -> Catalog {
        let item = |id: &str, eligibility: BTreeSet<AttendeeType>| Item {
            id: ItemId::from(id),
            name: id.to_string(),
            description: None,
            price: Money::from_minor(5_000),
            eligibility,
            available: Some(50),
            status: ItemStatus::Active,
        };
        Catalog::new(
            "fn",
            vec![
                item("banquet", AttendeeType::ALL.into_iter().collect()),
                item("brunch", AttendeeType::ALL.into_iter().collect()),
                item("lodge-meeting", members_only()),
            ],
            vec![Package {
                id: PackageId::from("p"),
                name: "Package P".to_string(),
                price: Money::from_minor(9_000),
                includes: vec![ItemId::from("banquet"), ItemId::from("brunch")],
                eligibility: members_only(),
                description: None,
                status: ItemStatus::Active,
            }],
        )
    }

    fn member() -> Purchaser {
        Purchaser {
            attendee_type: AttendeeType::PrimaryMember,
            quantity: 1,
        }
    }

    fn guest() -> Purchaser {
        Purchaser {
            attendee_type: AttendeeType::Guest,
            quantity: 1,
        }
    }

    fn key() -> SelectionKey {
        SelectionKey::Attendee(AttendeeId::from("a1"))
    }

    #[test]
    fn test_select_package_clears_items() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        store
            .toggle_item(&key(), &ItemId::from("banquet"), member(), &catalog)
            .unwrap();
        store
            .select_package(&key(), &PackageId::from("p"), member(), &catalog)
            .unwrap();

        let selection = store.get(&key());
        assert_eq!(selection.package_id(), Some(&PackageId::from("p")));
        assert_eq!(selection.item_ids().count(), 0);
    }

    #[test]
    fn test_toggle_item_replaces_package() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        store
            .select_package(&key(), &PackageId::from("p"), member(), &catalog)
            .unwrap();
        store
            .toggle_item(&key(), &ItemId::from("brunch"), member(), &catalog)
            .unwrap();

        assert_eq!(
            store.get(&key()),
            Selection::Items {
                ids: BTreeSet::from([ItemId::from("brunch")])
            }
        );
    }

    #[test]
    fn test_toggle_item_adds_and_removes() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        let banquet = ItemId::from("banquet");
        store.toggle_item(&key(), &banquet, member(), &catalog).unwrap();
        store
            .toggle_item(&key(), &ItemId::from("brunch"), member(), &catalog)
            .unwrap();
        assert_eq!(store.get(&key()).item_ids().count(), 2);

        store.toggle_item(&key(), &banquet, member(), &catalog).unwrap();
        let ids: Vec<_> = store.get(&key()).item_ids().cloned().collect();
        assert_eq!(ids, vec![ItemId::from("brunch")]);
    }

    #[test]
    fn test_ineligible_package_leaves_selection_unchanged() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        store
            .toggle_item(&key(), &ItemId::from("banquet"), guest(), &catalog)
            .unwrap();
        let before = store.get(&key());

        let err = store
            .select_package(&key(), &PackageId::from("p"), guest(), &catalog)
            .unwrap_err();
        assert!(matches!(err, EngineError::IneligibleSelection { .. }));
        assert_eq!(store.get(&key()), before);

        let err = store
            .toggle_item(&key(), &ItemId::from("lodge-meeting"), guest(), &catalog)
            .unwrap_err();
        assert!(matches!(err, EngineError::IneligibleSelection { .. }));
        assert_eq!(store.get(&key()), before);
    }

    #[test]
    fn test_unknown_ids_are_not_found() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        assert!(matches!(
            store.select_package(&key(), &PackageId::from("zz"), member(), &catalog),
            Err(EngineError::NotFound { .. })
        ));
        assert!(matches!(
            store.toggle_item(&key(), &ItemId::from("zz"), member(), &catalog),
            Err(EngineError::NotFound { .. })
        ));
        assert!(store.get(&key()).is_empty());
    }

    #[test]
    fn test_sold_out_item_rejected_but_stale_item_can_be_removed() {
        let mut catalog = catalog();
        let mut store = SelectionStore::new();
        let banquet = ItemId::from("banquet");
        store.toggle_item(&key(), &banquet, member(), &catalog).unwrap();

        catalog.items.retain(|i| i.id != banquet);
        store.toggle_item(&key(), &banquet, member(), &catalog).unwrap();
        assert!(store.get(&key()).is_empty());

        catalog.items[0].status = ItemStatus::SoldOut;
        let err = store
            .toggle_item(&key(), &ItemId::from("brunch"), member(), &catalog)
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { .. }));
    }

    #[test]
    fn test_bulk_quantity_checks_availability() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        let group = Purchaser {
            attendee_type: AttendeeType::PrimaryMember,
            quantity: 60,
        };
        let err = store
            .select_package(&SelectionKey::Bulk, &PackageId::from("p"), group, &catalog)
            .unwrap_err();
        assert!(matches!(err, EngineError::Unavailable { .. }));
    }

    #[test]
    fn test_is_complete() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        let other = SelectionKey::Attendee(AttendeeId::from("a2"));
        store
            .select_package(&key(), &PackageId::from("p"), member(), &catalog)
            .unwrap();

        assert!(store.is_complete([&key()]));
        assert!(!store.is_complete([&key(), &other]));

        store
            .toggle_item(&other, &ItemId::from("brunch"), guest(), &catalog)
            .unwrap();
        assert!(store.is_complete([&key(), &other]));

        store.clear(&other);
        assert!(!store.is_complete([&key(), &other]));
    }

    #[test]
    fn test_serde_keys_are_strings() {
        let catalog = catalog();
        let mut store = SelectionStore::new();
        store
            .select_package(&SelectionKey::Bulk, &PackageId::from("p"), member(), &catalog)
            .unwrap();
        store
            .toggle_item(&key(), &ItemId::from("brunch"), member(), &catalog)
            .unwrap();

        let json = serde_json::to_value(&store).unwrap();
        assert_eq!(json["bulk"]["kind"], "package");
        assert_eq!(json["a1"]["ids"][0], "brunch");

        let restored: SelectionStore = serde_json::from_value(json).unwrap();
        assert_eq!(restored, store);
    }
}
