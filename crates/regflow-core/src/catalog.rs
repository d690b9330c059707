//! # Catalog Model
//!
//! The read-only shapes returned by the catalog resolver for one function:
//! single-event [`Item`]s and fixed-price [`Package`]s.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Catalog (function "grand-installation-2025")                           │
//! │                                                                         │
//! │  items:    [ Installation $120 ] [ Banquet $180 ] [ Brunch $60 ]        │
//! │                     ▲                  ▲                                │
//! │                     └──────┬───────────┘                                │
//! │  packages: [ Full Weekend $250 ─ includes Installation, Banquet ]       │
//! │                                                                         │
//! │  Package price is negotiated, NOT the sum of its items.                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The catalog is immutable for a session except for availability counts,
//! which an external feed may push at any time.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;
use ts_rs::TS;

use crate::error::{EngineError, EngineResult, EntityKind};
use crate::money::Money;
use crate::types::{AttendeeType, ItemId, PackageId};

// =============================================================================
// Status
// =============================================================================

/// Sale status of a catalog entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Active,
    Inactive,
    SoldOut,
}

// =============================================================================
// Item
// =============================================================================

/// A single purchasable ticket for one sub-event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Money,
    /// Attendee types allowed to buy this item.
    pub eligibility: BTreeSet<AttendeeType>,
    /// Remaining tickets; `None` means uncapped.
    #[serde(default)]
    pub available: Option<u32>,
    #[serde(default)]
    pub status: ItemStatus,
}

impl Item {
    pub fn is_eligible(&self, attendee_type: AttendeeType) -> bool {
        self.eligibility.contains(&attendee_type)
    }

    /// Returns the reason this item cannot be sold for `quantity` tickets,
    /// or `None` if it can.
    pub fn unavailable_reason(&self, quantity: u32) -> Option<String> {
        match self.status {
            ItemStatus::Inactive => return Some("inactive".to_string()),
            ItemStatus::SoldOut => return Some("sold out".to_string()),
            ItemStatus::Active => {}
        }
        match self.available {
            Some(0) => Some("sold out".to_string()),
            Some(left) if left < quantity => {
                Some(format!("only {} left, {} requested", left, quantity))
            }
            _ => None,
        }
    }

    /// Line-item description: the item's own description, else its name.
    pub fn display_description(&self) -> String {
        self.description.clone().unwrap_or_else(|| self.name.clone())
    }
}

// =============================================================================
// Package
// =============================================================================

/// A fixed-price bundle of items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: PackageId,
    pub name: String,
    pub price: Money,
    /// Included items, in the order they are listed to the customer.
    pub includes: Vec<ItemId>,
    pub eligibility: BTreeSet<AttendeeType>,
    /// Free-text summary of what the package includes.
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: ItemStatus,
}

impl Package {
    pub fn is_eligible(&self, attendee_type: AttendeeType) -> bool {
        self.eligibility.contains(&attendee_type)
    }
}

// =============================================================================
// Availability
// =============================================================================

/// One update from the availability feed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityUpdate {
    pub item_id: ItemId,
    pub available_count: u32,
    pub is_sold_out: bool,
}

// =============================================================================
// Catalog
// =============================================================================

/// Everything purchasable for one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub function_id: String,
    pub items: Vec<Item>,
    pub packages: Vec<Package>,
    /// Bumped whenever availability changes.
    #[serde(default)]
    pub version: u64,
}

impl Catalog {
    pub fn new(function_id: impl Into<String>, items: Vec<Item>, packages: Vec<Package>) -> Self {
        Catalog {
            function_id: function_id.into(),
            items,
            packages,
            version: 0,
        }
    }

    pub fn item(&self, id: &ItemId) -> Option<&Item> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn package(&self, id: &PackageId) -> Option<&Package> {
        self.packages.iter().find(|p| &p.id == id)
    }

    pub fn require_item(&self, id: &ItemId) -> EngineResult<&Item> {
        self.item(id).ok_or_else(|| EngineError::NotFound {
            kind: EntityKind::Item,
            id: id.to_string(),
        })
    }

    pub fn require_package(&self, id: &PackageId) -> EngineResult<&Package> {
        self.package(id).ok_or_else(|| EngineError::NotFound {
            kind: EntityKind::Package,
            id: id.to_string(),
        })
    }

    /// Position of an item in catalog-definition order.
    pub fn item_position(&self, id: &ItemId) -> Option<usize> {
        self.items.iter().position(|i| &i.id == id)
    }

    /// Names of a package's included items, skipping ones not in the catalog.
    pub fn included_item_names(&self, package: &Package) -> Vec<String> {
        package
            .includes
            .iter()
            .filter_map(|id| self.item(id))
            .map(|item| item.name.clone())
            .collect()
    }

    /// Returns the reason `package` cannot be sold for `quantity`, if any.
    ///
    /// A package is only as available as its scarcest included item.
    pub fn package_unavailable_reason(&self, package: &Package, quantity: u32) -> Option<String> {
        match package.status {
            ItemStatus::Inactive => return Some("inactive".to_string()),
            ItemStatus::SoldOut => return Some("sold out".to_string()),
            ItemStatus::Active => {}
        }
        package.includes.iter().find_map(|id| match self.item(id) {
            None => Some(format!("included item {} is no longer offered", id)),
            Some(item) => item
                .unavailable_reason(quantity)
                .map(|reason| format!("{}: {}", item.name, reason)),
        })
    }

    /// Applies one availability update. Returns false for unknown items.
    pub fn apply_availability(&mut self, update: &AvailabilityUpdate) -> bool {
        let Some(item) = self.items.iter_mut().find(|i| i.id == update.item_id) else {
            debug!(item_id = %update.item_id, "Availability update for unknown item ignored");
            return false;
        };

        item.available = Some(update.available_count);
        if update.is_sold_out || update.available_count == 0 {
            if item.status == ItemStatus::Active {
                item.status = ItemStatus::SoldOut;
            }
        } else if item.status == ItemStatus::SoldOut {
            item.status = ItemStatus::Active;
        }
        self.version += 1;
        true
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
