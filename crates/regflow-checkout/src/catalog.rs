//! # Catalog Resolver
//!
//! Fetches the items and packages on sale for a function.
//!
//! ```text
//! CheckoutService ──resolve("grand-installation")──► CatalogResolver
//!                                                        │
//!                     ┌──────────────────────────────────┤
//!                     ▼                                  ▼
//!            StaticCatalogResolver                HTTP / DB resolver
//!            (in memory, tests, demos)            (provided by the host app)
//! ```
//!
//! Resolvers return catalogs as published. `CheckoutService` runs every
//! resolved catalog through [`check_catalog`] before the engine sees it, so
//! host-supplied resolvers get the same checks.

use async_trait::async_trait;
use regflow_core::validation;
use regflow_core::Catalog;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{CheckoutError, CheckoutResult};

#[async_trait]
pub trait CatalogResolver: Send + Sync {
    /// Returns the current catalog for `function_id`.
    async fn resolve(&self, function_id: &str) -> CheckoutResult<Catalog>;
}

/// Rejects catalogs the engine cannot price safely.
///
/// ## Rules
/// - Item and package ids are unique
/// - No negative prices
/// - Package inclusions naming unknown items are logged, not rejected
pub fn check_catalog(catalog: &Catalog) -> CheckoutResult<()> {
    let unavailable = |reason: String| CheckoutError::CatalogUnavailable {
        function_id: catalog.function_id.clone(),
        reason,
    };

    let mut item_ids = HashSet::new();
    for item in &catalog.items {
        if !item_ids.insert(&item.id) {
            return Err(unavailable(format!("duplicate item id {}", item.id)));
        }
        validation::validate_price_minor(item.price.minor())
            .map_err(|e| unavailable(format!("item {}: {}", item.id, e)))?;
    }

    let mut package_ids = HashSet::new();
    for package in &catalog.packages {
        if !package_ids.insert(&package.id) {
            return Err(unavailable(format!("duplicate package id {}", package.id)));
        }
        validation::validate_price_minor(package.price.minor())
            .map_err(|e| unavailable(format!("package {}: {}", package.id, e)))?;
        for included in &package.includes {
            if !item_ids.contains(included) {
                warn!(
                    package_id = %package.id,
                    item_id = %included,
                    "Package includes an item that is not in the catalog"
                );
            }
        }
    }
    Ok(())
}

// =============================================================================
// Static Resolver
// =============================================================================

/// Serves catalogs held in memory.
#[derive(Debug, Default)]
pub struct StaticCatalogResolver {
    catalogs: RwLock<HashMap<String, Catalog>>,
}

impl StaticCatalogResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(catalog: Catalog) -> Self {
        let mut catalogs = HashMap::new();
        catalogs.insert(catalog.function_id.clone(), catalog);
        StaticCatalogResolver {
            catalogs: RwLock::new(catalogs),
        }
    }

    /// Adds or replaces the catalog for its function.
    pub async fn publish(&self, catalog: Catalog) {
        debug!(function_id = %catalog.function_id, "Catalog published");
        self.catalogs
            .write()
            .await
            .insert(catalog.function_id.clone(), catalog);
    }

    /// Removes a function's catalog, e.g. when sales close.
    pub async fn withdraw(&self, function_id: &str) -> Option<Catalog> {
        self.catalogs.write().await.remove(function_id)
    }
}

#[async_trait]
impl CatalogResolver for StaticCatalogResolver {
    async fn resolve(&self, function_id: &str) -> CheckoutResult<Catalog> {
        let catalog = self
            .catalogs
            .read()
            .await
            .get(function_id)
            .cloned()
            .ok_or_else(|| CheckoutError::CatalogUnavailable {
                function_id: function_id.to_string(),
                reason: "no catalog published".to_string(),
            })?;
        Ok(catalog)
    }
}
