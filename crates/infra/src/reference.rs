//! Reference data the ledger consumes but does not own: the product catalog
//! and the location registry.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use pharmacy_core::{LocationId, ProductId};

/// Reference backend failure (unreachable catalog, bad response, ...).
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("reference backend unavailable: {0}")]
    Unavailable(String),
}

/// Catalog facts the ledger needs about a product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub unit: String,
}

#[async_trait::async_trait]
pub trait CatalogReference: Send + Sync {
    async fn resolve_product(&self, id: ProductId) -> Result<Option<ProductInfo>, ReferenceError>;
}

#[async_trait::async_trait]
pub trait LocationRegistry: Send + Sync {
    async fn location_id(&self, name: &str) -> Result<Option<LocationId>, ReferenceError>;

    async fn location_name(&self, id: LocationId) -> Result<Option<String>, ReferenceError>;
}

/// Fixed product catalog, loaded up front.
#[derive(Debug, Default, Clone)]
pub struct StaticCatalog {
    products: HashMap<ProductId, ProductInfo>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: ProductId, name: impl Into<String>, unit: impl Into<String>) {
        self.products.insert(
            id,
            ProductInfo {
                name: name.into(),
                unit: unit.into(),
            },
        );
    }

    pub fn with_product(mut self, id: ProductId, name: impl Into<String>, unit: impl Into<String>) -> Self {
        self.insert(id, name, unit);
        self
    }
}

#[async_trait::async_trait]
impl CatalogReference for StaticCatalog {
    async fn resolve_product(&self, id: ProductId) -> Result<Option<ProductInfo>, ReferenceError> {
        Ok(self.products.get(&id).cloned())
    }
}

/// Fixed name <-> id location table, loaded up front.
#[derive(Debug, Default, Clone)]
pub struct StaticLocationRegistry {
    by_name: HashMap<String, LocationId>,
    by_id: HashMap<LocationId, String>,
}

impl StaticLocationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` under `id`, replacing any previous mapping for either.
    pub fn insert(&mut self, id: LocationId, name: impl Into<String>) {
        let name = name.into();
        if let Some(old) = self.by_id.insert(id, name.clone()) {
            self.by_name.remove(&old);
        }
        if let Some(old_id) = self.by_name.insert(name, id) {
            if old_id != id {
                self.by_id.remove(&old_id);
            }
        }
    }

    /// Register `name` under a fresh id and return it.
    pub fn register(&mut self, name: impl Into<String>) -> LocationId {
        let id = LocationId::new();
        self.insert(id, name);
        id
    }
}

#[async_trait::async_trait]
impl LocationRegistry for StaticLocationRegistry {
    async fn location_id(&self, name: &str) -> Result<Option<LocationId>, ReferenceError> {
        Ok(self.by_name.get(name).copied())
    }

    async fn location_name(&self, id: LocationId) -> Result<Option<String>, ReferenceError> {
        Ok(self.by_id.get(&id).cloned())
    }
}
