//! Catalog service trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{Money, ProductId};

use crate::error::Result;

/// A catalog entry, read to validate cart lines before reservation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogProduct {
    /// Current list price per unit.
    pub price: Money,
    /// Whether the product may currently be purchased.
    pub is_active: bool,
}

/// Read-only access to the product catalog.
#[async_trait]
pub trait CatalogService: Send + Sync {
    /// Looks up a product by id.
    async fn product(&self, product_id: &ProductId) -> Result<Option<CatalogProduct>>;
}

/// In-memory catalog for testing and single-node runs.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<ProductId, CatalogProduct>>>,
}

impl InMemoryCatalog {
    /// Creates a new empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a product.
    pub fn insert(&self, product_id: impl Into<ProductId>, price: Money) {
        self.products.write().unwrap().insert(
            product_id.into(),
            CatalogProduct {
                price,
                is_active: true,
            },
        );
    }

    /// Changes a product's list price.
    pub fn set_price(&self, product_id: &ProductId, price: Money) {
        if let Some(product) = self.products.write().unwrap().get_mut(product_id) {
            product.price = price;
        }
    }

    /// Marks a product as not purchasable.
    pub fn deactivate(&self, product_id: &ProductId) {
        if let Some(product) = self.products.write().unwrap().get_mut(product_id) {
            product.is_active = false;
        }
    }
}

#[async_trait]
impl CatalogService for InMemoryCatalog {
    async fn product(&self, product_id: &ProductId) -> Result<Option<CatalogProduct>> {
        Ok(self.products.read().unwrap().get(product_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_and_deactivate() {
        let catalog = InMemoryCatalog::new();
        let id = ProductId::new("SKU-001");
        catalog.insert("SKU-001", Money::from_cents(1000));

        let product = catalog.product(&id).await.unwrap().unwrap();
        assert_eq!(product.price.cents(), 1000);
        assert!(product.is_active);

        catalog.deactivate(&id);
        let product = catalog.product(&id).await.unwrap().unwrap();
        assert!(!product.is_active);
    }

    #[tokio::test]
    async fn missing_product_is_none() {
        let catalog = InMemoryCatalog::new();
        let found = catalog.product(&ProductId::new("ghost")).await.unwrap();
        assert!(found.is_none());
    }
}
