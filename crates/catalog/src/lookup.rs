//! Catalog lookup boundary used by the kardex engine.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use thiserror::Error;

use kardex_core::{Entity, ProductId, SupplierId, TenantId};

use crate::product::Product;
use crate::supplier::Supplier;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("unknown product {0}")]
    UnknownProduct(ProductId),

    #[error("unknown supplier {0}")]
    UnknownSupplier(SupplierId),

    #[error("catalog unavailable: {0}")]
    Unavailable(String),
}

/// Read-only access to catalog entities.
pub trait Catalog: Send + Sync {
    fn resolve_product(&self, id: ProductId) -> Result<Product, CatalogError>;

    fn resolve_supplier(&self, id: SupplierId) -> Result<Supplier, CatalogError>;

    /// All products of a tenant, for reports.
    fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError>;
}

impl<C> Catalog for Arc<C>
where
    C: Catalog + ?Sized,
{
    fn resolve_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        (**self).resolve_product(id)
    }

    fn resolve_supplier(&self, id: SupplierId) -> Result<Supplier, CatalogError> {
        (**self).resolve_supplier(id)
    }

    fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError> {
        (**self).list_products(tenant_id)
    }
}

/// In-memory catalog for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
    suppliers: RwLock<HashMap<SupplierId, Supplier>>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_product(&self, product: Product) {
        if let Ok(mut map) = self.products.write() {
            map.insert(*product.id(), product);
        }
    }

    pub fn upsert_supplier(&self, supplier: Supplier) {
        if let Ok(mut map) = self.suppliers.write() {
            map.insert(*supplier.id(), supplier);
        }
    }
}

fn poisoned<T>(_: T) -> CatalogError {
    CatalogError::Unavailable("lock poisoned".to_string())
}

impl Catalog for InMemoryCatalog {
    fn resolve_product(&self, id: ProductId) -> Result<Product, CatalogError> {
        let map = self.products.read().map_err(poisoned)?;
        map.get(&id).cloned().ok_or(CatalogError::UnknownProduct(id))
    }

    fn resolve_supplier(&self, id: SupplierId) -> Result<Supplier, CatalogError> {
        let map = self.suppliers.read().map_err(poisoned)?;
        map.get(&id).cloned().ok_or(CatalogError::UnknownSupplier(id))
    }

    fn list_products(&self, tenant_id: TenantId) -> Result<Vec<Product>, CatalogError> {
        let map = self.products.read().map_err(poisoned)?;
        let mut products: Vec<Product> = map
            .values()
            .filter(|p| p.tenant_id() == tenant_id)
            .cloned()
            .collect();
        products.sort_by_key(|p| *p.id());
        Ok(products)
    }
}
