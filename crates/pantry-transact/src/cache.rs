//! Read-optimized holder for the latest extracted inventory.
//!
//! A [`Snapshot`] is built once and never mutated. The cache swaps the
//! current `Arc<Snapshot>` under a short write lock; readers clone the `Arc`
//! under the read lock and then work on that one snapshot, so a read never
//! mixes data from two fetches.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::error::CacheError;
use crate::extract::LocationProducts;
use crate::types::PartialProduct;

/// Immutable inventory view produced by one successful fetch.
#[derive(Debug, Default)]
pub struct Snapshot {
    products: LocationProducts,
    locations: Vec<String>,
}

impl Snapshot {
    #[must_use]
    pub fn new(products: LocationProducts) -> Self {
        let mut locations: Vec<String> = products.keys().cloned().collect();
        locations.sort();
        Self {
            products,
            locations,
        }
    }

    /// Location identifiers, sorted.
    #[must_use]
    pub fn locations(&self) -> &[String] {
        &self.locations
    }

    #[must_use]
    pub fn products_at(&self, location: &str) -> Option<&HashMap<String, PartialProduct>> {
        self.products.get(location)
    }

    #[must_use]
    pub fn product_count(&self) -> usize {
        self.products.values().map(HashMap::len).sum()
    }
}

/// Read access to partial products, implemented by the cache and by the
/// provider that owns it.
pub trait PartialProductSource: Send + Sync {
    /// # Errors
    ///
    /// [`CacheError::NotInitialized`] before the first load.
    fn list_locations(&self) -> Result<Vec<String>, CacheError>;

    /// # Errors
    ///
    /// [`CacheError::NotInitialized`] or [`CacheError::LocationNotFound`].
    fn list_products(&self, location: &str) -> Result<Vec<PartialProduct>, CacheError>;

    /// # Errors
    ///
    /// [`CacheError::NotInitialized`], [`CacheError::LocationNotFound`] or
    /// [`CacheError::ProductNotFound`].
    fn get_product(&self, location: &str, id: &str) -> Result<PartialProduct, CacheError>;
}

#[derive(Debug, Default)]
pub struct SnapshotCache {
    current: RwLock<Option<Arc<Snapshot>>>,
}

impl SnapshotCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the current snapshot. The new one is built before the lock
    /// is taken.
    pub fn load(&self, products: LocationProducts) {
        let snapshot = Arc::new(Snapshot::new(products));
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(snapshot);
    }

    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// The current snapshot, if any has been loaded.
    #[must_use]
    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn require(&self, action: &'static str) -> Result<Arc<Snapshot>, CacheError> {
        self.snapshot()
            .ok_or(CacheError::NotInitialized { action })
    }

    /// # Errors
    ///
    /// [`CacheError::NotInitialized`] before the first load.
    pub fn list_locations(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.require("list locations")?.locations().to_vec())
    }

    /// Products at `location`, sorted by id.
    ///
    /// # Errors
    ///
    /// [`CacheError::NotInitialized`] or [`CacheError::LocationNotFound`].
    pub fn list_products(&self, location: &str) -> Result<Vec<PartialProduct>, CacheError> {
        let snapshot = self.require("list products")?;
        let products = snapshot
            .products_at(location)
            .ok_or_else(|| CacheError::LocationNotFound {
                location: location.to_string(),
            })?;

        let mut products: Vec<PartialProduct> = products.values().cloned().collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }

    /// # Errors
    ///
    /// [`CacheError::NotInitialized`], [`CacheError::LocationNotFound`] or
    /// [`CacheError::ProductNotFound`].
    pub fn get_product(&self, location: &str, id: &str) -> Result<PartialProduct, CacheError> {
        let snapshot = self.require("get product")?;
        snapshot
            .products_at(location)
            .ok_or_else(|| CacheError::LocationNotFound {
                location: location.to_string(),
            })?
            .get(id)
            .cloned()
            .ok_or_else(|| CacheError::ProductNotFound {
                location: location.to_string(),
                id: id.to_string(),
            })
    }
}

impl PartialProductSource for SnapshotCache {
    fn list_locations(&self) -> Result<Vec<String>, CacheError> {
        SnapshotCache::list_locations(self)
    }

    fn list_products(&self, location: &str) -> Result<Vec<PartialProduct>, CacheError> {
        SnapshotCache::list_products(self, location)
    }

    fn get_product(&self, location: &str, id: &str) -> Result<PartialProduct, CacheError> {
        SnapshotCache::get_product(self, location, id)
    }
}
