//! Catalog backend trait.
//!
//! A catalog backend is the authoritative store for catalog items and their
//! descriptors. Descriptors live next to the item they describe and are
//! removed with it.

use crate::Result;
use crate::models::{CatalogItem, DescriptorRecord, IndexedItem, ItemId};

/// Trait for catalog storage backends.
pub trait CatalogBackend: Send + Sync {
    /// Inserts or updates an item, keeping any stored descriptor.
    fn upsert_item(&self, item: &CatalogItem) -> Result<()>;

    /// Retrieves an item by ID.
    fn get_item(&self, id: &ItemId) -> Result<Option<CatalogItem>>;

    /// Deletes an item and its descriptor.
    fn delete_item(&self, id: &ItemId) -> Result<bool>;

    /// Lists items in catalog order.
    fn list_items(&self, active_only: bool) -> Result<Vec<CatalogItem>>;

    /// Stores the descriptor for an existing item, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::DimensionMismatch`] if the descriptor length
    /// differs from the backend's configured dimensions.
    fn store_descriptor(&self, id: &ItemId, record: &DescriptorRecord) -> Result<()>;

    /// Retrieves the descriptor for an item.
    fn get_descriptor(&self, id: &ItemId) -> Result<Option<DescriptorRecord>>;

    /// Removes the descriptor for an item.
    fn clear_descriptor(&self, id: &ItemId) -> Result<bool>;

    /// Lists items together with their descriptors, in catalog order.
    fn indexed_items(&self, active_only: bool) -> Result<Vec<IndexedItem>>;

    /// Returns the descriptor length this backend accepts.
    fn dimensions(&self) -> usize;

    /// Returns the total count of items.
    fn count(&self) -> Result<usize> {
        Ok(self.list_items(false)?.len())
    }
}
