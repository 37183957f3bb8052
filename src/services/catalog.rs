//! Catalog service.

use std::sync::Arc;

use serde::Serialize;

use crate::models::{CatalogItem, FeatureSpace, ItemId};
use crate::storage::CatalogBackend;
use crate::{Error, Result};

/// A catalog item with its indexing state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductListing {
    /// The item.
    #[serde(flatten)]
    pub item: CatalogItem,
    /// Whether a descriptor is stored for the item.
    pub has_features: bool,
    /// Feature space of the stored descriptor, if any.
    pub feature_space: Option<FeatureSpace>,
    /// Whether the stored descriptor comes from another feature space.
    pub stale: bool,
}

/// Indexing coverage of the catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IndexStatus {
    /// All items, active or not.
    pub total: usize,
    /// Active items.
    pub active: usize,
    /// Active items with a descriptor in the current feature space.
    pub indexed: usize,
    /// Active items a query cannot match: no descriptor, or a stale one.
    pub not_searchable: usize,
    /// Active items whose descriptor comes from another feature space.
    pub stale: usize,
    /// Active items without an image.
    pub without_image: usize,
}

/// Service for catalog maintenance.
#[derive(Clone)]
pub struct CatalogService {
    catalog: Arc<dyn CatalogBackend>,
    space: FeatureSpace,
}

impl CatalogService {
    /// Creates a new catalog service.
    #[must_use]
    pub const fn new(catalog: Arc<dyn CatalogBackend>, space: FeatureSpace) -> Self {
        Self { catalog, space }
    }

    /// Adds or updates an item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a blank id or name, or a storage
    /// error.
    pub fn add_item(&self, item: &CatalogItem) -> Result<()> {
        if item.id.as_str().trim().is_empty() {
            return Err(Error::InvalidInput("item id must not be empty".to_string()));
        }
        if item.name.trim().is_empty() {
            return Err(Error::InvalidInput("item name must not be empty".to_string()));
        }
        self.catalog.upsert_item(item)?;
        tracing::info!(item.id = %item.id, active = item.is_active, "Stored catalog item");
        Ok(())
    }

    /// Removes an item and its descriptor.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn remove_item(&self, id: &ItemId) -> Result<bool> {
        let removed = self.catalog.delete_item(id)?;
        tracing::info!(item.id = %id, removed, "Removed catalog item");
        Ok(removed)
    }

    /// Lists items with their indexing state, in catalog order.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn list_products(&self, active_only: bool) -> Result<Vec<ProductListing>> {
        Ok(self
            .catalog
            .indexed_items(active_only)?
            .into_iter()
            .map(|indexed| {
                let feature_space = indexed.record.as_ref().map(|r| r.space);
                ProductListing {
                    has_features: indexed.has_features(),
                    stale: feature_space.is_some_and(|space| space != self.space),
                    feature_space,
                    item: indexed.item,
                }
            })
            .collect())
    }

    /// Summarizes indexing coverage.
    ///
    /// # Errors
    ///
    /// Returns a storage error.
    pub fn status(&self) -> Result<IndexStatus> {
        let items = self.catalog.indexed_items(false)?;
        let mut status = IndexStatus {
            total: items.len(),
            ..IndexStatus::default()
        };

        for indexed in items.iter().filter(|i| i.item.is_active) {
            status.active += 1;
            if indexed.item.image_path.is_none() {
                status.without_image += 1;
            }
            match &indexed.record {
                Some(record) if record.is_in(&self.space) => status.indexed += 1,
                Some(_) => {
                    status.stale += 1;
                    status.not_searchable += 1;
                },
                None => status.not_searchable += 1,
            }
        }
        Ok(status)
    }
}
