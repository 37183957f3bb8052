//! Catalog item types and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use super::{Descriptor, DescriptorRecord};

/// Unique identifier for a catalog item.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Creates a new item ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A product in the storefront catalog.
///
/// The display fields are owned by the catalog; the search layer only echoes
/// them back in query responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Unique identifier.
    pub id: ItemId,
    /// Display name.
    pub name: String,
    /// Long description.
    #[serde(default)]
    pub description: String,
    /// Price as a decimal string (e.g. `"19.99"`).
    #[serde(default)]
    pub price: String,
    /// Category name.
    #[serde(default)]
    pub category: String,
    /// Brand name.
    #[serde(default)]
    pub brand: String,
    /// Local path of the product image used for extraction.
    #[serde(default)]
    pub image_path: Option<PathBuf>,
    /// Public URL of the product image.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Units in stock.
    #[serde(default)]
    pub stock: u32,
    /// Inactive items are neither indexed nor searched.
    #[serde(default = "default_active")]
    pub is_active: bool,
}

const fn default_active() -> bool {
    true
}

impl CatalogItem {
    /// Creates an active item with empty display fields.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            price: String::new(),
            category: String::new(),
            brand: String::new(),
            image_path: None,
            image_url: None,
            stock: 0,
            is_active: true,
        }
    }

    /// Sets the local image path.
    #[must_use]
    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_path = Some(path.into());
        self
    }

    /// Sets the price.
    #[must_use]
    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = price.into();
        self
    }

    /// Sets category and brand.
    #[must_use]
    pub fn with_classification(
        mut self,
        category: impl Into<String>,
        brand: impl Into<String>,
    ) -> Self {
        self.category = category.into();
        self.brand = brand.into();
        self
    }

    /// Marks the item inactive.
    #[must_use]
    pub const fn inactive(mut self) -> Self {
        self.is_active = false;
        self
    }
}

/// A catalog item paired with its stored descriptor, if any.
#[derive(Debug, Clone)]
pub struct IndexedItem {
    /// The catalog item.
    pub item: CatalogItem,
    /// Its descriptor; `None` for items that were never indexed.
    pub record: Option<DescriptorRecord>,
}

impl IndexedItem {
    /// Returns true if a descriptor is stored for the item.
    #[must_use]
    pub const fn has_features(&self) -> bool {
        self.record.is_some()
    }
}

/// One entry of the candidate set a query is ranked against.
#[derive(Debug, Clone)]
pub struct Candidate {
    /// Identifier reported back in match results.
    pub id: ItemId,
    /// Stored descriptor; candidates without one are skipped.
    pub descriptor: Option<Descriptor>,
}

impl Candidate {
    /// Creates a candidate with a descriptor.
    #[must_use]
    pub fn new(id: impl Into<ItemId>, descriptor: Descriptor) -> Self {
        Self {
            id: id.into(),
            descriptor: Some(descriptor),
        }
    }

    /// Creates a candidate that has not been indexed yet.
    #[must_use]
    pub fn unindexed(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            descriptor: None,
        }
    }
}

/// A candidate that cleared the similarity threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchResult {
    /// The matching candidate.
    pub id: ItemId,
    /// Cosine similarity to the query.
    pub score: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_item_id_display() {
        let id = ItemId::new("sku-42");
        assert_eq!(id.as_str(), "sku-42");
        assert_eq!(id.to_string(), "sku-42");
        assert_eq!(ItemId::from("sku-42"), id);
    }

    #[test]
    fn test_catalog_item_builders() {
        let item = CatalogItem::new("sku-1", "Canvas Sneaker")
            .with_price("49.90")
            .with_classification("Shoes", "Acme")
            .with_image_path("/img/sneaker.png");
        assert!(item.is_active);
        assert_eq!(item.category, "Shoes");
        assert_eq!(item.brand, "Acme");
        assert!(!item.clone().inactive().is_active);
    }

    #[test]
    fn test_catalog_item_deserialize_defaults() {
        let item: CatalogItem =
            serde_json::from_str(r#"{"id": "a", "name": "Lamp"}"#).unwrap();
        assert!(item.is_active);
        assert!(item.image_path.is_none());
        assert_eq!(item.stock, 0);
    }
}
