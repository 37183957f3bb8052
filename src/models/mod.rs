//! Data models for glimpse.
//!
//! This module contains the core data structures used throughout the system.

mod catalog;
mod descriptor;
mod pixels;
mod search;

pub use catalog::{Candidate, CatalogItem, IndexedItem, ItemId, MatchResult};
pub use descriptor::{BYTES_PER_ELEMENT, Descriptor, DescriptorRecord, FeatureSpace};
pub use pixels::PixelBuffer;
pub use search::{
    ImageUpload, ProductView, ResponseStatus, SearchMatch, VisualSearchResponse, round_score,
};
