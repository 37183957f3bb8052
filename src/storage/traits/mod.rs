//! Storage backend traits.

mod catalog;

pub use catalog::CatalogBackend;
