//! Storage layer.
//!
//! The catalog is persisted through the [`CatalogBackend`] trait; the only
//! implementation is [`SqliteCatalogBackend`], which keeps items and their
//! descriptors in one database file.

// Dropping the connection guard slightly earlier provides no benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod catalog;
pub mod sqlite;
pub mod traits;

pub use catalog::SqliteCatalogBackend;
pub use traits::CatalogBackend;
