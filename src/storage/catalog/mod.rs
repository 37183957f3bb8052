//! Catalog backend implementations.

mod sqlite;

pub use sqlite::SqliteCatalogBackend;
