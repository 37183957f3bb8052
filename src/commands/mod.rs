//! Command handlers module.
//!
//! - `extract.rs`: print the descriptor of one image
//! - `index.rs`: fill in missing descriptors across the catalog
//! - `search.rs`: run a visual query
//! - `catalog.rs`: add, list, and remove catalog items
//! - `status.rs`: indexing coverage
//! - `config.rs`: configuration display

mod catalog;
mod config;
mod extract;
mod index;
mod search;
mod status;

pub use catalog::{CatalogAction, cmd_catalog};
pub use config::cmd_config;
pub use extract::{DescriptorFormat, cmd_extract};
pub use index::cmd_index;
pub use search::cmd_search;
pub use status::cmd_status;
