//! Business logic services.
//!
//! Services orchestrate the catalog backend and the descriptor pipeline and
//! provide the high-level operations used by the CLI.

mod catalog;
mod container;
mod ingest;
mod search;

pub use catalog::{CatalogService, IndexStatus, ProductListing};
pub use container::ServiceContainer;
pub use ingest::{IngestEntry, IngestOptions, IngestOutcome, IngestReport, IngestionService};
pub use search::{
    COULD_NOT_PROCESS_IMAGE, INVALID_IMAGE_FORMAT, NO_IMAGE_PROVIDED, RankedMatches,
    VisualSearchService, decode_base64, decode_upload,
};
