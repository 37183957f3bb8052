//! # Glimpse
//!
//! Visual product search for storefront catalogs.
//!
//! Glimpse turns product photos into fixed-length descriptors and ranks
//! catalog items by their similarity to a query image.
//!
//! ## Features
//!
//! - Deterministic descriptor extraction (grayscale histogram + downsampled intensities)
//! - Cosine-similarity ranking with a relevance threshold and stable tie-breaking
//! - `SQLite` catalog storage with versioned, byte-exact descriptor blobs
//! - Parallel batch ingestion for un-indexed catalog items
//! - Query handling for raw and base64 image uploads
//!
//! ## Example
//!
//! ```rust,ignore
//! use glimpse::{DescriptorExtractor, ExtractorConfig, PixelBuffer, SimilarityMatcher};
//!
//! let extractor = DescriptorExtractor::new(ExtractorConfig::default());
//! let image = PixelBuffer::from_dynamic(&image::open("shoe.png")?);
//! let query = extractor.extract(Some(&image))?;
//!
//! let matcher = SimilarityMatcher::default();
//! let ranked = matcher.rank(&query, &candidates);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
// multiple_crate_versions is inherently crate-level (detects duplicate transitive dependencies).
// Current duplicates come from the image codec tree.
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod config;
pub mod descriptor;
pub mod models;
pub mod observability;
pub mod services;
pub mod storage;

// Re-exports for convenience
pub use config::{GlimpseConfig, SearchSettings};
pub use descriptor::{
    DescriptorExtractor, EXTRACTOR_VERSION, Extractor, ExtractorConfig, SimilarityMatcher,
};
pub use models::{
    Candidate, CatalogItem, Descriptor, DescriptorRecord, FeatureSpace, ItemId, MatchResult,
    PixelBuffer,
};
pub use services::{CatalogService, IngestionService, ServiceContainer, VisualSearchService};
pub use storage::{CatalogBackend, SqliteCatalogBackend};

/// Error type for glimpse operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Bad configuration values, malformed descriptor bytes, missing uploads |
/// | `ExtractionFailed` | Absent or malformed image, internal conversion/resize fault |
/// | `ImageDecode` | Uploaded or stored image bytes cannot be decoded |
/// | `OperationFailed` | I/O errors, database queries fail |
/// | `DimensionMismatch` | A descriptor of the wrong length reaches storage |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    ///
    /// Raised when:
    /// - A configuration value is out of range (e.g., `feature_size = 0`)
    /// - A descriptor byte buffer is not a whole number of `f32` values
    /// - A base64 payload cannot be decoded
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Descriptor extraction failed.
    ///
    /// Covers both absent or malformed images and internal faults during
    /// grayscale conversion or resampling.
    #[error("extraction failed: {0}")]
    ExtractionFailed(String),

    /// Image bytes could not be decoded.
    #[error("image decode failed: {0}")]
    ImageDecode(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` database operations fail
    /// - Filesystem I/O errors occur
    /// - Observability initialization fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// A descriptor length does not match the configured feature size.
    #[error("descriptor dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Configured feature size.
        expected: usize,
        /// Length that was supplied.
        actual: usize,
    },
}

impl Error {
    /// Shorthand for [`Error::OperationFailed`].
    pub(crate) fn operation(operation: &str, cause: impl std::fmt::Display) -> Self {
        Self::OperationFailed {
            operation: operation.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Result type alias for glimpse operations.
pub type Result<T> = std::result::Result<T, Error>;
