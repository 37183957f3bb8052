//! Descriptor extraction and similarity matching.
//!
//! Provides the visual search core: an [`Extractor`] that turns images into
//! fixed-length descriptors and a [`SimilarityMatcher`] that ranks stored
//! descriptors against a query.

// Pixel and histogram math converts between integer and float domains.
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

mod extractor;
mod matcher;

pub use extractor::{DescriptorExtractor, ExtractorConfig};
pub use matcher::{DEFAULT_MAX_RESULTS, DEFAULT_THRESHOLD, SimilarityMatcher};

use crate::Result;
use crate::models::{Descriptor, FeatureSpace, PixelBuffer};

/// Pipeline version stamped on every stored descriptor.
///
/// Bump whenever the extraction algorithm changes. Configurable settings
/// that move descriptors into another space are tagged separately in
/// [`FeatureSpace`].
pub const EXTRACTOR_VERSION: u32 = 1;

/// Trait for descriptor extractors.
pub trait Extractor: Send + Sync {
    /// Returns the descriptor length this extractor produces.
    fn feature_size(&self) -> usize;

    /// Returns the feature space of descriptors produced by this extractor.
    fn feature_space(&self) -> FeatureSpace;

    /// Extracts a descriptor from an image.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::ExtractionFailed`] if the image is absent,
    /// malformed, or cannot be processed.
    fn extract(&self, image: Option<&PixelBuffer>) -> Result<Descriptor>;

    /// Extracts descriptors for multiple images, preserving input order.
    fn extract_batch(&self, images: &[Option<&PixelBuffer>]) -> Vec<Result<Descriptor>> {
        images.iter().map(|image| self.extract(*image)).collect()
    }
}
