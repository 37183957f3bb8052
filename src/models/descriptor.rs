//! Descriptor types and their persisted byte layout.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Size in bytes of one encoded descriptor element.
pub const BYTES_PER_ELEMENT: usize = std::mem::size_of::<f32>();

/// Fixed-length numeric summary of an image.
///
/// Immutable once produced. The persisted form is a raw buffer of
/// little-endian `f32` values in element order, with no header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Descriptor(Vec<f32>);

impl Descriptor {
    /// Wraps a vector of values.
    #[must_use]
    pub const fn new(values: Vec<f32>) -> Self {
        Self(values)
    }

    /// Returns the values as a slice.
    #[must_use]
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the descriptor has no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Encodes the descriptor as little-endian `f32` bytes.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.0.iter().flat_map(|f| f.to_le_bytes()).collect()
    }

    /// Decodes a buffer produced by [`Descriptor::to_bytes`].
    ///
    /// Decoding is bit-exact: NaN payloads and signed zeros survive.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the length is not a multiple of 4.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() % BYTES_PER_ELEMENT != 0 {
            return Err(Error::InvalidInput(format!(
                "descriptor buffer length {} is not a multiple of {BYTES_PER_ELEMENT}",
                bytes.len()
            )));
        }
        let values = bytes
            .chunks_exact(BYTES_PER_ELEMENT)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();
        Ok(Self(values))
    }
}

impl From<Vec<f32>> for Descriptor {
    fn from(values: Vec<f32>) -> Self {
        Self(values)
    }
}

impl AsRef<[f32]> for Descriptor {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

/// The extractor settings that decide which feature space a descriptor
/// lives in.
///
/// Descriptors are only comparable within one space. Length is checked
/// separately against the configured feature size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct FeatureSpace {
    /// Pipeline version.
    pub version: u32,
    /// Side of the square resampling grid.
    pub grid_size: u32,
    /// Number of intensity histogram bins.
    pub histogram_bins: u32,
}

impl FeatureSpace {
    /// Creates a feature space tag.
    #[must_use]
    pub const fn new(version: u32, grid_size: u32, histogram_bins: u32) -> Self {
        Self {
            version,
            grid_size,
            histogram_bins,
        }
    }
}

impl fmt::Display for FeatureSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "v{} ({}x{} grid, {} bins)",
            self.version, self.grid_size, self.grid_size, self.histogram_bins
        )
    }
}

/// A descriptor as persisted next to a catalog item.
#[derive(Debug, Clone, PartialEq)]
pub struct DescriptorRecord {
    /// The descriptor values.
    pub descriptor: Descriptor,
    /// Feature space the descriptor was extracted in.
    pub space: FeatureSpace,
    /// SHA-256 (hex) of the source image bytes, when known.
    pub source_digest: Option<String>,
    /// When the descriptor was extracted.
    pub extracted_at: DateTime<Utc>,
}

impl DescriptorRecord {
    /// Creates a record stamped with the current time.
    #[must_use]
    pub fn new(descriptor: Descriptor, space: FeatureSpace) -> Self {
        Self {
            descriptor,
            space,
            source_digest: None,
            extracted_at: Utc::now(),
        }
    }

    /// Attaches the digest of the source image.
    #[must_use]
    pub fn with_source_digest(mut self, digest: impl Into<String>) -> Self {
        self.source_digest = Some(digest.into());
        self
    }

    /// Returns true if the record was extracted in the given feature space.
    #[must_use]
    pub fn is_in(&self, space: &FeatureSpace) -> bool {
        self.space == *space
    }
}

impl fmt::Display for DescriptorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} dims] @ {}",
            self.space,
            self.descriptor.len(),
            self.extracted_at.to_rfc3339()
        )
    }
}
