//! Histogram + intensity descriptor extractor.
//!
//! Pipeline, in order:
//!
//! 1. Color input is reduced to luminance with BT.601 weights.
//! 2. The gray image is resized to a `grid_size` x `grid_size` grid with
//!    bilinear (triangle) interpolation, ignoring aspect ratio.
//! 3. A `histogram_bins`-bin intensity histogram is taken over `[0, 256)`.
//! 4. The grid is flattened row-major and scaled into `[0.0, 1.0]`.
//! 5. Histogram then pixels are concatenated and cut or zero-padded to
//!    exactly `feature_size` values.
//!
//! With the default configuration only the 32 histogram bins and the first
//! 480 normalized pixels survive step 5. Stored and query descriptors are
//! compared element by element, so this order is part of the format.

use super::{EXTRACTOR_VERSION, Extractor};
use crate::models::{Descriptor, FeatureSpace, PixelBuffer};
use crate::{Error, Result};
use image::GrayImage;
use image::imageops::{self, FilterType};
use rayon::prelude::*;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

/// BT.601 luma weights in 14-bit fixed point (0.299, 0.587, 0.114).
const LUMA_R: u32 = 4899;
const LUMA_G: u32 = 9617;
const LUMA_B: u32 = 1868;
const LUMA_SHIFT: u32 = 14;
const LUMA_ROUND: u32 = 1 << (LUMA_SHIFT - 1);

/// Extractor configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorConfig {
    /// Output descriptor length.
    pub feature_size: usize,
    /// Side of the square resampling grid.
    pub grid_size: u32,
    /// Number of intensity histogram bins.
    pub histogram_bins: usize,
}

impl ExtractorConfig {
    /// Reference descriptor length.
    pub const DEFAULT_FEATURE_SIZE: usize = 512;
    /// Reference grid side.
    pub const DEFAULT_GRID_SIZE: u32 = 64;
    /// Reference histogram bin count.
    pub const DEFAULT_HISTOGRAM_BINS: usize = 32;

    /// Creates the reference configuration.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            feature_size: Self::DEFAULT_FEATURE_SIZE,
            grid_size: Self::DEFAULT_GRID_SIZE,
            histogram_bins: Self::DEFAULT_HISTOGRAM_BINS,
        }
    }

    /// Sets the output descriptor length.
    #[must_use]
    pub const fn with_feature_size(mut self, feature_size: usize) -> Self {
        self.feature_size = feature_size;
        self
    }

    /// Sets the resampling grid side.
    #[must_use]
    pub const fn with_grid_size(mut self, grid_size: u32) -> Self {
        self.grid_size = grid_size;
        self
    }

    /// Sets the histogram bin count.
    #[must_use]
    pub const fn with_histogram_bins(mut self, bins: usize) -> Self {
        self.histogram_bins = bins;
        self
    }

    /// Length of the descriptor before truncation or padding.
    #[must_use]
    pub const fn raw_len(&self) -> usize {
        let side = self.grid_size as usize;
        self.histogram_bins + side * side
    }

    /// Feature space of descriptors produced with this configuration.
    #[must_use]
    pub fn feature_space(&self) -> FeatureSpace {
        FeatureSpace::new(
            EXTRACTOR_VERSION,
            self.grid_size,
            u32::try_from(self.histogram_bins).unwrap_or(u32::MAX),
        )
    }

    /// Checks that all values are usable.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a zero size or more than 256 bins.
    pub fn validate(&self) -> Result<()> {
        if self.feature_size == 0 {
            return Err(Error::InvalidInput("feature_size must be > 0".to_string()));
        }
        if self.grid_size == 0 {
            return Err(Error::InvalidInput("grid_size must be > 0".to_string()));
        }
        if self.histogram_bins == 0 || self.histogram_bins > 256 {
            return Err(Error::InvalidInput(format!(
                "histogram_bins must be in 1..=256, got {}",
                self.histogram_bins
            )));
        }
        Ok(())
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Descriptor extractor.
///
/// Stateless apart from its configuration; share it freely across threads.
#[derive(Debug, Clone, Default)]
pub struct DescriptorExtractor {
    config: ExtractorConfig,
}

impl DescriptorExtractor {
    /// Creates an extractor with the given configuration.
    #[must_use]
    pub const fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Creates an extractor after validating the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if the configuration is unusable.
    pub fn try_new(config: ExtractorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self::new(config))
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    /// Runs the pipeline, reporting failures with their cause.
    fn run_pipeline(&self, image: &PixelBuffer) -> Result<Vec<f32>> {
        self.config.validate()?;
        image.validate()?;

        let gray = to_grayscale(image)?;
        let side = self.config.grid_size;

        let grid = contain_panic("resize", || {
            imageops::resize(&gray, side, side, FilterType::Triangle)
        })?;

        let samples = grid.as_raw();
        let mut features = Vec::with_capacity(self.config.raw_len().max(self.config.feature_size));
        features.extend(histogram(samples, self.config.histogram_bins));
        features.extend(samples.iter().map(|&v| f32::from(v) / 255.0));

        features.resize(self.config.feature_size, 0.0);
        Ok(features)
    }
}

impl Extractor for DescriptorExtractor {
    fn feature_size(&self) -> usize {
        self.config.feature_size
    }

    fn feature_space(&self) -> FeatureSpace {
        self.config.feature_space()
    }

    fn extract(&self, image: Option<&PixelBuffer>) -> Result<Descriptor> {
        let start = Instant::now();
        let result = image
            .ok_or_else(|| Error::ExtractionFailed("no image supplied".to_string()))
            .and_then(|image| self.run_pipeline(image))
            .map(Descriptor::new)
            .map_err(|e| match e {
                Error::ExtractionFailed(_) => e,
                other => Error::ExtractionFailed(other.to_string()),
            });

        let status = if result.is_ok() { "success" } else { "error" };
        metrics::counter!("descriptor_extractions_total", "status" => status).increment(1);
        metrics::histogram!("descriptor_extraction_duration_ms", "status" => status)
            .record(start.elapsed().as_secs_f64() * 1000.0);

        if let Err(e) = &result {
            tracing::warn!(error = %e, "Descriptor extraction failed");
        }
        result
    }

    fn extract_batch(&self, images: &[Option<&PixelBuffer>]) -> Vec<Result<Descriptor>> {
        images.par_iter().map(|image| self.extract(*image)).collect()
    }
}

/// Runs a third-party step, turning a panic into [`Error::ExtractionFailed`].
///
/// Needs the unwind panic strategy, which every build profile keeps.
fn contain_panic<T>(step: &str, f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f))
        .map_err(|_| Error::ExtractionFailed(format!("{step} panicked")))
}

/// Reduces an image to one luminance channel.
fn to_grayscale(image: &PixelBuffer) -> Result<GrayImage> {
    let samples = image.samples();
    let luma = match image.channels() {
        1 => samples.to_vec(),
        channels @ (3 | 4) => samples
            .chunks_exact(usize::from(channels))
            .map(|px| luma(px[0], px[1], px[2]))
            .collect(),
        other => {
            return Err(Error::ExtractionFailed(format!(
                "unsupported channel count: {other}"
            )));
        },
    };

    GrayImage::from_raw(image.width(), image.height(), luma)
        .ok_or_else(|| Error::ExtractionFailed("grayscale buffer has wrong size".to_string()))
}

/// BT.601 luminance, rounded to nearest.
const fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = (r as u32 * LUMA_R + g as u32 * LUMA_G + b as u32 * LUMA_B + LUMA_ROUND) >> LUMA_SHIFT;
    // Weights sum to 1 << LUMA_SHIFT, so y <= 255.
    y as u8
}

/// Equal-width histogram over `[0, 256)`.
fn histogram(samples: &[u8], bins: usize) -> Vec<f32> {
    let mut counts = vec![0u32; bins];
    for &v in samples {
        counts[usize::from(v) * bins / 256] += 1;
    }
    counts.into_iter().map(|c| c as f32).collect()
}
