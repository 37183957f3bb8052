//! Decoded image buffers.

use crate::{Error, Result};
use image::DynamicImage;

/// A decoded image: `height` rows of `width` pixels, each with `channels`
/// interleaved `u8` samples (channel-last).
///
/// Supported layouts are grayscale (1 channel), RGB (3) and RGBA (4). The
/// buffer is never mutated by the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    channels: u8,
    samples: Vec<u8>,
}

impl PixelBuffer {
    /// Wraps raw samples without validating them.
    ///
    /// Malformed buffers are accepted here and rejected at extraction time,
    /// so callers holding arbitrary arrays get an `ExtractionFailed` rather
    /// than a construction error.
    #[must_use]
    pub const fn from_raw(width: u32, height: u32, channels: u8, samples: Vec<u8>) -> Self {
        Self {
            width,
            height,
            channels,
            samples,
        }
    }

    /// Creates a single-channel image.
    #[must_use]
    pub const fn gray(width: u32, height: u32, samples: Vec<u8>) -> Self {
        Self::from_raw(width, height, 1, samples)
    }

    /// Creates an RGB image.
    #[must_use]
    pub const fn rgb(width: u32, height: u32, samples: Vec<u8>) -> Self {
        Self::from_raw(width, height, 3, samples)
    }

    /// Creates an image filled with one RGB color.
    #[must_use]
    pub fn solid_rgb(width: u32, height: u32, color: [u8; 3]) -> Self {
        let pixels = (width as usize) * (height as usize);
        let samples = color.iter().copied().cycle().take(pixels * 3).collect();
        Self::rgb(width, height, samples)
    }

    /// Converts a decoded image, keeping gray images single-channel and
    /// flattening everything else to 8-bit RGB.
    ///
    /// Alpha is dropped and high bit-depth images are scaled down to 8 bits.
    #[must_use]
    pub fn from_dynamic(image: &DynamicImage) -> Self {
        match image {
            DynamicImage::ImageLuma8(gray) => {
                Self::gray(gray.width(), gray.height(), gray.as_raw().clone())
            },
            DynamicImage::ImageLuma16(_)
            | DynamicImage::ImageLumaA8(_)
            | DynamicImage::ImageLumaA16(_) => {
                let gray = image.to_luma8();
                Self::gray(gray.width(), gray.height(), gray.into_raw())
            },
            _ => {
                let rgb = image.to_rgb8();
                Self::rgb(rgb.width(), rgb.height(), rgb.into_raw())
            },
        }
    }

    /// Decodes encoded image bytes (PNG, JPEG, BMP, GIF, `WebP`).
    ///
    /// # Errors
    ///
    /// Returns [`Error::ImageDecode`] if the format is unknown or the data is
    /// corrupt.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.is_empty() {
            return Err(Error::ImageDecode("empty image payload".to_string()));
        }
        let image =
            image::load_from_memory(bytes).map_err(|e| Error::ImageDecode(e.to_string()))?;
        Ok(Self::from_dynamic(&image))
    }

    /// Image width in pixels.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    #[must_use]
    pub const fn channels(&self) -> u8 {
        self.channels
    }

    /// Raw interleaved samples.
    #[must_use]
    pub fn samples(&self) -> &[u8] {
        &self.samples
    }

    /// Checks that the buffer describes a supported, consistent image.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for zero dimensions, an unsupported
    /// channel count, or a sample count that does not match the shape.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidInput(format!(
                "image has zero dimension ({}x{})",
                self.width, self.height
            )));
        }
        if !matches!(self.channels, 1 | 3 | 4) {
            return Err(Error::InvalidInput(format!(
                "unsupported channel count: {}",
                self.channels
            )));
        }
        let expected = (self.width as usize)
            .checked_mul(self.height as usize)
            .and_then(|n| n.checked_mul(usize::from(self.channels)))
            .ok_or_else(|| Error::InvalidInput("image dimensions overflow".to_string()))?;
        if self.samples.len() != expected {
            return Err(Error::InvalidInput(format!(
                "sample count mismatch: expected {expected}, got {}",
                self.samples.len()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, ImageFormat, Luma, Rgb, RgbImage};
    use std::io::Cursor;

    #[test]
    fn test_solid_rgb_layout() {
        let img = PixelBuffer::solid_rgb(2, 2, [10, 20, 30]);
        assert_eq!(img.samples(), &[10, 20, 30, 10, 20, 30, 10, 20, 30, 10, 20, 30]);
        assert_eq!(img.channels(), 3);
        assert!(img.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_malformed() {
        assert!(PixelBuffer::gray(0, 4, Vec::new()).validate().is_err());
        assert!(PixelBuffer::gray(2, 2, vec![0; 3]).validate().is_err());
        assert!(PixelBuffer::from_raw(2, 2, 2, vec![0; 8]).validate().is_err());
        assert!(PixelBuffer::from_raw(1, 1, 4, vec![0; 4]).validate().is_ok());
    }

    #[test]
    fn test_from_dynamic_keeps_gray_single_channel() {
        let gray = GrayImage::from_pixel(3, 2, Luma([77]));
        let buffer = PixelBuffer::from_dynamic(&DynamicImage::ImageLuma8(gray));
        assert_eq!(buffer.channels(), 1);
        assert_eq!(buffer.samples(), &[77; 6]);
    }

    #[test]
    fn test_decode_png_roundtrip() {
        let rgb = RgbImage::from_pixel(4, 3, Rgb([1, 2, 3]));
        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(rgb)
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();

        let decoded = PixelBuffer::decode(&bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 3);
        assert_eq!(decoded.channels(), 3);
        assert_eq!(&decoded.samples()[..3], &[1, 2, 3]);
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(matches!(
            PixelBuffer::decode(b"definitely not an image"),
            Err(Error::ImageDecode(_))
        ));
        assert!(matches!(PixelBuffer::decode(&[]), Err(Error::ImageDecode(_))));
    }
}
