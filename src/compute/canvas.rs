//! Pixel buffers shared by the rasterizer, the fitness evaluator and the
//! snapshot writer.

use std::path::{Path, PathBuf};

use image::{DynamicImage, Rgb, RgbImage};

/// Errors raised while building or loading a canvas.
#[derive(Debug, thiserror::Error)]
pub enum CanvasError {
    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("Canvas dimensions must be non-zero")]
    EmptyImage,
    #[error("Pixel buffer holds {actual} pixels, expected {expected}")]
    PixelCount { expected: usize, actual: usize },
    #[error("Canvas is {actual:?}, expected {expected:?}")]
    DimensionMismatch {
        expected: (usize, usize),
        actual: (usize, usize),
    },
}

/// Row-major RGB buffer with channels in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    width: usize,
    height: usize,
    pixels: Vec<[f64; 3]>,
}

impl Canvas {
    /// Canvas filled with a single color.
    pub fn new(width: usize, height: usize, color: [f64; 3]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; width * height],
        }
    }

    /// Canvas from an existing row-major buffer.
    pub fn from_pixels(
        width: usize,
        height: usize,
        pixels: Vec<[f64; 3]>,
    ) -> Result<Self, CanvasError> {
        if width == 0 || height == 0 {
            return Err(CanvasError::EmptyImage);
        }
        if pixels.len() != width * height {
            return Err(CanvasError::PixelCount {
                expected: width * height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Load and decode an image file. Alpha is discarded.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, CanvasError> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|source| CanvasError::ImageLoad {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_dynamic_image(&image)
    }

    /// Convert a decoded image of any color type.
    pub fn from_dynamic_image(image: &DynamicImage) -> Result<Self, CanvasError> {
        Self::from_rgb_image(&image.to_rgb8())
    }

    /// Convert an 8-bit RGB image.
    pub fn from_rgb_image(image: &RgbImage) -> Result<Self, CanvasError> {
        let pixels = image
            .pixels()
            .map(|Rgb([r, g, b])| [*r as f64 / 255.0, *g as f64 / 255.0, *b as f64 / 255.0])
            .collect();
        Self::from_pixels(image.width() as usize, image.height() as usize, pixels)
    }

    /// Quantize to an 8-bit RGB image.
    pub fn to_rgb_image(&self) -> RgbImage {
        let mut image = RgbImage::new(self.width as u32, self.height as u32);
        for (out, px) in image.pixels_mut().zip(&self.pixels) {
            *out = Rgb(px.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8));
        }
        image
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn dimensions(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    /// Number of pixels.
    #[inline]
    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    #[inline]
    pub fn pixels(&self) -> &[[f64; 3]] {
        &self.pixels
    }

    #[inline]
    pub fn pixels_mut(&mut self) -> &mut [[f64; 3]] {
        &mut self.pixels
    }

    /// Pixel at (x, y).
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> [f64; 3] {
        self.pixels[y * self.width + x]
    }

    /// Fail unless `other` has the same dimensions.
    pub fn ensure_same_dimensions(&self, other: &Canvas) -> Result<(), CanvasError> {
        if self.dimensions() == other.dimensions() {
            Ok(())
        } else {
            Err(CanvasError::DimensionMismatch {
                expected: self.dimensions(),
                actual: other.dimensions(),
            })
        }
    }
}
