//! Image loading

use image::{DynamicImage, GenericImageView};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// An image file could not be read or decoded
#[derive(Error, Debug)]
#[error("Failed to load image {path:?}: {source}")]
pub struct ImageLoadError {
    pub path: PathBuf,
    #[source]
    pub source: image::ImageError,
}

/// Decoded image pixels, tightly packed and row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub bytes_per_pixel: u32,
    pub pixels: Vec<u8>,
}

impl Image {
    /// Load image from file, decoded to RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown")
            .to_string();

        let img = image::open(path).map_err(|source| ImageLoadError {
            path: path.to_path_buf(),
            source,
        })?;
        let image = Self::from_image(img, &name);

        log::debug!(
            "Loaded image {} ({}x{}, {} channels)",
            image.name,
            image.width,
            image.height,
            image.bytes_per_pixel
        );
        Ok(image)
    }

    fn from_image(img: DynamicImage, name: &str) -> Self {
        let (width, height) = img.dimensions();
        let pixels = img.to_rgba8().into_raw();

        Self {
            name: name.to_string(),
            width,
            height,
            bytes_per_pixel: 4,
            pixels,
        }
    }

    /// Wrap already decoded pixels.
    ///
    /// Returns `None` when `pixels` does not hold exactly
    /// `width * height * bytes_per_pixel` bytes.
    pub fn from_raw(
        name: &str,
        width: u32,
        height: u32,
        bytes_per_pixel: u32,
        pixels: Vec<u8>,
    ) -> Option<Self> {
        let expected = width as usize * height as usize * bytes_per_pixel as usize;
        (pixels.len() == expected).then(|| Self {
            name: name.to_string(),
            width,
            height,
            bytes_per_pixel,
            pixels,
        })
    }

    /// Row stride in bytes
    pub fn stride(&self) -> usize {
        self.width as usize * self.bytes_per_pixel as usize
    }
}
