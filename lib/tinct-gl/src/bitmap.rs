#[cfg(feature = "img")]
use std::path::{Path, PathBuf};

use crate::{
    error::Result,
    texture::{check_pixel_data, AsPixelFormat, PixelFormat},
};
#[cfg(feature = "img")]
use crate::error::Error;

/// Decoded 8-bit pixels, rows stored top to bottom.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Bitmap {
    width: u32,
    height: u32,
    format: PixelFormat,
    pixels: Vec<u8>,
}

impl Bitmap {
    pub fn new(
        width: u32,
        height: u32,
        format: impl AsPixelFormat,
        pixels: impl Into<Vec<u8>>,
    ) -> Result<Self> {
        let format = format.pixel_format()?;
        let pixels = pixels.into();
        check_pixel_data(width, height, format, pixels.len())?;
        Ok(Self {
            width,
            height,
            format,
            pixels,
        })
    }

    /// Keeps images stored in one of the supported layouts as they are.
    #[cfg(feature = "img")]
    pub fn from_image(image: image::DynamicImage) -> Result<Self> {
        let (width, height) = (image.width(), image.height());
        let format = image.color().pixel_format()?;
        let pixels = match image {
            image::DynamicImage::ImageLuma8(buf) => buf.into_raw(),
            image::DynamicImage::ImageLumaA8(buf) => buf.into_raw(),
            image::DynamicImage::ImageRgb8(buf) => buf.into_raw(),
            image::DynamicImage::ImageRgba8(buf) => buf.into_raw(),
            other => return Err(Error::UnsupportedFormat(format!("{:?}", other.color()))),
        };
        Self::new(width, height, format, pixels)
    }

    #[cfg(feature = "img")]
    #[tracing::instrument]
    pub fn from_file(path: &Path) -> Result<Self> {
        let reader = image::io::Reader::open(path).map_err(|source| Error::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let image = reader.with_guessed_format().map_err(|source| Error::Io {
            path: PathBuf::from(path),
            source,
        })?;
        let bitmap = Self::from_image(image.decode()?)?;
        tracing::debug!(width = bitmap.width, height = bitmap.height, format = ?bitmap.format, "Loaded bitmap");
        Ok(bitmap)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Channels of the pixel at column `x`, row `y` (counted from the top).
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let channels = self.format.channels() as usize;
        let start = (y as usize * self.width as usize + x as usize) * channels;
        self.pixels.get(start..start + channels)
    }

    /// Reverses the row order. Texture coordinates start at the bottom row, image files at the top.
    pub fn flip_vertically(&mut self) {
        let stride = self.width as usize * self.format.channels() as usize;
        let rows = self.height as usize;
        for row in 0..rows / 2 {
            let (top, bottom) = self.pixels.split_at_mut((rows - 1 - row) * stride);
            top[row * stride..(row + 1) * stride].swap_with_slice(&mut bottom[..stride]);
        }
    }
}
