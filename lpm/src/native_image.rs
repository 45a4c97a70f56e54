use std::path::Path;

use image::DynamicImage;
use lpm_sys::*;

use crate::error::{LpmError, Result};
use crate::types::BoundingBox;

/// A host-owned 8-bit image exposed to the engine as an `ERImage`.
///
/// The pixel buffer and the row table live inside this value, so the
/// `ERImage` returned by [`as_raw`](Self::as_raw) is valid for as long as the
/// `Image` is borrowed.
pub struct Image {
    raw: ERImage,
    data: Vec<u8>,
    rows: Vec<*mut u8>,
}

// SAFETY: the raw pointers only point into `data`, which this value owns, and
// the engine reads the pixels without keeping them past a call.
unsafe impl Send for Image {}
// SAFETY: shared references never write through the pointers.
unsafe impl Sync for Image {}

impl Image {
    /// Wraps packed BGR pixels, three bytes per pixel.
    pub fn from_bgr(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::wrap(width, height, 3, ER_IMAGE_COLORMODEL_BGR, data)
    }

    /// Wraps packed 8-bit gray pixels.
    pub fn from_gray(width: u32, height: u32, data: Vec<u8>) -> Result<Self> {
        Self::wrap(width, height, 1, ER_IMAGE_COLORMODEL_GRAY, data)
    }

    /// A black BGR image.
    pub fn blank(width: u32, height: u32) -> Result<Self> {
        let len = width as usize * height as usize * 3;
        Self::from_bgr(width, height, vec![0; len])
    }

    /// Converts any decoded image to BGR.
    pub fn from_dynamic(img: &DynamicImage) -> Result<Self> {
        let rgb = img.to_rgb8();
        let (width, height) = rgb.dimensions();
        let mut data = rgb.into_raw();
        for pixel in data.chunks_exact_mut(3) {
            pixel.swap(0, 2);
        }
        Self::from_bgr(width, height, data)
    }

    /// Decodes an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let img = image::open(path.as_ref())?;
        Self::from_dynamic(&img)
    }

    fn wrap(
        width: u32,
        height: u32,
        channels: u32,
        color_model: ERImageColorModel,
        mut data: Vec<u8>,
    ) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(LpmError::InvalidArgument(format!(
                "image must not be empty, got {width}x{height}"
            )));
        }
        let step = width
            .checked_mul(channels)
            .ok_or_else(|| LpmError::InvalidArgument("image row too large".to_string()))?;
        let expected = step as usize * height as usize;
        if data.len() != expected {
            return Err(LpmError::InvalidArgument(format!(
                "expected {expected} bytes for {width}x{height}x{channels}, got {}",
                data.len()
            )));
        }
        let size = u32::try_from(expected)
            .map_err(|_| LpmError::InvalidArgument("image too large".to_string()))?;

        let base = data.as_mut_ptr();
        let mut rows: Vec<*mut u8> = (0..height as usize)
            // SAFETY: every row start lies inside `data`.
            .map(|y| unsafe { base.add(y * step as usize) })
            .collect();

        let raw = ERImage {
            color_model,
            data_type: ER_IMAGE_DATATYPE_UCHAR,
            size,
            width,
            height,
            step,
            depth: 8,
            num_channels: channels,
            data_allocated: 0,
            data: base,
            row_data: rows.as_mut_ptr(),
        };

        Ok(Self { raw, data, rows })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.raw.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.raw.height
    }

    /// Channels per pixel.
    pub fn channels(&self) -> u32 {
        self.raw.num_channels
    }

    /// Packed pixel bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Box covering the whole image.
    pub fn full_box(&self) -> BoundingBox {
        BoundingBox::full_image(self.width(), self.height())
    }

    /// The structure handed to the engine by value.
    pub fn as_raw(&self) -> ERImage {
        debug_assert_eq!(self.rows.len(), self.raw.height as usize);
        self.raw
    }
}

impl std::fmt::Debug for Image {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Image")
            .field("width", &self.raw.width)
            .field("height", &self.raw.height)
            .field("channels", &self.raw.num_channels)
            .finish()
    }
}
