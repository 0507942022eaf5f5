// Fixed-layout pixel buffer descriptor handed to RunOcrPipeline.

use std::marker::PhantomData;

use image::RgbaImage;

use crate::error::{OcrError, Result};

/// Format tag the engine expects for 4-channel 8-bit colour input.
pub const PIXEL_FORMAT_RGBA: i32 = 3;

const CHANNELS: usize = 4;

/// Borrowed view of an RGBA buffer in the engine's layout:
/// `{ i32 format; i32 width; i32 height; i32 reserved; i64 stride; *const u8 data }`.
///
/// The lifetime ties the descriptor to the pixel buffer, so the buffer cannot
/// be dropped or moved while a descriptor for it exists.
#[repr(C)]
#[derive(Debug)]
pub struct ImageDescriptor<'a> {
    format: i32,
    width: i32,
    height: i32,
    reserved: i32,
    stride: i64,
    data: *const u8,
    _pixels: PhantomData<&'a [u8]>,
}

impl<'a> ImageDescriptor<'a> {
    /// Describe a tightly packed RGBA buffer (`stride == width * 4`).
    ///
    /// # Errors
    /// `InvalidImage` if either dimension is zero or exceeds `i32::MAX`, or
    /// if `data.len() != width * height * 4`.
    pub fn from_rgba(width: u32, height: u32, data: &'a [u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(OcrError::invalid_image(format!(
                "image has zero area ({}x{})",
                width, height
            )));
        }

        let (w, h) = match (i32::try_from(width), i32::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(OcrError::invalid_image(format!(
                    "image dimensions exceed i32::MAX ({}x{})",
                    width, height
                )));
            }
        };

        let stride = (width as usize)
            .checked_mul(CHANNELS)
            .ok_or_else(|| OcrError::invalid_image("row stride overflows usize"))?;
        let expected = stride.checked_mul(height as usize).ok_or_else(|| {
            OcrError::invalid_image(format!(
                "overflow computing buffer size for {}x{} RGBA image",
                width, height
            ))
        })?;
        if data.len() != expected {
            return Err(OcrError::invalid_image(format!(
                "data size mismatch: expected {} bytes, got {}",
                expected,
                data.len()
            )));
        }

        Ok(ImageDescriptor {
            format: PIXEL_FORMAT_RGBA,
            width: w,
            height: h,
            reserved: 0,
            stride: stride as i64,
            data: data.as_ptr(),
            _pixels: PhantomData,
        })
    }

    pub fn from_rgba_image(image: &'a RgbaImage) -> Result<Self> {
        Self::from_rgba(image.width(), image.height(), image.as_raw())
    }

    pub fn format(&self) -> i32 {
        self.format
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn stride(&self) -> i64 {
        self.stride
    }

    pub fn data(&self) -> *const u8 {
        self.data
    }
}
