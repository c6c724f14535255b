//! Image variants fed to the OCR engine.
//!
//! Card photos vary a lot in lighting, so every image is recognized several
//! times: cleaned up and binarized, plain grayscale, and as taken.

use crate::utils::error::Result;
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::{box_filter, median_filter};
use std::io::Cursor;

const THRESHOLD_RADIUS: u32 = 15;
const THRESHOLD_OFFSET: i16 = 7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantKind {
    Processed,
    Gray,
    Original,
}

impl VariantKind {
    pub fn as_str(self) -> &'static str {
        match self {
            VariantKind::Processed => "processed",
            VariantKind::Gray => "gray",
            VariantKind::Original => "original",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImageVariant {
    pub kind: VariantKind,
    /// PNG encoded.
    pub png: Vec<u8>,
}

/// Decode `bytes` and build the processed, gray and original variants, in that order.
pub fn preprocess(bytes: &[u8]) -> Result<Vec<ImageVariant>> {
    let original = image::load_from_memory(bytes)?;
    let gray = original.to_luma8();
    let processed = binarize(&gray);

    tracing::debug!(
        "Preprocessed {}x{} image into 3 variants",
        gray.width(),
        gray.height()
    );

    Ok(vec![
        ImageVariant {
            kind: VariantKind::Processed,
            png: encode_png(DynamicImage::ImageLuma8(processed))?,
        },
        ImageVariant {
            kind: VariantKind::Gray,
            png: encode_png(DynamicImage::ImageLuma8(gray))?,
        },
        ImageVariant {
            kind: VariantKind::Original,
            png: encode_png(original)?,
        },
    ])
}

/// Denoise, equalize, then threshold against the local mean.
pub fn binarize(gray: &GrayImage) -> GrayImage {
    let denoised = median_filter(gray, 1, 1);
    let equalized = equalize_histogram(&denoised);
    adaptive_threshold(&equalized, THRESHOLD_RADIUS, THRESHOLD_OFFSET)
}

/// A pixel is white when brighter than its neighbourhood mean minus `offset`.
pub fn adaptive_threshold(image: &GrayImage, radius: u32, offset: i16) -> GrayImage {
    let mean = box_filter(image, radius, radius);
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y)[0] as i16;
        let local = mean.get_pixel(x, y)[0] as i16;
        if pixel > local - offset {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

pub(crate) fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, ImageFormat::Png)?;
    Ok(buffer.into_inner())
}
