use crate::adapters::preprocess::adaptive_threshold;
use crate::utils::error::Result;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Images narrower than this are also tried at twice the size.
const UPSCALE_BELOW: u32 = 1000;

/// Decode every QR symbol found in an encoded image.
///
/// The plain grayscale image is tried first, then a thresholded copy, then
/// (for small photos) a 2x upscale. Payloads are returned once each, in the
/// order they were first found.
pub fn decode_qr_codes(bytes: &[u8]) -> Result<Vec<String>> {
    let gray = image::load_from_memory(bytes)?.to_luma8();

    let mut payloads: Vec<String> = Vec::new();
    let mut attempts = vec![gray.clone(), adaptive_threshold(&gray, 25, 10)];
    if gray.width() < UPSCALE_BELOW {
        attempts.push(imageops::resize(
            &gray,
            gray.width() * 2,
            gray.height() * 2,
            FilterType::Triangle,
        ));
    }

    for (index, candidate) in attempts.iter().enumerate() {
        for payload in decode_gray(candidate) {
            if !payloads.contains(&payload) {
                payloads.push(payload);
            }
        }
        if !payloads.is_empty() {
            tracing::debug!("QR decoded on attempt {}", index + 1);
            break;
        }
    }

    Ok(payloads)
}

fn decode_gray(gray: &GrayImage) -> Vec<String> {
    let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
        gray.width() as usize,
        gray.height() as usize,
        |x, y| gray.get_pixel(x as u32, y as u32)[0],
    );

    prepared
        .detect_grids()
        .into_iter()
        .filter_map(|grid| match grid.decode() {
            Ok((_, content)) => Some(content),
            Err(e) => {
                tracing::debug!("QR grid found but not decodable: {:?}", e);
                None
            }
        })
        .collect()
}
