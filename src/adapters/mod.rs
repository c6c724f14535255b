// Adapters layer: image processing, OCR backends, QR decoding and file formats.

pub mod archive;
pub mod docx;
pub mod http_ocr;
pub mod preprocess;
pub mod qr;
pub mod spreadsheet;
pub mod tesseract;

use crate::domain::ports::OcrEngine;
use crate::utils::error::Result;
use std::sync::Arc;

/// Which OCR backend to build, with its settings.
#[derive(Debug, Clone, PartialEq)]
pub enum OcrBackend {
    Tesseract {
        binary: String,
        languages: String,
        psm: u8,
    },
    Http {
        endpoint: String,
        timeout_secs: u64,
    },
}

pub fn build_ocr_engine(backend: &OcrBackend) -> Result<Arc<dyn OcrEngine>> {
    match backend {
        OcrBackend::Tesseract {
            binary,
            languages,
            psm,
        } => {
            tracing::info!("🔤 Using tesseract OCR ({}, psm {})", languages, psm);
            Ok(Arc::new(tesseract::TesseractEngine::new(
                binary.as_str(),
                languages.as_str(),
                *psm,
            )))
        }
        OcrBackend::Http {
            endpoint,
            timeout_secs,
        } => {
            tracing::info!("🔤 Using OCR service at {}", endpoint);
            Ok(Arc::new(http_ocr::HttpOcrEngine::new(
                endpoint.as_str(),
                *timeout_secs,
            )?))
        }
    }
}
