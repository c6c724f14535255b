mod common;
pub mod ocr_pipeline;
pub mod qr_pipeline;

pub use ocr_pipeline::OcrPipeline;
pub use qr_pipeline::QrPipeline;
