pub mod card_parser;
pub mod etl;
pub mod ocr;
pub mod qr_payload;
pub mod reconcile;
pub mod text;

pub use crate::domain::model::{Batch, CardRecord, IdRecord, TransformResult};
pub use crate::domain::ports::{ConfigProvider, OcrEngine, Pipeline, Storage};
pub use crate::utils::error::Result;
