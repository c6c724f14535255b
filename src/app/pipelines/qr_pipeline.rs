use super::common;
use crate::adapters::qr::decode_qr_codes;
use crate::core::qr_payload::first_cccd_record;
use crate::core::{ConfigProvider, Pipeline, Storage};
use crate::domain::model::{Batch, CardRecord, ExtractionSource, TransformResult};
use crate::utils::error::{EtlError, Result};

/// Reads the QR code printed on the back face of chip-based cards.
pub struct QrPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
}

impl<S: Storage, C: ConfigProvider> QrPipeline<S, C> {
    pub fn new(storage: S, config: C) -> Self {
        Self { storage, config }
    }
}

async fn read_card(image_name: String, bytes: Vec<u8>) -> Result<CardRecord> {
    let payloads = tokio::task::spawn_blocking(move || decode_qr_codes(&bytes))
        .await
        .map_err(|e| EtlError::ProcessingError {
            message: format!("QR decoding task failed: {}", e),
        })??;

    tracing::debug!("{}: {} QR payloads", image_name, payloads.len());
    let fields = first_cccd_record(&payloads)?;

    Ok(CardRecord {
        image_name,
        source: ExtractionSource::Qr,
        fields,
        raw_lines: payloads,
    })
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for QrPipeline<S, C> {
    async fn extract(&self) -> Result<Batch> {
        if let Some(path) = self.config.records_file() {
            return common::import_records(path).await;
        }

        let paths = common::collect_images(&self.config).await?;
        tracing::info!("📥 Decoding QR codes in {} images", paths.len());
        common::scan_images(&paths, read_card).await
    }

    async fn transform(&self, batch: Batch) -> Result<TransformResult> {
        let template = common::load_template(self.config.template_path()).await?;
        common::render_batch(&template, batch)
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        common::write_archive(&self.storage, &self.config, result).await
    }

    async fn export_records(&self, batch: &Batch) -> Result<String> {
        common::write_records(&self.storage, &self.config, &batch.records, &batch.failures).await
    }
}
