use super::common;
use crate::adapters::preprocess::preprocess;
use crate::core::card_parser::parse_recognized;
use crate::core::ocr::merge_variants;
use crate::core::{ConfigProvider, OcrEngine, Pipeline, Storage};
use crate::domain::model::{Batch, CardRecord, ExtractionSource, TransformResult};
use crate::utils::error::{EtlError, Result};
use std::sync::Arc;

/// Reads the front face of each card with an OCR engine.
pub struct OcrPipeline<S: Storage, C: ConfigProvider> {
    storage: S,
    config: C,
    engine: Arc<dyn OcrEngine>,
}

impl<S: Storage, C: ConfigProvider> OcrPipeline<S, C> {
    pub fn new(storage: S, config: C, engine: Arc<dyn OcrEngine>) -> Self {
        Self {
            storage,
            config,
            engine,
        }
    }

    async fn read_card(&self, image_name: String, bytes: Vec<u8>) -> Result<CardRecord> {
        let variants = tokio::task::spawn_blocking(move || preprocess(&bytes))
            .await
            .map_err(|e| EtlError::ProcessingError {
                message: format!("preprocessing task failed: {}", e),
            })??;

        let mut results = Vec::with_capacity(variants.len());
        let mut last_error = None;
        for variant in &variants {
            match self.engine.recognize(&variant.png).await {
                Ok(items) => {
                    tracing::debug!(
                        "{} [{}]: {} text boxes",
                        image_name,
                        variant.kind.as_str(),
                        items.len()
                    );
                    results.push(items);
                }
                Err(e) => {
                    tracing::warn!(
                        "{} [{}]: {} failed: {}",
                        image_name,
                        variant.kind.as_str(),
                        self.engine.name(),
                        e
                    );
                    last_error = Some(e);
                }
            }
        }

        if results.is_empty() {
            return Err(last_error.unwrap_or_else(|| EtlError::OcrError {
                engine: self.engine.name().to_string(),
                message: "no image variants to recognize".to_string(),
            }));
        }

        let merged = merge_variants(results);
        let fields = parse_recognized(&merged);
        if fields.is_empty() {
            return Err(EtlError::ProcessingError {
                message: format!(
                    "no card fields recognized in {} text boxes; use the front face of the card",
                    merged.len()
                ),
            });
        }

        Ok(CardRecord {
            image_name,
            source: ExtractionSource::Ocr,
            fields,
            raw_lines: merged.into_iter().map(|item| item.text).collect(),
        })
    }
}

#[async_trait::async_trait]
impl<S: Storage, C: ConfigProvider> Pipeline for OcrPipeline<S, C> {
    async fn extract(&self) -> Result<Batch> {
        if let Some(path) = self.config.records_file() {
            return common::import_records(path).await;
        }

        let paths = common::collect_images(&self.config).await?;
        tracing::info!("📥 Recognizing {} images with {}", paths.len(), self.engine.name());
        common::scan_images(&paths, |name, bytes| self.read_card(name, bytes)).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::docx::tests::{build_docx, read_part};
    use crate::adapters::preprocess::encode_png;
    use crate::domain::model::RecognizedText;
    use async_trait::async_trait;
    use image::{DynamicImage, GrayImage, Luma};
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Clone)]
    struct MockStorage {
        files: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    }

    impl MockStorage {
        fn new() -> Self {
            Self {
                files: Arc::new(Mutex::new(HashMap::new())),
            }
        }

        async fn get_file(&self, path: &str) -> Option<Vec<u8>> {
            let files = self.files.lock().await;
            files.get(path).cloned()
        }
    }

    impl Storage for MockStorage {
        async fn write_file(&self, path: &str, data: &[u8]) -> Result<()> {
            let mut files = self.files.lock().await;
            files.insert(path.to_string(), data.to_vec());
            Ok(())
        }
    }

    struct MockConfig {
        images: Vec<String>,
        template: Option<String>,
    }

    impl ConfigProvider for MockConfig {
        fn output_path(&self) -> &str {
            "test_output"
        }

        fn images(&self) -> &[String] {
            &self.images
        }

        fn image_dir(&self) -> Option<&str> {
            None
        }

        fn template_path(&self) -> Option<&str> {
            self.template.as_deref()
        }

        fn records_file(&self) -> Option<&str> {
            None
        }

        fn archive_name(&self) -> &str {
            "ocr_results.zip"
        }

        fn include_summary(&self) -> bool {
            true
        }
    }

    /// Returns the same front-face text for every image variant.
    struct FrontFaceEngine;

    #[async_trait]
    impl OcrEngine for FrontFaceEngine {
        fn name(&self) -> &str {
            "mock"
        }

        async fn recognize(&self, _image: &[u8]) -> Result<Vec<RecognizedText>> {
            let lines = [
                "CĂN CƯỚC CÔNG DÂN",
                "Số / No.: 001203004567",
                "Họ và tên / Full name:",
                "NGUYỄN VĂN AN",
                "Ngày sinh / Date of birth: 15/08/1995",
                "Giới tính / Sex: Nam Quốc tịch / Nationality: Việt Nam",
            ];
            Ok(lines
                .iter()
                .enumerate()
                .map(|(i, text)| RecognizedText::from_rect(10.0, 20.0 * i as f32, 300.0, 18.0, *text, 0.9))
                .collect())
        }
    }

    fn png() -> Vec<u8> {
        encode_png(DynamicImage::ImageLuma8(GrayImage::from_pixel(32, 20, Luma([200])))).unwrap()
    }

    #[tokio::test]
    async fn test_extract_reads_cards_and_skips_bad_images() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("front.png");
        let bad = dir.path().join("broken.png");
        std::fs::write(&good, png()).unwrap();
        std::fs::write(&bad, b"not a png").unwrap();

        let config = MockConfig {
            images: vec![good.display().to_string(), bad.display().to_string()],
            template: None,
        };
        let pipeline = OcrPipeline::new(MockStorage::new(), config, Arc::new(FrontFaceEngine));

        let batch = pipeline.extract().await.unwrap();

        assert_eq!(batch.records.len(), 1);
        assert_eq!(batch.records[0].fields.id_number, "001203004567");
        assert_eq!(batch.records[0].fields.full_name, "NGUYỄN VĂN AN");
        assert_eq!(batch.records[0].source, ExtractionSource::Ocr);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].image_name, "broken.png");
    }

    #[tokio::test]
    async fn test_full_run_writes_archive_and_records() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("front.png");
        std::fs::write(&image, png()).unwrap();
        let template = dir.path().join("template.docx");
        let xml = r#"<w:document><w:body><w:p><w:r><w:t>{{ ho_va_ten }} - {{ so }}</w:t></w:r></w:p></w:body></w:document>"#;
        std::fs::write(&template, build_docx(xml, &[])).unwrap();

        let storage = MockStorage::new();
        let config = MockConfig {
            images: vec![image.display().to_string()],
            template: Some(template.display().to_string()),
        };
        let pipeline = OcrPipeline::new(storage.clone(), config, Arc::new(FrontFaceEngine));

        let batch = pipeline.extract().await.unwrap();
        let result = pipeline.transform(batch).await.unwrap();
        assert_eq!(result.documents.len(), 1);
        assert_eq!(result.documents[0].entry_name, "front_result.docx");
        assert!(read_part(&result.documents[0].content, "word/document.xml")
            .contains("NGUYỄN VĂN AN - 001203004567"));

        let output = pipeline.load(result).await.unwrap();
        assert_eq!(output, "test_output/ocr_results.zip");

        let zip_bytes = storage.get_file("ocr_results.zip").await.unwrap();
        let archive = zip::ZipArchive::new(std::io::Cursor::new(zip_bytes)).unwrap();
        let names: Vec<&str> = archive.file_names().collect();
        assert!(names.contains(&"front_result.docx"));
        assert!(names.contains(&"summary.csv"));
        assert!(storage.get_file("records.json").await.is_some());
    }

    #[tokio::test]
    async fn test_transform_requires_template() {
        let config = MockConfig {
            images: vec![],
            template: None,
        };
        let pipeline = OcrPipeline::new(MockStorage::new(), config, Arc::new(FrontFaceEngine));
        let err = pipeline.transform(Batch::default()).await.unwrap_err();
        assert!(matches!(err, EtlError::ConfigValidationError { .. }));
    }
}
