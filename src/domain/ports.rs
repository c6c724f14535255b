use crate::domain::model::{Batch, RecognizedText, TransformResult};
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait Storage: Send + Sync {
    fn write_file(
        &self,
        path: &str,
        data: &[u8],
    ) -> impl std::future::Future<Output = Result<()>> + Send;
}

pub trait ConfigProvider: Send + Sync {
    fn output_path(&self) -> &str;
    fn images(&self) -> &[String];
    fn image_dir(&self) -> Option<&str>;
    fn template_path(&self) -> Option<&str>;
    /// Previously exported `records.json` to render instead of scanning images.
    fn records_file(&self) -> Option<&str>;
    fn archive_name(&self) -> &str;
    fn include_summary(&self) -> bool;
}

/// An external text recognizer. Implementations receive encoded image bytes.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;
    async fn recognize(&self, image: &[u8]) -> Result<Vec<RecognizedText>>;
}

#[async_trait]
pub trait Pipeline: Send + Sync {
    async fn extract(&self) -> Result<Batch>;
    async fn transform(&self, batch: Batch) -> Result<TransformResult>;
    async fn load(&self, result: TransformResult) -> Result<String>;
    /// Writes `records.json` for review without rendering documents.
    async fn export_records(&self, batch: &Batch) -> Result<String>;
}
