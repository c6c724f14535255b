use crate::core::Pipeline;
use crate::utils::error::Result;
use crate::utils::monitor::SystemMonitor;

pub struct EtlEngine<P: Pipeline> {
    pipeline: P,
    monitor: SystemMonitor,
}

impl<P: Pipeline> EtlEngine<P> {
    pub fn new(pipeline: P) -> Self {
        Self::new_with_monitoring(pipeline, false)
    }

    pub fn new_with_monitoring(pipeline: P, monitor_enabled: bool) -> Self {
        Self {
            pipeline,
            monitor: SystemMonitor::new(monitor_enabled),
        }
    }

    pub async fn run(&self) -> Result<String> {
        tracing::info!("Starting card batch...");
        self.monitor.log_stats("Start");

        // Extract
        tracing::info!("📥 Reading cards...");
        let batch = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Extracted {} cards ({} failed)",
            batch.records.len(),
            batch.failures.len()
        );
        self.monitor.log_stats("Extract");

        // Transform
        tracing::info!("🔄 Rendering documents...");
        let result = self.pipeline.transform(batch).await?;
        tracing::info!("🔄 Rendered {} documents", result.documents.len());
        self.monitor.log_stats("Transform");

        // Load
        tracing::info!("💾 Writing archive...");
        let output_path = self.pipeline.load(result).await?;
        tracing::info!("💾 Output saved to: {}", output_path);
        self.monitor.log_stats("Load");
        self.monitor.log_final_stats();

        Ok(output_path)
    }

    /// Recognize cards and write `records.json` without rendering anything.
    pub async fn extract_only(&self) -> Result<String> {
        tracing::info!("📥 Reading cards (extract only)...");
        let batch = self.pipeline.extract().await?;
        tracing::info!(
            "📥 Extracted {} cards ({} failed)",
            batch.records.len(),
            batch.failures.len()
        );
        self.monitor.log_stats("Extract");

        let path = self.pipeline.export_records(&batch).await?;
        tracing::info!("💾 Records saved to: {}", path);
        self.monitor.log_final_stats();
        Ok(path)
    }
}
