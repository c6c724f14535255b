use cccd_etl::core::Pipeline;
use cccd_etl::utils::{logger, validation::Validate};
use cccd_etl::{build_ocr_engine, CliConfig, EtlEngine, LocalStorage, OcrPipeline, QrPipeline, ScanMode};
use clap::Parser;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = CliConfig::parse();

    // 初始化日誌
    logger::init_logger(config.verbose, config.log_json);

    tracing::info!("Starting cccd-etl");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let extract_only = config.extract_only;
    let storage = LocalStorage::new(config.output_path.clone());

    let mode = config.mode;
    let outcome = match mode {
        ScanMode::Ocr => {
            let engine = config.ocr_backend().and_then(|backend| build_ocr_engine(&backend));
            match engine {
                Ok(engine) => {
                    let pipeline = OcrPipeline::new(storage, config, engine);
                    execute(EtlEngine::new_with_monitoring(pipeline, monitor_enabled), extract_only).await
                }
                Err(e) => Err(e),
            }
        }
        ScanMode::Qr => {
            let pipeline = QrPipeline::new(storage, config);
            execute(EtlEngine::new_with_monitoring(pipeline, monitor_enabled), extract_only).await
        }
    };

    match outcome {
        Ok(output_path) => {
            tracing::info!("✅ Batch completed successfully!");
            tracing::info!("📁 Output saved to: {}", output_path);
            println!("✅ Batch completed successfully!");
            println!("📁 Output saved to: {}", output_path);
        }
        Err(e) => {
            // 記錄詳細錯誤信息
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            // 輸出用戶友好的錯誤信息
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            let exit_code = e.severity().exit_code();
            if exit_code > 0 {
                std::process::exit(exit_code);
            }
        }
    }

    Ok(())
}

async fn execute<P: Pipeline>(engine: EtlEngine<P>, extract_only: bool) -> cccd_etl::Result<String> {
    if extract_only {
        engine.extract_only().await
    } else {
        engine.run().await
    }
}
