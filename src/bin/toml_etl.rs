use cccd_etl::adapters::docx::DocxTemplate;
use cccd_etl::config::toml_config::TomlConfig;
use cccd_etl::core::{ConfigProvider, Pipeline};
use cccd_etl::utils::logger;
use cccd_etl::utils::validation::{has_image_extension, Validate};
use cccd_etl::{build_ocr_engine, EtlEngine, Field, LocalStorage, OcrPipeline, QrPipeline, ScanMode};
use clap::Parser;
use std::path::Path;

#[derive(Parser)]
#[command(name = "toml-etl")]
#[command(about = "Card batch driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "cccd-etl.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Write logs as JSON
    #[arg(long)]
    log_json: bool,

    /// Dry run - show what would be processed without executing
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // 初始化日誌
    logger::init_logger(args.verbose, args.log_json);

    tracing::info!("🚀 Starting TOML-based card batch");
    tracing::info!("📁 Loading configuration from: {}", args.config);

    // 載入 TOML 配置
    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    // 驗證配置
    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    tracing::info!("✅ Configuration loaded and validated successfully");
    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        perform_dry_run(&config).await?;
        return Ok(());
    }

    // 決定監控設定
    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let extract_only = config.extract_only();
    let storage = LocalStorage::new(config.output_path().to_string());

    let outcome = match config.mode() {
        ScanMode::Ocr => match config.ocr_backend().and_then(|backend| build_ocr_engine(&backend)) {
            Ok(engine) => {
                let pipeline = OcrPipeline::new(storage, config, engine);
                execute(EtlEngine::new_with_monitoring(pipeline, monitor_enabled), extract_only).await
            }
            Err(e) => Err(e),
        },
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
            tracing::error!(
                "❌ Batch failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

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

fn display_config_summary(config: &TomlConfig, args: &Args) {
    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if let Some(description) = &config.pipeline.description {
        println!("  Description: {}", description);
    }
    println!("  Mode: {:?}", config.mode());
    println!("  Output: {}/{}", config.output_path(), config.archive_name());
    println!("  Extract only: {}", config.extract_only());

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}

async fn perform_dry_run(config: &TomlConfig) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Dry Run Analysis:");
    println!();

    println!("📥 Inputs:");
    if let Some(records) = config.records_file() {
        println!("  Records file: {} (images are not read)", records);
    } else {
        for image in config.images() {
            let marker = if Path::new(image).is_file() { "✅" } else { "❌ missing" };
            println!("  {} {}", image, marker);
        }
        if let Some(dir) = config.image_dir() {
            let mut count = 0;
            if let Ok(mut entries) = tokio::fs::read_dir(dir).await {
                while let Some(entry) = entries.next_entry().await? {
                    if has_image_extension(&entry.path()) {
                        count += 1;
                    }
                }
            }
            println!("  Directory {}: {} images", dir, count);
        }
    }

    println!();
    println!("⚙️ Recognition:");
    match config.mode() {
        ScanMode::Ocr => match config.ocr_backend() {
            Ok(backend) => println!("  OCR backend: {:?}", backend),
            Err(e) => println!("  ❌ {}", e),
        },
        ScanMode::Qr => println!("  QR code on the back face"),
    }

    println!();
    println!("💾 Output Configuration:");
    println!("  Path: {}", config.output_path());
    println!("  Archive: {}", config.archive_name());
    println!("  Summary CSV: {}", config.include_summary());
    if let Some(template) = config.template_path() {
        println!("  Template: {}", template);
        print_template_fields(template).await;
    }

    println!();
    println!("✅ Dry run analysis complete. Use --verbose for more details during actual run.");

    Ok(())
}

async fn print_template_fields(path: &str) {
    let template = match tokio::fs::read(path).await {
        Ok(bytes) => DocxTemplate::from_bytes(&bytes),
        Err(e) => {
            println!("    ❌ {}", e);
            return;
        }
    };
    match template.and_then(|t| t.placeholders()) {
        Ok(placeholders) => {
            for name in placeholders {
                match Field::from_alias(&name) {
                    Some(field) => println!("    {{{{ {} }}}} ← {}", name, field.label()),
                    None => println!("    {{{{ {} }}}} ⚠️ no matching card field, left empty", name),
                }
            }
        }
        Err(e) => println!("    ❌ {}", e),
    }
}
