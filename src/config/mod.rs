pub mod cli;
pub mod toml_config;

use crate::adapters::tesseract::{DEFAULT_LANGUAGES, DEFAULT_PSM};
use crate::adapters::OcrBackend;
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::{
    validate_file_extensions, validate_non_empty_string, validate_path, validate_positive_number,
    validate_range, validate_url, IMAGE_EXTENSIONS, TEMPLATE_EXTENSIONS,
};
use serde::{Deserialize, Serialize};

#[cfg(feature = "cli")]
use crate::utils::validation::Validate;
#[cfg(feature = "cli")]
use clap::Parser;

pub const DEFAULT_OUTPUT_PATH: &str = "./output";

/// How fields are read from the card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum ScanMode {
    /// OCR of the front face
    #[default]
    Ocr,
    /// QR code on the back face
    Qr,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Local `tesseract` binary
    #[default]
    Tesseract,
    /// OCR service over HTTP
    Http,
}

/// Settings of the OCR engine, shared by the CLI and TOML front ends.
pub fn ocr_backend(
    engine: EngineKind,
    tesseract_path: &str,
    languages: &str,
    psm: u8,
    endpoint: Option<&str>,
    timeout_secs: u64,
) -> Result<OcrBackend> {
    match engine {
        EngineKind::Tesseract => Ok(OcrBackend::Tesseract {
            binary: tesseract_path.to_string(),
            languages: languages.to_string(),
            psm,
        }),
        EngineKind::Http => {
            let endpoint = endpoint.ok_or_else(|| EtlError::ConfigValidationError {
                field: "ocr_endpoint".to_string(),
                message: "the http engine needs an OCR service endpoint".to_string(),
            })?;
            Ok(OcrBackend::Http {
                endpoint: endpoint.to_string(),
                timeout_secs,
            })
        }
    }
}

/// Input, template and output checks common to every front end.
pub fn validate_job<C: ConfigProvider>(config: &C, extract_only: bool) -> Result<()> {
    validate_path("output_path", config.output_path())?;
    validate_non_empty_string("archive_name", config.archive_name())?;

    if extract_only && config.records_file().is_some() {
        return Err(EtlError::ConfigError {
            message: "records are already extracted; drop --extract-only to render them".to_string(),
        });
    }

    match config.records_file() {
        Some(records) => validate_path("records", records)?,
        None => {
            if config.images().is_empty() && config.image_dir().is_none() {
                return Err(EtlError::ConfigValidationError {
                    field: "images".to_string(),
                    message: "give card images with --images or --image-dir, or a records file"
                        .to_string(),
                });
            }
            validate_file_extensions("images", config.images(), IMAGE_EXTENSIONS)?;
            if let Some(dir) = config.image_dir() {
                validate_path("image_dir", dir)?;
            }
        }
    }

    if !extract_only {
        let template = config
            .template_path()
            .ok_or_else(|| EtlError::ConfigValidationError {
                field: "template".to_string(),
                message: "a .docx template is required unless only extracting".to_string(),
            })?;
        validate_file_extensions("template", &[template.to_string()], TEMPLATE_EXTENSIONS)?;
    }

    Ok(())
}

pub fn validate_backend(backend: &OcrBackend) -> Result<()> {
    match backend {
        OcrBackend::Tesseract {
            binary,
            languages,
            psm,
        } => {
            validate_non_empty_string("tesseract_path", binary)?;
            validate_non_empty_string("languages", languages)?;
            validate_range("psm", *psm, 0, 13)
        }
        OcrBackend::Http {
            endpoint,
            timeout_secs,
        } => {
            validate_url("ocr_endpoint", endpoint)?;
            validate_positive_number("ocr_timeout", *timeout_secs, 1)
        }
    }
}

#[cfg(feature = "cli")]
#[derive(Debug, Clone, Serialize, Deserialize, Parser)]
#[command(name = "cccd-etl")]
#[command(about = "Read Vietnamese citizen ID cards and fill Word templates")]
pub struct CliConfig {
    /// Card images, comma separated
    #[arg(long, value_delimiter = ',')]
    pub images: Vec<String>,

    /// Directory scanned for card images
    #[arg(long)]
    pub image_dir: Option<String>,

    /// Word template with {{ placeholder }} fields
    #[arg(long)]
    pub template: Option<String>,

    #[arg(long, value_enum, default_value_t = ScanMode::Ocr)]
    pub mode: ScanMode,

    #[arg(long, value_enum, default_value_t = EngineKind::Tesseract)]
    pub engine: EngineKind,

    #[arg(long, default_value = "tesseract")]
    pub tesseract_path: String,

    #[arg(long, default_value = DEFAULT_LANGUAGES)]
    pub languages: String,

    #[arg(long, default_value_t = DEFAULT_PSM)]
    pub psm: u8,

    #[arg(long)]
    pub ocr_endpoint: Option<String>,

    /// OCR service timeout in seconds
    #[arg(long, default_value_t = crate::adapters::http_ocr::DEFAULT_TIMEOUT_SECS)]
    pub ocr_timeout: u64,

    /// Render from an edited records.json instead of reading images
    #[arg(long)]
    pub records: Option<String>,

    /// Only write records.json for review
    #[arg(long)]
    pub extract_only: bool,

    #[arg(long, default_value = DEFAULT_OUTPUT_PATH)]
    pub output_path: String,

    #[arg(long, default_value = crate::adapters::archive::DEFAULT_ARCHIVE_NAME)]
    pub archive_name: String,

    /// Leave summary.csv out of the archive
    #[arg(long)]
    pub no_summary: bool,

    #[arg(long, help = "Enable verbose output")]
    pub verbose: bool,

    #[arg(long, help = "Log process CPU and memory between phases")]
    pub monitor: bool,

    #[arg(long, help = "Write logs as JSON")]
    pub log_json: bool,
}

#[cfg(feature = "cli")]
impl CliConfig {
    pub fn ocr_backend(&self) -> Result<OcrBackend> {
        ocr_backend(
            self.engine,
            &self.tesseract_path,
            &self.languages,
            self.psm,
            self.ocr_endpoint.as_deref(),
            self.ocr_timeout,
        )
    }

    /// Whether an OCR engine is needed for this run.
    pub fn needs_ocr(&self) -> bool {
        self.mode == ScanMode::Ocr && self.records.is_none()
    }
}

#[cfg(feature = "cli")]
impl ConfigProvider for CliConfig {
    fn output_path(&self) -> &str {
        &self.output_path
    }

    fn images(&self) -> &[String] {
        &self.images
    }

    fn image_dir(&self) -> Option<&str> {
        self.image_dir.as_deref()
    }

    fn template_path(&self) -> Option<&str> {
        self.template.as_deref()
    }

    fn records_file(&self) -> Option<&str> {
        self.records.as_deref()
    }

    fn archive_name(&self) -> &str {
        &self.archive_name
    }

    fn include_summary(&self) -> bool {
        !self.no_summary
    }
}

#[cfg(feature = "cli")]
impl Validate for CliConfig {
    fn validate(&self) -> Result<()> {
        validate_job(self, self.extract_only)?;
        if self.needs_ocr() {
            validate_backend(&self.ocr_backend()?)?;
        }
        Ok(())
    }
}
