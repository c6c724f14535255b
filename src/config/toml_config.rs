use super::{ocr_backend, validate_backend, validate_job, EngineKind, ScanMode, DEFAULT_OUTPUT_PATH};
use crate::adapters::archive::DEFAULT_ARCHIVE_NAME;
use crate::adapters::http_ocr::DEFAULT_TIMEOUT_SECS;
use crate::adapters::tesseract::{DEFAULT_LANGUAGES, DEFAULT_PSM};
use crate::adapters::OcrBackend;
use crate::core::ConfigProvider;
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::Validate;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::LazyLock;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid regex"));

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub ocr: OcrConfig,
    #[serde(default)]
    pub template: TemplateConfig,
    #[serde(default)]
    pub load: LoadConfig,
    pub monitoring: Option<MonitoringConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub mode: ScanMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceConfig {
    #[serde(default)]
    pub images: Vec<String>,
    pub image_dir: Option<String>,
    /// Edited `records.json` to render instead of reading images.
    pub records: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OcrConfig {
    #[serde(default)]
    pub engine: EngineKind,
    pub tesseract_path: Option<String>,
    pub languages: Option<String>,
    pub psm: Option<u8>,
    pub endpoint: Option<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TemplateConfig {
    pub path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadConfig {
    #[serde(default = "default_output_path")]
    pub output_path: String,
    #[serde(default = "default_archive_name")]
    pub archive_name: String,
    pub include_summary: Option<bool>,
    pub extract_only: Option<bool>,
}

impl Default for LoadConfig {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            archive_name: default_archive_name(),
            include_summary: None,
            extract_only: None,
        }
    }
}

fn default_output_path() -> String {
    DEFAULT_OUTPUT_PATH.to_string()
}

fn default_archive_name() -> String {
    DEFAULT_ARCHIVE_NAME.to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    pub enabled: bool,
    pub log_level: Option<String>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(EtlError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| EtlError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${CARD_DIR})，未設定的保持原樣
    fn substitute_env_vars(content: &str) -> String {
        ENV_VAR
            .replace_all(content, |caps: &regex::Captures| {
                let var_name = &caps[1];
                std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
            })
            .into_owned()
    }

    pub fn mode(&self) -> ScanMode {
        self.pipeline.mode
    }

    pub fn extract_only(&self) -> bool {
        self.load.extract_only.unwrap_or(false)
    }

    pub fn needs_ocr(&self) -> bool {
        self.mode() == ScanMode::Ocr && self.source.records.is_none()
    }

    pub fn ocr_backend(&self) -> Result<OcrBackend> {
        ocr_backend(
            self.ocr.engine,
            self.ocr.tesseract_path.as_deref().unwrap_or("tesseract"),
            self.ocr.languages.as_deref().unwrap_or(DEFAULT_LANGUAGES),
            self.ocr.psm.unwrap_or(DEFAULT_PSM),
            self.ocr.endpoint.as_deref(),
            self.ocr.timeout_seconds.unwrap_or(DEFAULT_TIMEOUT_SECS),
        )
    }

    /// 取得監控設定
    pub fn monitoring_enabled(&self) -> bool {
        self.monitoring.as_ref().map(|m| m.enabled).unwrap_or(false)
    }

    /// 驗證配置的合理性
    pub fn validate_config(&self) -> Result<()> {
        validate_job(self, self.extract_only())?;
        if self.needs_ocr() {
            validate_backend(&self.ocr_backend()?)?;
        }
        Ok(())
    }
}

impl ConfigProvider for TomlConfig {
    fn output_path(&self) -> &str {
        &self.load.output_path
    }

    fn images(&self) -> &[String] {
        &self.source.images
    }

    fn image_dir(&self) -> Option<&str> {
        self.source.image_dir.as_deref()
    }

    fn template_path(&self) -> Option<&str> {
        self.template.path.as_deref()
    }

    fn records_file(&self) -> Option<&str> {
        self.source.records.as_deref()
    }

    fn archive_name(&self) -> &str {
        &self.load.archive_name
    }

    fn include_summary(&self) -> bool {
        self.load.include_summary.unwrap_or(true)
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
