use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("OCR service request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Image decoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Spreadsheet error: {0}")]
    SpreadsheetError(#[from] calamine::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("OCR engine '{engine}' failed: {message}")]
    OcrError { engine: String, message: String },

    #[error("QR decoding failed: {message}")]
    QrError { message: String },

    #[error("Template error: {message}")]
    TemplateError { message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Recognition,
    Template,
    Output,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// 根據錯誤嚴重程度決定退出碼
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorSeverity::Low => 0,      // 警告，但成功
            ErrorSeverity::Medium => 2,   // 可重試
            ErrorSeverity::High => 1,     // 處理錯誤
            ErrorSeverity::Critical => 3, // 系統錯誤
        }
    }
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            EtlError::ImageError(_)
            | EtlError::SpreadsheetError(_)
            | EtlError::CsvError(_)
            | EtlError::ValidationError { .. } => ErrorCategory::Input,
            EtlError::OcrError { .. } | EtlError::QrError { .. } | EtlError::ApiError(_) => {
                ErrorCategory::Recognition
            }
            EtlError::TemplateError { .. } => ErrorCategory::Template,
            EtlError::ZipError(_) | EtlError::SerializationError(_) => ErrorCategory::Output,
            EtlError::IoError(_) | EtlError::ProcessingError { .. } => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 單張圖片辨識失敗可重試
            EtlError::OcrError { .. } | EtlError::QrError { .. } | EtlError::ApiError(_) => {
                ErrorSeverity::Medium
            }
            EtlError::IoError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => "Check the command line flags or the TOML configuration file",
            ErrorCategory::Input => "Make sure the input files exist and use a supported format",
            ErrorCategory::Recognition => match self {
                EtlError::QrError { .. } => {
                    "Use a sharp photo of the card face that carries the QR code (back face)"
                }
                _ => "Use a sharp, well-lit photo of the front face, or check that the OCR engine is installed and reachable",
            },
            ErrorCategory::Template => {
                "Open the template in Word and check that it is a valid .docx with {{ placeholders }}"
            }
            ErrorCategory::Output => "Check that the output directory is writable and has free space",
            ErrorCategory::System => "Check file permissions and retry",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            EtlError::IoError(e) if e.kind() == std::io::ErrorKind::NotFound => {
                format!("File not found: {}", e)
            }
            EtlError::QrError { message } => format!("Could not read the QR code: {}", message),
            EtlError::OcrError { engine, message } => {
                format!("Text recognition with {} failed: {}", engine, message)
            }
            EtlError::TemplateError { message } => format!("The Word template is unusable: {}", message),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
