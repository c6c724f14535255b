pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::TomlConfig, EngineKind, ScanMode};

pub use adapters::{build_ocr_engine, OcrBackend};
pub use app::pipelines::{OcrPipeline, QrPipeline};
pub use core::etl::EtlEngine;
pub use domain::model::{CardRecord, Field, IdRecord};
pub use utils::error::{EtlError, Result};
