//! Steps shared by the OCR and QR pipelines: input discovery, record import,
//! template rendering and archive output.

use crate::adapters::archive::{build_zip, EntryNamer, RECORDS_FILE, SUMMARY_ENTRY};
use crate::adapters::docx::DocxTemplate;
use crate::core::{ConfigProvider, Storage};
use crate::domain::model::{
    Batch, CardRecord, ExtractionSource, Field, RecordsFile, RenderedDocument, ScanFailure,
    TransformResult,
};
use crate::utils::error::{EtlError, Result};
use crate::utils::validation::has_image_extension;
use std::future::Future;
use std::path::{Path, PathBuf};

/// Explicit images first, then the images of `image_dir` sorted by name.
pub(crate) async fn collect_images<C: ConfigProvider>(config: &C) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = config.images().iter().map(PathBuf::from).collect();

    if let Some(dir) = config.image_dir() {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_file() && has_image_extension(&path) {
                found.push(path);
            }
        }
        found.sort();
        tracing::debug!("Found {} images in {}", found.len(), dir);
        paths.extend(found);
    }

    if paths.is_empty() {
        return Err(EtlError::ValidationError {
            message: "no input images given".to_string(),
        });
    }
    Ok(paths)
}

pub(crate) fn image_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Run `read_card` over every image. A failing image is recorded and skipped.
pub(crate) async fn scan_images<F, Fut>(paths: &[PathBuf], mut read_card: F) -> Result<Batch>
where
    F: FnMut(String, Vec<u8>) -> Fut,
    Fut: Future<Output = Result<CardRecord>>,
{
    let mut batch = Batch::default();

    for (index, path) in paths.iter().enumerate() {
        let name = image_name(path);
        tracing::info!("🪪 [{}/{}] {}", index + 1, paths.len(), name);

        let outcome = match tokio::fs::read(path).await {
            Ok(bytes) => read_card(name.clone(), bytes).await,
            Err(e) => Err(EtlError::IoError(e)),
        };

        match outcome {
            Ok(record) => {
                tracing::debug!(
                    "{}: {} fields recognized",
                    name,
                    record.fields.filled_fields().len()
                );
                batch.records.push(record);
            }
            Err(e) => {
                tracing::warn!("⚠️ Skipping {}: {}", name, e);
                batch.failures.push(ScanFailure {
                    image_name: name,
                    reason: e.to_string(),
                });
            }
        }
    }

    if batch.records.is_empty() {
        return Err(EtlError::ProcessingError {
            message: format!(
                "none of the {} images could be read: {}",
                batch.failures.len(),
                batch
                    .failures
                    .iter()
                    .map(|f| format!("{} ({})", f.image_name, f.reason))
                    .collect::<Vec<_>>()
                    .join("; ")
            ),
        });
    }

    Ok(batch)
}

/// Load a previously exported (and possibly hand-edited) `records.json`.
pub(crate) async fn import_records(path: &str) -> Result<Batch> {
    let content = tokio::fs::read_to_string(path).await?;
    let file: RecordsFile = serde_json::from_str(&content)?;

    let records: Vec<CardRecord> = file
        .records
        .into_iter()
        .map(|mut record| {
            record.source = ExtractionSource::Imported;
            record
        })
        .collect();

    if records.is_empty() {
        return Err(EtlError::ValidationError {
            message: format!("{} contains no records", path),
        });
    }

    tracing::info!("📥 Imported {} records from {}", records.len(), path);
    Ok(Batch {
        records,
        failures: file.failures,
    })
}

pub(crate) async fn load_template(path: Option<&str>) -> Result<DocxTemplate> {
    let path = path.ok_or_else(|| EtlError::ConfigValidationError {
        field: "template".to_string(),
        message: "a .docx template is required to render documents".to_string(),
    })?;
    let bytes = tokio::fs::read(path).await?;
    let template = DocxTemplate::from_bytes(&bytes)?;

    let placeholders = template.placeholders()?;
    tracing::debug!("Template placeholders: {:?}", placeholders);
    for name in &placeholders {
        if Field::from_alias(name).is_none() {
            tracing::warn!(
                "⚠️ Template placeholder '{{{{ {} }}}}' does not match any card field and will be empty",
                name
            );
        }
    }
    if placeholders.is_empty() {
        tracing::warn!("⚠️ Template {} has no placeholders", path);
    }

    Ok(template)
}

/// One document per record plus the summary CSV.
pub(crate) fn render_batch(template: &DocxTemplate, batch: Batch) -> Result<TransformResult> {
    let mut namer = EntryNamer::new();
    let mut documents = Vec::with_capacity(batch.records.len());

    for record in &batch.records {
        let content = template.render(&record.fields.template_context())?;
        documents.push(RenderedDocument {
            entry_name: namer.result_entry_name(&record.image_name),
            content,
        });
    }

    Ok(TransformResult {
        summary_csv: summary_csv(&batch.records, &batch.failures)?,
        documents,
        records: batch.records,
        failures: batch.failures,
    })
}

pub(crate) fn summary_csv(records: &[CardRecord], failures: &[ScanFailure]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    let mut header = vec!["image", "source", "status"];
    header.extend(Field::ALL.iter().map(|f| f.key()));
    header.push("error");
    writer.write_record(&header)?;

    for record in records {
        let source = match record.source {
            ExtractionSource::Ocr => "ocr",
            ExtractionSource::Qr => "qr",
            ExtractionSource::Imported => "imported",
        };
        let mut row = vec![record.image_name.as_str(), source, "ok"];
        row.extend(Field::ALL.iter().map(|f| record.fields.get(*f)));
        row.push("");
        writer.write_record(&row)?;
    }

    for failure in failures {
        let mut row = vec![failure.image_name.as_str(), "", "failed"];
        row.extend(Field::ALL.iter().map(|_| ""));
        row.push(failure.reason.as_str());
        writer.write_record(&row)?;
    }

    let bytes = writer.into_inner().map_err(|e| EtlError::ProcessingError {
        message: format!("failed to finish summary CSV: {}", e),
    })?;
    String::from_utf8(bytes).map_err(|e| EtlError::ProcessingError {
        message: format!("summary CSV is not UTF-8: {}", e),
    })
}

pub(crate) fn records_json(records: &[CardRecord], failures: &[ScanFailure]) -> Result<Vec<u8>> {
    let file = RecordsFile {
        generated_at: chrono::Local::now().to_rfc3339(),
        records: records.to_vec(),
        failures: failures.to_vec(),
    };
    Ok(serde_json::to_vec_pretty(&file)?)
}

pub(crate) async fn write_records<S: Storage, C: ConfigProvider>(
    storage: &S,
    config: &C,
    records: &[CardRecord],
    failures: &[ScanFailure],
) -> Result<String> {
    let data = records_json(records, failures)?;
    storage.write_file(RECORDS_FILE, &data).await?;
    Ok(format!("{}/{}", config.output_path(), RECORDS_FILE))
}

pub(crate) async fn write_archive<S: Storage, C: ConfigProvider>(
    storage: &S,
    config: &C,
    result: TransformResult,
) -> Result<String> {
    let mut entries: Vec<(&str, &[u8])> = result
        .documents
        .iter()
        .map(|doc| (doc.entry_name.as_str(), doc.content.as_slice()))
        .collect();
    if config.include_summary() {
        entries.push((SUMMARY_ENTRY, result.summary_csv.as_bytes()));
    }

    tracing::debug!("Creating ZIP file with {} entries", entries.len());
    let zip_data = build_zip(entries)?;

    let archive_name = config.archive_name();
    tracing::debug!("Writing ZIP file ({} bytes) to storage", zip_data.len());
    storage.write_file(archive_name, &zip_data).await?;

    write_records(storage, config, &result.records, &result.failures).await?;

    Ok(format!("{}/{}", config.output_path(), archive_name))
}
