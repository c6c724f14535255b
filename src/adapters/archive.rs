use crate::utils::error::Result;
use std::collections::HashSet;
use std::io::{Cursor, Write};
use std::path::Path;
use zip::write::{SimpleFileOptions, ZipWriter};
use zip::CompressionMethod;

pub const DEFAULT_ARCHIVE_NAME: &str = "ocr_results.zip";
pub const SUMMARY_ENTRY: &str = "summary.csv";
pub const RECORDS_FILE: &str = "records.json";

/// File stem of `filename` reduced to letters, digits, `-` and `_`.
/// Letters keep their diacritics, so Vietnamese names stay readable.
pub fn safe_output_name(filename: &str) -> String {
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    let safe: String = stem
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if safe.is_empty() {
        "result".to_string()
    } else {
        safe
    }
}

/// Hands out `<stem>_result.docx` names, suffixing repeats with `_2`, `_3`, ...
#[derive(Debug, Default)]
pub struct EntryNamer {
    used: HashSet<String>,
}

impl EntryNamer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn result_entry_name(&mut self, image_name: &str) -> String {
        let base = format!("{}_result", safe_output_name(image_name));
        let mut candidate = format!("{}.docx", base);
        let mut counter = 2;
        while !self.used.insert(candidate.clone()) {
            candidate = format!("{}_{}.docx", base, counter);
            counter += 1;
        }
        candidate
    }
}

/// Deflated zip archive of `(entry name, content)` pairs.
pub fn build_zip<'a, I>(entries: I) -> Result<Vec<u8>>
where
    I: IntoIterator<Item = (&'a str, &'a [u8])>,
{
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for (name, content) in entries {
        tracing::debug!("Adding {} ({} bytes) to archive", name, content.len());
        zip.start_file(name, options)?;
        zip.write_all(content)?;
    }

    Ok(zip.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_safe_output_name() {
        assert_eq!(safe_output_name("cccd_front.jpg"), "cccd_front");
        assert_eq!(safe_output_name("uploads/card front (1).png"), "card_front__1_");
        assert_eq!(safe_output_name("scan-01.JPEG"), "scan-01");
        assert_eq!(safe_output_name(""), "result");
        assert_eq!(safe_output_name(".png"), "_png");
    }

    #[test]
    fn test_safe_output_name_keeps_vietnamese_letters() {
        assert_eq!(safe_output_name("ảnh_Nguyễn.jpg"), "ảnh_Nguyễn");
        assert_eq!(safe_output_name("CCCD Trần Thị Bích (mặt trước).png"), "CCCD_Trần_Thị_Bích__mặt_trước_");

        let mut namer = EntryNamer::new();
        assert_eq!(namer.result_entry_name("ảnh_Nguyễn.jpg"), "ảnh_Nguyễn_result.docx");
    }

    #[test]
    fn test_entry_names_are_unique() {
        let mut namer = EntryNamer::new();
        assert_eq!(namer.result_entry_name("a.jpg"), "a_result.docx");
        assert_eq!(namer.result_entry_name("dir/a.png"), "a_result_2.docx");
        assert_eq!(namer.result_entry_name("a.webp"), "a_result_3.docx");
        assert_eq!(namer.result_entry_name("b.jpg"), "b_result.docx");
    }

    #[test]
    fn test_build_zip_is_deflated() {
        let content = "Nguyễn Văn An;".repeat(50);
        let bytes = build_zip([
            ("a_result.docx", content.as_bytes()),
            (SUMMARY_ENTRY, b"image,full_name\n".as_slice()),
        ])
        .unwrap();

        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);

        let mut file = archive.by_name("a_result.docx").unwrap();
        assert_eq!(file.compression(), CompressionMethod::Deflated);
        let mut read_back = String::new();
        file.read_to_string(&mut read_back).unwrap();
        assert_eq!(read_back, content);
    }
}
