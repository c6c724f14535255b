#![allow(dead_code)]

use cccd_etl::{CliConfig, EngineKind, ScanMode};
use image::{DynamicImage, GrayImage, ImageFormat, Luma};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;

pub fn cli_config(output_path: &str, images: Vec<String>, template: Option<String>, mode: ScanMode) -> CliConfig {
    CliConfig {
        images,
        image_dir: None,
        template,
        mode,
        engine: EngineKind::Tesseract,
        tesseract_path: "tesseract".to_string(),
        languages: "vie+eng".to_string(),
        psm: 11,
        ocr_endpoint: None,
        ocr_timeout: 60,
        records: None,
        extract_only: false,
        output_path: output_path.to_string(),
        archive_name: "ocr_results.zip".to_string(),
        no_summary: false,
        verbose: false,
        monitor: false,
        log_json: false,
    }
}

pub fn encode_png(image: GrayImage) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageLuma8(image)
        .write_to(&mut buffer, ImageFormat::Png)
        .unwrap();
    buffer.into_inner()
}

/// A plain image; its width is how the mock OCR engine tells cards apart.
pub fn blank_png(width: u32) -> Vec<u8> {
    encode_png(GrayImage::from_pixel(width, 24, Luma([220])))
}

pub fn qr_png(payload: &str) -> Vec<u8> {
    let code = qrcode::QrCode::new(payload.as_bytes()).unwrap();
    let width = code.width() as u32;
    let colors = code.to_colors();
    let (scale, quiet) = (6, 4);
    let size = (width + quiet * 2) * scale;

    encode_png(GrayImage::from_fn(size, size, |x, y| {
        let (mx, my) = (x / scale, y / scale);
        if mx < quiet || my < quiet || mx >= width + quiet || my >= width + quiet {
            return Luma([255]);
        }
        match colors[((my - quiet) * width + (mx - quiet)) as usize] {
            qrcode::Color::Dark => Luma([0]),
            qrcode::Color::Light => Luma([255]),
        }
    }))
}

pub const TEMPLATE_XML: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Họ và tên: {{ ho_va_ten }}</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Số CCCD: {{</w:t></w:r><w:r><w:t>so_cccd }}</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Ngày sinh: {{ dob }}, giới tính: {{ gioi_tinh }}</w:t></w:r></w:p>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Thường trú: {{ noi_thuong_tru }}</w:t></w:r></w:p>"#,
    r#"</w:body></w:document>"#
);

pub fn write_template(path: &Path) {
    let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    zip.start_file("[Content_Types].xml", options).unwrap();
    zip.write_all(br#"<?xml version="1.0" encoding="UTF-8"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"/>"#)
        .unwrap();
    zip.start_file("word/document.xml", options).unwrap();
    zip.write_all(TEMPLATE_XML.as_bytes()).unwrap();
    std::fs::write(path, zip.finish().unwrap().into_inner()).unwrap();
}

pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(path).unwrap()).unwrap();
    archive.file_names().map(str::to_string).collect()
}

pub fn read_zip_entry(zip_bytes: &[u8], name: &str) -> Vec<u8> {
    let mut archive = zip::ZipArchive::new(Cursor::new(zip_bytes)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut content = Vec::new();
    file.read_to_end(&mut content).unwrap();
    content
}

/// Text of `word/document.xml` inside a rendered document.
pub fn document_xml(docx: &[u8]) -> String {
    String::from_utf8(read_zip_entry(docx, "word/document.xml")).unwrap()
}
