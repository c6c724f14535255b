use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The fixed set of fields read from a CCCD card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    FullName,
    IdNumber,
    DateOfBirth,
    Sex,
    Nationality,
    PlaceOfOrigin,
    Residence,
    ExpiryDate,
    IssueDate,
    OldIdNumber,
}

impl Field {
    pub const ALL: [Field; 10] = [
        Field::FullName,
        Field::IdNumber,
        Field::DateOfBirth,
        Field::Sex,
        Field::Nationality,
        Field::PlaceOfOrigin,
        Field::Residence,
        Field::ExpiryDate,
        Field::IssueDate,
        Field::OldIdNumber,
    ];

    pub fn key(self) -> &'static str {
        match self {
            Field::FullName => "full_name",
            Field::IdNumber => "id_number",
            Field::DateOfBirth => "date_of_birth",
            Field::Sex => "sex",
            Field::Nationality => "nationality",
            Field::PlaceOfOrigin => "place_of_origin",
            Field::Residence => "residence",
            Field::ExpiryDate => "expiry_date",
            Field::IssueDate => "issue_date",
            Field::OldIdNumber => "old_id_number",
        }
    }

    /// Label printed on the card, used in review output.
    pub fn label(self) -> &'static str {
        match self {
            Field::FullName => "Họ và tên",
            Field::IdNumber => "Số",
            Field::DateOfBirth => "Ngày sinh",
            Field::Sex => "Giới tính",
            Field::Nationality => "Quốc tịch",
            Field::PlaceOfOrigin => "Quê quán",
            Field::Residence => "Nơi thường trú",
            Field::ExpiryDate => "Có giá trị đến",
            Field::IssueDate => "Ngày cấp",
            Field::OldIdNumber => "Số CMND",
        }
    }

    /// Placeholder names a template may use for this field.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::FullName => &["fullname", "full_name", "ho_va_ten"],
            Field::IdNumber => &["no", "id_number", "so", "so_cccd"],
            Field::DateOfBirth => &["date_of_birth", "dob", "ngay_sinh"],
            Field::Sex => &["sex", "gender", "gioi_tinh"],
            Field::Nationality => &["nationality", "quoc_tich"],
            Field::PlaceOfOrigin => &["place_of_origin", "que_quan"],
            Field::Residence => &["residence", "noi_thuong_tru"],
            Field::ExpiryDate => &["expiry_date", "co_gia_tri_den"],
            Field::IssueDate => &["issue_date", "ngay_cap"],
            Field::OldIdNumber => &["old_id_number", "so_cmnd"],
        }
    }

    pub fn from_alias(name: &str) -> Option<Field> {
        Field::ALL
            .into_iter()
            .find(|field| field.aliases().contains(&name))
    }
}

/// Extracted values of one card. Empty strings mean "not recognized".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdRecord {
    #[serde(alias = "fullname", alias = "ho_va_ten")]
    pub full_name: String,
    #[serde(alias = "no", alias = "so")]
    pub id_number: String,
    #[serde(alias = "dob", alias = "ngay_sinh")]
    pub date_of_birth: String,
    #[serde(alias = "gender", alias = "gioi_tinh")]
    pub sex: String,
    #[serde(alias = "quoc_tich")]
    pub nationality: String,
    #[serde(alias = "que_quan")]
    pub place_of_origin: String,
    #[serde(alias = "noi_thuong_tru")]
    pub residence: String,
    #[serde(alias = "co_gia_tri_den")]
    pub expiry_date: String,
    #[serde(alias = "ngay_cap")]
    pub issue_date: String,
    #[serde(alias = "so_cmnd")]
    pub old_id_number: String,
}

impl IdRecord {
    pub fn get(&self, field: Field) -> &str {
        match field {
            Field::FullName => &self.full_name,
            Field::IdNumber => &self.id_number,
            Field::DateOfBirth => &self.date_of_birth,
            Field::Sex => &self.sex,
            Field::Nationality => &self.nationality,
            Field::PlaceOfOrigin => &self.place_of_origin,
            Field::Residence => &self.residence,
            Field::ExpiryDate => &self.expiry_date,
            Field::IssueDate => &self.issue_date,
            Field::OldIdNumber => &self.old_id_number,
        }
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let slot = match field {
            Field::FullName => &mut self.full_name,
            Field::IdNumber => &mut self.id_number,
            Field::DateOfBirth => &mut self.date_of_birth,
            Field::Sex => &mut self.sex,
            Field::Nationality => &mut self.nationality,
            Field::PlaceOfOrigin => &mut self.place_of_origin,
            Field::Residence => &mut self.residence,
            Field::ExpiryDate => &mut self.expiry_date,
            Field::IssueDate => &mut self.issue_date,
            Field::OldIdNumber => &mut self.old_id_number,
        };
        *slot = value;
    }

    /// Every alias of every field mapped to its value.
    pub fn template_context(&self) -> BTreeMap<String, String> {
        let mut context = BTreeMap::new();
        for field in Field::ALL {
            for alias in field.aliases() {
                context.insert(alias.to_string(), self.get(field).to_string());
            }
        }
        context
    }

    pub fn filled_fields(&self) -> Vec<Field> {
        Field::ALL
            .into_iter()
            .filter(|field| !self.get(*field).trim().is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_fields().is_empty()
    }
}

/// One text box returned by an OCR engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognizedText {
    /// Corner points, clockwise from top-left.
    pub bbox: [[f32; 2]; 4],
    pub text: String,
    pub confidence: f32,
}

impl RecognizedText {
    pub fn new(bbox: [[f32; 2]; 4], text: impl Into<String>, confidence: f32) -> Self {
        Self {
            bbox,
            text: text.into(),
            confidence,
        }
    }

    /// Axis-aligned box from left, top, width and height.
    pub fn from_rect(left: f32, top: f32, width: f32, height: f32, text: impl Into<String>, confidence: f32) -> Self {
        let (right, bottom) = (left + width, top + height);
        Self::new(
            [[left, top], [right, top], [right, bottom], [left, bottom]],
            text,
            confidence,
        )
    }

    pub fn top(&self) -> f32 {
        self.bbox.iter().map(|p| p[1]).fold(f32::INFINITY, f32::min)
    }

    pub fn left(&self) -> f32 {
        self.bbox.iter().map(|p| p[0]).fold(f32::INFINITY, f32::min)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionSource {
    Ocr,
    Qr,
    Imported,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardRecord {
    pub image_name: String,
    pub source: ExtractionSource,
    pub fields: IdRecord,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub raw_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanFailure {
    pub image_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default)]
pub struct Batch {
    pub records: Vec<CardRecord>,
    pub failures: Vec<ScanFailure>,
}

#[derive(Debug, Clone)]
pub struct RenderedDocument {
    pub entry_name: String,
    pub content: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct TransformResult {
    pub documents: Vec<RenderedDocument>,
    pub summary_csv: String,
    pub records: Vec<CardRecord>,
    pub failures: Vec<ScanFailure>,
}

/// Shape of `records.json`, the file users edit between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsFile {
    pub generated_at: String,
    pub records: Vec<CardRecord>,
    #[serde(default)]
    pub failures: Vec<ScanFailure>,
}
