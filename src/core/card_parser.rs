//! Turns recognized lines of a CCCD front face into an [`IdRecord`].
//!
//! Lines are expected in reading order. Each field is located by its printed
//! label (Vietnamese or English), with fallbacks over the full text for cards
//! where the label was not recognized.

use crate::core::text::{
    choose_best_id, clean_value, dedupe_place_text, digits_only, extract_after_label,
    extract_segment_by_labels, is_noise_or_label, line_has_any_label, normalize_compact_date,
    normalize_date_text, normalize_text, title_case, DATE_PATTERN, TRIM_CHARS,
};
use crate::domain::model::{IdRecord, RecognizedText};
use regex::Regex;
use std::sync::LazyLock;

/// Boxes below this confidence are ignored when parsing.
pub const MIN_PARSE_CONFIDENCE: f32 = 0.25;

pub const VIETNAM: &str = "Việt Nam";

const ID_LABELS: &[&str] = &["so", "so dinh danh", "id no", "no.", "no"];
const BIRTH_DATE_LABELS: &[&str] = &["ngay sinh", "date of birth"];
const SEX_LABELS: &[&str] = &["gioi tinh", "sex"];
const NAME_LABELS: &[&str] = &["ho va ten", "ho ten", "full name"];
const NATIONALITY_LABELS: &[&str] = &["quoc tich", "nationality"];
const NATIONALITY_STOPS: &[&str] = &[
    "que quan",
    "place of origin",
    "noi thuong tru",
    "residence",
    "gioi tinh",
    "sex",
    "ngay sinh",
    "date of birth",
    "ho va ten",
    "full name",
];
const ORIGIN_LABELS: &[&str] = &["que quan", "place of origin"];
const ORIGIN_STOPS: &[&str] = &[
    "co gia tri den",
    "quoc tich",
    "gioi tinh",
    "ngay sinh",
    "ho va ten",
    "noi thuong tru",
    "thuong tru",
    "id no",
    "so dinh danh",
    "can cuoc",
];
const RESIDENCE_LABELS: &[&str] = &["noi thuong tru", "thuong tru", "permanent residence", "residence"];
const RESIDENCE_STOPS: &[&str] = &[
    "co gia tri den",
    "co gia tri",
    "quoc tich",
    "gioi tinh",
    "ngay sinh",
    "ho va ten",
    "que quan",
    "id no",
    "so dinh danh",
    "can cuoc",
];
const EXPIRY_LABELS: &[&str] = &["co gia tri den", "valid until", "expiry"];

const MAX_ORIGIN_PARTS: usize = 5;
const MAX_RESIDENCE_PARTS: usize = 6;

static TWELVE_DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[0-9]{12}").expect("valid regex"));

static MALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnam\b|\bmale\b").expect("valid regex"));

static FEMALE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bnu\b|\bfemale\b").expect("valid regex"));

// "viet nam" would otherwise read as male.
static COUNTRY_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"viet\s*nam").expect("valid regex"));

static UPPERCASE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-ZÀ-Ỹ\s]+$").expect("valid regex"));

static NATIONALITY_VALUE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:quoc\s*tich|nationality)\s*[:/\-]*\s*([a-z\s]{2,30})").expect("valid regex")
});

static NATIONALITY_TAIL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"\b(?:gioi\s*tinh|sex|que\s*quan|place\s*of\s*origin|noi\s*thuong\s*tru|",
        r"residence|ngay\s*sinh|date\s*of\s*birth)\b.*$",
    ))
    .expect("valid regex")
});

static RESIDENCE_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^\s*\d*\s*(place\s*of\s*residence|permanent\s*residence|residence)\s*[:;,-]*\s*")
        .expect("valid regex")
});

/// Parse OCR boxes, skipping low-confidence ones.
pub fn parse_recognized(items: &[RecognizedText]) -> IdRecord {
    let lines: Vec<&str> = items
        .iter()
        .filter(|item| item.confidence >= MIN_PARSE_CONFIDENCE)
        .map(|item| item.text.as_str())
        .collect();
    parse_lines(&lines)
}

pub fn parse_lines<S: AsRef<str>>(lines: &[S]) -> IdRecord {
    let card = CardText::new(lines);

    let mut record = IdRecord {
        id_number: card.id_number(),
        date_of_birth: card.birth_date(),
        sex: card.sex(),
        full_name: card.full_name(),
        nationality: card.nationality(),
        place_of_origin: card.place_of_origin(),
        residence: card.residence(),
        ..IdRecord::default()
    };
    record.expiry_date = card.expiry_date(&record.date_of_birth);

    if record.residence.is_empty() {
        record.residence = record.place_of_origin.clone();
    }

    tracing::debug!(
        "Parsed {} lines into {} fields",
        card.lines.len(),
        record.filled_fields().len()
    );
    record
}

fn non_empty(value: String) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value)
    }
}

struct CardText {
    lines: Vec<String>,
    normalized: Vec<String>,
    full_text: String,
    normalized_full: String,
}

impl CardText {
    fn new<S: AsRef<str>>(lines: &[S]) -> Self {
        let lines: Vec<String> = lines.iter().map(|l| l.as_ref().trim().to_string()).collect();
        let normalized = lines.iter().map(|l| normalize_text(l)).collect();
        let full_text = lines.join(" ");
        let normalized_full = normalize_text(&full_text);
        Self {
            lines,
            normalized,
            full_text,
            normalized_full,
        }
    }

    fn labelled_indices<'a>(&'a self, labels: &'a [&'a str]) -> impl Iterator<Item = usize> + 'a {
        self.normalized
            .iter()
            .enumerate()
            .filter(move |(_, line)| line_has_any_label(line, labels))
            .map(|(index, _)| index)
    }

    /// Value written after a label, or on the line below it.
    fn value_after_labels(&self, labels: &[&str]) -> String {
        for index in self.labelled_indices(labels) {
            let inline = extract_after_label(&self.lines[index], labels);
            if !inline.is_empty() {
                return clean_value(&inline);
            }
            if let Some(next) = self.lines.get(index + 1) {
                let next_value = clean_value(next);
                if !next_value.is_empty() {
                    return next_value;
                }
            }
        }
        String::new()
    }

    /// Date on a labelled line or the line below, slashed or compact.
    fn labelled_date(&self, labels: &[&str]) -> Option<String> {
        for index in self.labelled_indices(labels) {
            let line = &self.lines[index];
            if let Some(date) = non_empty(normalize_date_text(line))
                .or_else(|| non_empty(normalize_compact_date(line)))
            {
                return Some(date);
            }
            if let Some(next) = self.lines.get(index + 1) {
                if let Some(date) = non_empty(normalize_date_text(next))
                    .or_else(|| non_empty(normalize_compact_date(next)))
                {
                    return Some(date);
                }
            }
        }
        None
    }

    /// Cleaned parts of a multi-line block starting at the first labelled line.
    fn labelled_block(&self, labels: &[&str], stop_labels: &[&str], max_parts: usize) -> Vec<String> {
        let Some(start) = self.labelled_indices(labels).next() else {
            return Vec::new();
        };

        let mut parts = Vec::new();
        let inline = clean_value(&extract_after_label(&self.lines[start], labels));
        if !inline.is_empty() && !is_noise_or_label(&inline) {
            parts.push(inline);
        }

        for index in start + 1..self.lines.len() {
            if line_has_any_label(&self.normalized[index], stop_labels) {
                break;
            }
            if DATE_PATTERN.is_match(&self.lines[index]) {
                break;
            }
            let cleaned = clean_value(self.lines[index].trim_matches(&[' ', ',', '.', '-'][..]));
            if !cleaned.is_empty() && !is_noise_or_label(&cleaned) {
                parts.push(cleaned);
            }
            if parts.len() >= max_parts {
                break;
            }
        }
        parts
    }

    fn id_number(&self) -> String {
        let labelled = self.value_after_labels(ID_LABELS);

        let mut candidates: Vec<String> = TWELVE_DIGITS
            .find_iter(&self.full_text)
            .map(|m| m.as_str().to_string())
            .collect();
        for line in &self.lines {
            let compact = digits_only(line);
            if compact.len() == 12 {
                candidates.push(compact);
            }
        }

        let best = choose_best_id(&candidates);
        if !best.is_empty() {
            return best;
        }

        let all_digits = digits_only(&self.full_text);
        match TWELVE_DIGITS.find(&all_digits) {
            Some(m) if labelled.is_empty() || digits_only(&labelled).len() < 9 => {
                m.as_str().to_string()
            }
            _ => labelled,
        }
    }

    fn birth_date(&self) -> String {
        self.labelled_date(BIRTH_DATE_LABELS)
            .or_else(|| non_empty(normalize_date_text(&self.full_text)))
            .or_else(|| non_empty(normalize_compact_date(&self.full_text)))
            .unwrap_or_default()
    }

    fn sex(&self) -> String {
        let labelled = normalize_text(&self.value_after_labels(SEX_LABELS));
        let full = self.normalized_full.as_str();

        for text in [labelled.as_str(), full] {
            let text = COUNTRY_NAME.replace_all(text, " ");
            if MALE.is_match(&text) {
                return "Nam".to_string();
            }
            if FEMALE.is_match(&text) {
                return "Nữ".to_string();
            }
        }
        String::new()
    }

    fn full_name(&self) -> String {
        for index in self.labelled_indices(NAME_LABELS) {
            let inline = extract_after_label(&self.lines[index], NAME_LABELS);
            if !inline.is_empty() {
                let candidate = clean_value(&inline);
                if !is_noise_or_label(&candidate) {
                    return candidate;
                }
            }
            if let Some(next) = self.lines.get(index + 1) {
                let candidate = clean_value(next.trim_matches(&[' ', ':', '-'][..]));
                if !candidate.is_empty()
                    && !candidate.chars().any(|c| c.is_ascii_digit())
                    && !is_noise_or_label(&candidate)
                {
                    return candidate;
                }
            }
        }

        self.lines
            .iter()
            .find(|line| line.chars().count() > 4 && UPPERCASE_LINE.is_match(line))
            .cloned()
            .unwrap_or_default()
    }

    fn nationality(&self) -> String {
        let mut nationality = clean_value(&self.value_after_labels(NATIONALITY_LABELS));
        if nationality.is_empty() {
            nationality = self
                .lines
                .iter()
                .map(|line| extract_segment_by_labels(line, NATIONALITY_LABELS, NATIONALITY_STOPS))
                .find(|segment| !segment.is_empty())
                .map(|segment| clean_value(&segment))
                .unwrap_or_default();
        }

        if !nationality.is_empty() {
            let normalized = normalize_text(&nationality);
            if let Some(caps) = NATIONALITY_VALUE.captures(&normalized) {
                let candidate = NATIONALITY_TAIL.replace(caps[1].trim(), "");
                let candidate = candidate.trim();
                if !candidate.is_empty() {
                    nationality = title_case(candidate);
                }
            }
        }

        if !nationality.is_empty() {
            let normalized = normalize_text(&nationality);
            if normalized.contains("viet nam")
                || normalized.contains("vietnam")
                || normalized.contains("quoc tich")
                || normalized.contains("nationality")
                || normalized == "nam"
                || normalized == "male"
            {
                nationality = VIETNAM.to_string();
            }
        }

        if nationality.is_empty() && self.normalized_full.contains("viet nam") {
            nationality = VIETNAM.to_string();
        }
        nationality
    }

    fn place_of_origin(&self) -> String {
        let parts = self.labelled_block(ORIGIN_LABELS, ORIGIN_STOPS, MAX_ORIGIN_PARTS);
        if parts.is_empty() {
            return String::new();
        }

        let combined = clean_value(&parts.join(", "));
        let looks_like_place = combined.contains([',', ';']) || combined.chars().count() >= 10;
        if looks_like_place && !normalize_text(&combined).contains("citizen identity card") {
            dedupe_place_text(&combined)
        } else {
            String::new()
        }
    }

    fn residence(&self) -> String {
        let parts = self.labelled_block(RESIDENCE_LABELS, RESIDENCE_STOPS, MAX_RESIDENCE_PARTS);
        if parts.is_empty() {
            return String::new();
        }
        let combined = clean_value(&parts.join(", "));
        RESIDENCE_PREFIX
            .replace(&combined, "")
            .trim_matches(TRIM_CHARS)
            .to_string()
    }

    fn expiry_date(&self, birth_date: &str) -> String {
        if let Some(date) = self.labelled_date(EXPIRY_LABELS) {
            return date;
        }

        let dates: Vec<String> = DATE_PATTERN
            .find_iter(&self.full_text)
            .map(|m| normalize_date_text(m.as_str()))
            .filter(|d| !d.is_empty())
            .collect();
        if dates.len() > 1 {
            if let Some(date) = dates.iter().rev().find(|d| d.as_str() != birth_date) {
                return date.clone();
            }
        }
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn front_face_lines() -> Vec<&'static str> {
        vec![
            "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM",
            "Độc lập - Tự do - Hạnh phúc",
            "CĂN CƯỚC CÔNG DÂN",
            "Citizen Identity Card",
            "Số / No.: 001203004567",
            "Họ và tên / Full name:",
            "NGUYỄN VĂN AN",
            "Ngày sinh / Date of birth: 15/08/1995",
            "Giới tính / Sex: Nam Quốc tịch / Nationality: Việt Nam",
            "Quê quán / Place of origin:",
            "Tân Phong, Kiến Xương, Thái Bình",
            "Nơi thường trú / Place of residence:",
            "Số 12 ngõ 34 Phố Huế",
            "Phường Phạm Đình Hổ, Hai Bà Trưng, Hà Nội",
            "Có giá trị đến: 15/08/2035",
        ]
    }

    #[test]
    fn test_parse_front_face() {
        let record = parse_lines(&front_face_lines());

        assert_eq!(record.id_number, "001203004567");
        assert_eq!(record.full_name, "NGUYỄN VĂN AN");
        assert_eq!(record.date_of_birth, "15/08/1995");
        assert_eq!(record.sex, "Nam");
        assert_eq!(record.nationality, VIETNAM);
        assert_eq!(record.place_of_origin, "Tân Phong, Kiến Xương, Thái Bình");
        assert_eq!(record.expiry_date, "15/08/2035");
        assert!(record.residence.contains("Hai Bà Trưng"));
        assert!(record.issue_date.is_empty());
    }

    #[test]
    fn test_female_card_is_not_confused_by_country_name() {
        let lines = vec![
            "CỘNG HÒA XÃ HỘI CHỦ NGHĨA VIỆT NAM",
            "Số / No.: 079190001234",
            "Họ và tên / Full name: TRẦN THỊ BÍCH",
            "Ngày sinh / Date of birth: 02/01/1990",
            "Giới tính / Sex: Nữ Quốc tịch / Nationality: Việt Nam",
        ];
        let record = parse_lines(&lines);

        assert_eq!(record.sex, "Nữ");
        assert_eq!(record.full_name, "TRẦN THỊ BÍCH");
        assert_eq!(record.nationality, VIETNAM);
    }

    #[test]
    fn test_id_number_prefers_repeated_candidate() {
        let lines = vec!["Số: 001203004561", "001203004567", "0012 0300 4567"];
        let record = parse_lines(&lines);
        assert_eq!(record.id_number, "001203004567");
    }

    #[test]
    fn test_compact_birth_date_and_fallback_expiry() {
        let lines = vec![
            "Ngày sinh / Date of birth",
            "15081995",
            "Cấp ngày 01/02/2021",
            "Hạn 15/08/2035",
        ];
        let record = parse_lines(&lines);
        assert_eq!(record.date_of_birth, "15/08/1995");
        assert_eq!(record.expiry_date, "15/08/2035");
    }

    #[test]
    fn test_residence_falls_back_to_place_of_origin() {
        let lines = vec!["Quê quán / Place of origin: Xã Tân Phong, Kiến Xương, Thái Bình"];
        let record = parse_lines(&lines);
        assert_eq!(record.place_of_origin, "Xã Tân Phong, Kiến Xương, Thái Bình");
        assert_eq!(record.residence, record.place_of_origin);
    }

    #[test]
    fn test_uppercase_name_fallback() {
        let lines = vec!["LÊ HOÀNG MINH", "Ngày sinh: 01/01/2000"];
        let record = parse_lines(&lines);
        assert_eq!(record.full_name, "LÊ HOÀNG MINH");
    }

    #[test]
    fn test_low_confidence_boxes_are_ignored() {
        let items = vec![
            RecognizedText::from_rect(0.0, 0.0, 100.0, 20.0, "Số: 001203004567", 0.9),
            RecognizedText::from_rect(0.0, 30.0, 100.0, 20.0, "999999999999", 0.1),
        ];
        let record = parse_recognized(&items);
        assert_eq!(record.id_number, "001203004567");
    }

    #[test]
    fn test_empty_input_yields_empty_record() {
        let lines: Vec<String> = Vec::new();
        assert!(parse_lines(&lines).is_empty());
    }
}
