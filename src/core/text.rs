//! Text heuristics for OCR output of CCCD cards.
//!
//! Everything here works on single recognized lines. Label matching happens on
//! [`normalize_text`] output (lowercase, no diacritics), values are returned in
//! their original spelling unless noted otherwise.

use chrono::NaiveDate;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

pub(crate) const TRIM_CHARS: &[char] = &[' ', ';', ',', ':', '.', '-'];
const SEGMENT_TRIM: &[char] = &[' ', ';', ',', ':', '.', '-', '/'];
const SPLIT_TRIM: &[char] = &[' ', ';', ',', '.', '-'];
const PLACE_TRIM: &[char] = &[' ', '.', ',', '-'];

static LEADING_JUNK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\W_]+").expect("valid regex"));

static LABEL_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^(?:ho\s*va\s*ten|ho\s*ten|full\s*name|",
        r"ngay\s*sinh|date\s*of\s*birth|",
        r"gioi\s*tinh|sex|",
        r"quoc\s*tich|nationality|",
        r"que\s*quan|place\s*of\s*origin|",
        r"noi\s*thuong\s*tru|thuong\s*tru|permanent\s*residence|residence|",
        r"id\s*no|no\.?|so\s*dinh\s*danh|so)\s*(?:/\s*)?",
    ))
    .expect("valid regex")
});

static LABEL_WITH_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[^:;\-]*[:;\-]?\s*").expect("valid regex"));

static SLASHED_DATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2})\s*[./-]\s*([0-9]{1,2})\s*[./-]\s*([0-9]{4})").expect("valid regex")
});

static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([0-9]{8})\b").expect("valid regex"));

/// Dates written with `/` or `-` only, as used to end multi-line blocks.
pub(crate) static DATE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]{1,2}\s*[/-]\s*[0-9]{1,2}\s*[/-]\s*[0-9]{4})").expect("valid regex")
});

static PLACE_SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[;,]+").expect("valid regex"));

const NOISE_TOKENS: &[&str] = &[
    "ho va ten",
    "full name",
    "ngay sinh",
    "date of birth",
    "gioi tinh",
    "sex",
    "quoc tich",
    "nationality",
    "que quan",
    "place of origin",
    "noi thuong tru",
    "permanent residence",
    "residence",
    "co gia tri",
    "valid until",
    "can cuoc",
    "cong hoa",
    "citizen identity card",
    "identity card",
];

const NOISE_WORDS: &[&str] = &["quan", "pho", "of", "origin", "residence"];

const PLACE_FRAGMENTS: &[&str] = &["que", "quan", "pho", "thi"];

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Lowercase, strip diacritics (including `đ`) and collapse whitespace.
pub fn normalize_text(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .map(|c| match c {
            'đ' | 'Đ' => 'd',
            other => other,
        })
        .collect();
    collapse_whitespace(&folded.to_lowercase())
}

pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

pub fn strip_known_labels(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }

    let collapsed = collapse_whitespace(value);
    let mut value = LEADING_JUNK
        .replace(collapsed.trim_matches(TRIM_CHARS), "")
        .into_owned();

    let mut normalized = normalize_text(&value);
    while LABEL_PREFIX.is_match(&normalized) {
        value = LABEL_WITH_SEPARATOR
            .replace(&value, "")
            .trim_matches(TRIM_CHARS)
            .to_string();
        if value.is_empty() {
            break;
        }
        normalized = normalize_text(&value);
    }
    value
}

/// Normalized text between the earliest label and the nearest stop label.
pub fn extract_segment_by_labels(raw_line: &str, labels: &[&str], stop_labels: &[&str]) -> String {
    let normalized_line = normalize_text(raw_line);

    let mut start: Option<(usize, &str)> = None;
    for label in labels {
        if let Some(idx) = normalized_line.find(label) {
            if start.map_or(true, |(current, _)| idx < current) {
                start = Some((idx, *label));
            }
        }
    }
    let Some((idx, label)) = start else {
        return String::new();
    };

    let segment = normalized_line[idx + label.len()..].trim_matches(SEGMENT_TRIM);
    let stop_at = stop_labels
        .iter()
        .filter_map(|stop| segment.find(stop))
        .min()
        .unwrap_or(segment.len());
    let segment = segment[..stop_at].trim_matches(SEGMENT_TRIM);
    LEADING_JUNK.replace(segment, "").into_owned()
}

pub fn extract_after_label(raw_line: &str, labels: &[&str]) -> String {
    if raw_line.is_empty() {
        return String::new();
    }

    for separator in [':', '-'] {
        if let Some((_, right)) = raw_line.split_once(separator) {
            let cleaned = strip_known_labels(right.trim_matches(SPLIT_TRIM));
            if !cleaned.is_empty() {
                return cleaned;
            }
        }
    }

    let normalized_line = normalize_text(raw_line);
    for label in labels {
        if normalized_line.contains(label) {
            let candidate = strip_known_labels(raw_line);
            if !candidate.is_empty() && normalize_text(&candidate) != normalized_line {
                return candidate;
            }
        }
    }
    String::new()
}

pub fn clean_value(value: &str) -> String {
    let stripped = strip_known_labels(value);
    collapse_whitespace(&stripped)
        .trim_matches(TRIM_CHARS)
        .to_string()
}

/// True for empty, very short, or label-like text.
pub fn is_noise_or_label(value: &str) -> bool {
    if value.is_empty() {
        return true;
    }
    let normalized = normalize_text(value);
    if normalized.chars().count() < 3 {
        return true;
    }
    if NOISE_TOKENS.iter().any(|token| normalized.contains(token)) {
        return true;
    }
    NOISE_WORDS.contains(&normalized.as_str())
}

pub fn line_has_any_label(normalized_line: &str, labels: &[&str]) -> bool {
    labels.iter().any(|label| normalized_line.contains(label))
}

/// First `D/M/YYYY`-like date (`.`, `/` or `-` separated) as `DD/MM/YYYY`.
pub fn normalize_date_text(raw: &str) -> String {
    let Some(caps) = SLASHED_DATE.captures(raw) else {
        return String::new();
    };
    match (caps[1].parse::<u32>(), caps[2].parse::<u32>()) {
        (Ok(day), Ok(month)) => format!("{:02}/{:02}/{}", day, month, &caps[3]),
        _ => String::new(),
    }
}

/// First standalone `DDMMYYYY` run, if it is a real date between 1900 and 2100.
pub fn normalize_compact_date(raw: &str) -> String {
    let Some(caps) = COMPACT_DATE.captures(raw) else {
        return String::new();
    };
    parse_compact_date(&caps[1])
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_default()
}

pub(crate) fn parse_compact_date(compact: &str) -> Option<NaiveDate> {
    if compact.len() != 8 || !compact.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let day: u32 = compact[0..2].parse().ok()?;
    let month: u32 = compact[2..4].parse().ok()?;
    let year: i32 = compact[4..8].parse().ok()?;
    if !(1900..=2100).contains(&year) {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Most frequent 12-digit candidate; ties prefer a leading `0`, then first seen.
pub fn choose_best_id<S: AsRef<str>>(candidates: &[S]) -> String {
    let mut order: Vec<String> = Vec::new();
    let mut counts: HashMap<String, usize> = HashMap::new();

    for candidate in candidates {
        let cleaned = digits_only(candidate.as_ref());
        if cleaned.len() != 12 {
            continue;
        }
        let count = counts.entry(cleaned.clone()).or_insert(0);
        if *count == 0 {
            order.push(cleaned);
        }
        *count += 1;
    }

    let mut best: Option<(&String, (usize, bool))> = None;
    for id in &order {
        let rank = (counts[id], id.starts_with('0'));
        if best.map_or(true, |(_, best_rank)| rank > best_rank) {
            best = Some((id, rank));
        }
    }
    best.map(|(id, _)| id.clone()).unwrap_or_default()
}

pub fn dedupe_place_text(value: &str) -> String {
    let mut seen = HashSet::new();
    let mut parts = Vec::new();

    for part in PLACE_SEPARATORS.split(value) {
        let part = part.trim_matches(PLACE_TRIM);
        let normalized = normalize_text(part);
        if part.is_empty() || seen.contains(&normalized) {
            continue;
        }
        if PLACE_FRAGMENTS.contains(&normalized.as_str()) {
            continue;
        }
        seen.insert(normalized);
        parts.push(part);
    }
    parts.join(", ")
}

/// Uppercase the first letter of every alphabetic run, lowercase the rest.
pub fn title_case(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut previous_alpha = false;
    for c in text.chars() {
        if c.is_alphabetic() {
            if previous_alpha {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_alpha = true;
        } else {
            result.push(c);
            previous_alpha = false;
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_text_strips_diacritics() {
        assert_eq!(normalize_text("  Họ và tên /  Full name "), "ho va ten / full name");
        assert_eq!(normalize_text("Số định danh"), "so dinh danh");
        assert_eq!(normalize_text("Quê quán"), "que quan");
        assert_eq!(normalize_text("VIỆT NAM"), "viet nam");
    }

    #[test]
    fn test_strip_known_labels() {
        assert_eq!(strip_known_labels("Họ và tên / Full name: NGUYỄN VĂN A"), "NGUYỄN VĂN A");
        assert_eq!(strip_known_labels("12. Nơi thường trú: Hà Nội"), "Hà Nội");
        assert_eq!(strip_known_labels("NGUYỄN VĂN A"), "NGUYỄN VĂN A");
        assert_eq!(strip_known_labels("Quốc tịch"), "");
        assert_eq!(strip_known_labels(""), "");
    }

    #[test]
    fn test_extract_after_label() {
        let labels = ["ho va ten", "full name"];
        assert_eq!(
            extract_after_label("Họ và tên / Full name: TRẦN THỊ B", &labels),
            "TRẦN THỊ B"
        );
        assert_eq!(extract_after_label("Họ và tên / Full name", &labels), "");
        assert_eq!(extract_after_label("", &labels), "");
    }

    #[test]
    fn test_extract_segment_by_labels() {
        let segment = extract_segment_by_labels(
            "Giới tính / Sex: Nam Quốc tịch / Nationality: Việt Nam",
            &["quoc tich", "nationality"],
            &["que quan", "gioi tinh"],
        );
        assert_eq!(segment, "nationality: viet nam");

        let stopped = extract_segment_by_labels(
            "Quốc tịch: Việt Nam Quê quán: Hà Nam",
            &["quoc tich"],
            &["que quan"],
        );
        assert_eq!(stopped, "viet nam");

        assert_eq!(extract_segment_by_labels("Ngày sinh", &["quoc tich"], &[]), "");
    }

    #[test]
    fn test_noise_detection() {
        assert!(is_noise_or_label(""));
        assert!(is_noise_or_label("ab"));
        assert!(is_noise_or_label("CĂN CƯỚC CÔNG DÂN"));
        assert!(is_noise_or_label("Place of origin"));
        assert!(is_noise_or_label("Quận"));
        assert!(!is_noise_or_label("Xã Tân Phong, Kiến Xương, Thái Bình"));
    }

    #[test]
    fn test_normalize_date_text() {
        assert_eq!(normalize_date_text("Ngày sinh: 1/2/1990"), "01/02/1990");
        assert_eq!(normalize_date_text("15 - 08 - 2031"), "15/08/2031");
        assert_eq!(normalize_date_text("03.11.1985"), "03/11/1985");
        assert_eq!(normalize_date_text("no date here"), "");
    }

    #[test]
    fn test_normalize_compact_date() {
        assert_eq!(normalize_compact_date("dob 01021990"), "01/02/1990");
        assert_eq!(normalize_compact_date("31021990"), "");
        assert_eq!(normalize_compact_date("01021850"), "");
        assert_eq!(normalize_compact_date("001203004567"), "");
    }

    #[test]
    fn test_choose_best_id() {
        let candidates = ["101203004567", "001203004567", "001203004567", "12345"];
        assert_eq!(choose_best_id(&candidates), "001203004567");

        let tie = ["101203004567", "001203004567"];
        assert_eq!(choose_best_id(&tie), "001203004567");

        let first_seen = ["101203004567", "201203004567"];
        assert_eq!(choose_best_id(&first_seen), "101203004567");

        let none: [&str; 1] = ["123"];
        assert_eq!(choose_best_id(&none), "");
    }

    #[test]
    fn test_dedupe_place_text() {
        assert_eq!(
            dedupe_place_text("Tân Phong, Kiến Xương; tân phong, Quận, Thái Bình"),
            "Tân Phong, Kiến Xương, Thái Bình"
        );
        assert_eq!(dedupe_place_text(""), "");
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("viet nam"), "Viet Nam");
        assert_eq!(title_case("LAO-cai"), "Lao-Cai");
    }
}
