//! CCCD QR payloads.
//!
//! The QR code on a chip-based card encodes
//! `id|old_id|full name|DDMMYYYY birth|sex|address|DDMMYYYY issue`,
//! newer cards append further fields which are ignored here.

use crate::core::card_parser::VIETNAM;
use crate::core::text::{collapse_whitespace, normalize_text, parse_compact_date};
use crate::domain::model::IdRecord;
use crate::utils::error::{EtlError, Result};

const MIN_FIELDS: usize = 6;

pub fn parse_cccd_payload(payload: &str) -> Result<IdRecord> {
    let fields: Vec<&str> = payload.trim().split('|').map(str::trim).collect();
    if fields.len() < MIN_FIELDS {
        return Err(EtlError::QrError {
            message: format!(
                "expected at least {} '|' separated fields, found {}",
                MIN_FIELDS,
                fields.len()
            ),
        });
    }

    let id_number = fields[0];
    if id_number.len() != 12 || !id_number.chars().all(|c| c.is_ascii_digit()) {
        return Err(EtlError::QrError {
            message: format!("'{}' is not a 12-digit CCCD number", id_number),
        });
    }

    Ok(IdRecord {
        id_number: id_number.to_string(),
        old_id_number: fields[1].to_string(),
        full_name: collapse_whitespace(fields[2]),
        date_of_birth: format_compact_date(fields[3]),
        sex: canonical_sex(fields[4]),
        residence: collapse_whitespace(fields[5]),
        issue_date: fields.get(6).map(|d| format_compact_date(d)).unwrap_or_default(),
        nationality: VIETNAM.to_string(),
        ..IdRecord::default()
    })
}

/// `DDMMYYYY` → `DD/MM/YYYY`; anything else is kept as written.
fn format_compact_date(raw: &str) -> String {
    parse_compact_date(raw)
        .map(|date| date.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| raw.to_string())
}

fn canonical_sex(raw: &str) -> String {
    match normalize_text(raw).as_str() {
        "nam" | "male" => "Nam".to_string(),
        "nu" | "female" => "Nữ".to_string(),
        _ => raw.to_string(),
    }
}

/// Pick the first payload that parses as a CCCD record.
pub fn first_cccd_record(payloads: &[String]) -> Result<IdRecord> {
    let mut last_error = None;
    for payload in payloads {
        match parse_cccd_payload(payload) {
            Ok(record) => return Ok(record),
            Err(e) => {
                tracing::debug!("Skipping QR payload: {}", e);
                last_error = Some(e);
            }
        }
    }
    Err(last_error.unwrap_or_else(|| EtlError::QrError {
        message: "no QR code found; use the card face that carries the QR code (back face)"
            .to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAYLOAD: &str =
        "001203004567|123456789|Nguyễn Văn An|15081995|Nam|Số 12 ngõ 34 Phố Huế, Hai Bà Trưng, Hà Nội|01022021";

    #[test]
    fn test_parse_payload() {
        let record = parse_cccd_payload(PAYLOAD).unwrap();
        assert_eq!(record.id_number, "001203004567");
        assert_eq!(record.old_id_number, "123456789");
        assert_eq!(record.full_name, "Nguyễn Văn An");
        assert_eq!(record.date_of_birth, "15/08/1995");
        assert_eq!(record.sex, "Nam");
        assert_eq!(record.residence, "Số 12 ngõ 34 Phố Huế, Hai Bà Trưng, Hà Nội");
        assert_eq!(record.issue_date, "01/02/2021");
        assert_eq!(record.nationality, VIETNAM);
        assert!(record.place_of_origin.is_empty());
    }

    #[test]
    fn test_missing_old_id_and_extra_fields() {
        let payload = "079190001234||Trần Thị Bích|02011990|Nữ|Quận 1, TP Hồ Chí Minh|10052022|extra|more";
        let record = parse_cccd_payload(payload).unwrap();
        assert_eq!(record.old_id_number, "");
        assert_eq!(record.sex, "Nữ");
        assert_eq!(record.issue_date, "10/05/2022");
    }

    #[test]
    fn test_six_field_payload_has_no_issue_date() {
        let payload = "079190001234||Trần Thị Bích|02011990|Nữ|Quận 1";
        let record = parse_cccd_payload(payload).unwrap();
        assert_eq!(record.issue_date, "");
    }

    #[test]
    fn test_rejects_non_cccd_payloads() {
        assert!(parse_cccd_payload("https://example.com").is_err());
        assert!(parse_cccd_payload("12345|a|b|c|d|e").is_err());
    }

    #[test]
    fn test_first_cccd_record() {
        let payloads = vec!["https://example.com".to_string(), PAYLOAD.to_string()];
        assert_eq!(first_cccd_record(&payloads).unwrap().id_number, "001203004567");

        let err = first_cccd_record(&[]).unwrap_err();
        assert!(err.to_string().contains("back face"));
    }
}
