//! Reconciliation of a numeric column against its running total.
//!
//! Used for customs declaration (TKHQ) sheets: the rows between a start label
//! and an end label are summed and compared with the declared total, usually
//! written on the end-label row.

use crate::core::text::normalize_text;
use crate::utils::error::{EtlError, Result};
use serde::Serialize;

/// Two totals closer than this are considered equal.
pub const TOLERANCE: f64 = 0.005;

/// `XFD`, the last column of an xlsx sheet.
const MAX_COLUMN_LETTERS: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) => format_number(*n),
            Cell::Text(t) => t.trim().to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(t) => parse_amount(t),
            Cell::Empty => None,
        }
    }
}

/// A column given as letters (`E`, `AB`) or a 1-based number (`5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnRef(pub usize);

impl ColumnRef {
    pub fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = |reason: &str| EtlError::InvalidConfigValueError {
            field: "column".to_string(),
            value: raw.to_string(),
            reason: reason.to_string(),
        };

        if raw.is_empty() {
            return Err(invalid("column cannot be empty"));
        }
        if let Ok(number) = raw.parse::<usize>() {
            if number == 0 {
                return Err(invalid("column numbers start at 1"));
            }
            return Ok(ColumnRef(number - 1));
        }
        if !raw.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(invalid("expected column letters such as 'E' or a number"));
        }
        if raw.len() > MAX_COLUMN_LETTERS {
            return Err(invalid("column letters go up to XFD"));
        }

        let index = raw
            .to_ascii_uppercase()
            .bytes()
            .fold(0usize, |acc, b| acc * 26 + (b - b'A' + 1) as usize);
        Ok(ColumnRef(index - 1))
    }
}

#[derive(Debug, Clone)]
pub struct ReconcileSpec {
    pub value_column: ColumnRef,
    pub key_column: Option<ColumnRef>,
    pub start_label: String,
    pub end_label: Option<String>,
    pub expected_total: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileRow {
    /// 1-based sheet row.
    pub row: usize,
    pub key: String,
    pub value: f64,
    pub running_total: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub start_row: usize,
    pub end_row: Option<usize>,
    pub rows: Vec<ReconcileRow>,
    pub skipped_rows: Vec<usize>,
    pub total: f64,
    pub expected: Option<f64>,
    pub difference: Option<f64>,
}

impl ReconcileReport {
    pub fn is_balanced(&self) -> bool {
        self.difference.map_or(false, |d| d.abs() < TOLERANCE)
    }
}

fn row_contains(row: &[Cell], label: &str) -> bool {
    row.iter()
        .any(|cell| normalize_text(&cell.as_text()).contains(label))
}

/// Sum `spec.value_column` over the rows strictly between the labels.
///
/// `first_row` is the 1-based sheet row of `rows[0]`, used in the report.
pub fn reconcile(rows: &[Vec<Cell>], first_row: usize, spec: &ReconcileSpec) -> Result<ReconcileReport> {
    let start_label = normalize_text(&spec.start_label);
    let start = rows
        .iter()
        .position(|row| row_contains(row, &start_label))
        .ok_or_else(|| EtlError::ValidationError {
            message: format!("start label '{}' not found in the sheet", spec.start_label),
        })?;

    let end = match &spec.end_label {
        Some(label) => {
            let end_label = normalize_text(label);
            let found = rows[start + 1..]
                .iter()
                .position(|row| row_contains(row, &end_label))
                .map(|offset| start + 1 + offset);
            if found.is_none() {
                tracing::warn!("End label '{}' not found, summing to the last row", label);
            }
            found
        }
        None => None,
    };

    let body_end = end.unwrap_or(rows.len());
    let column = spec.value_column.0;
    let mut report_rows = Vec::new();
    let mut skipped_rows = Vec::new();
    let mut running_total = 0.0;

    for (index, row) in rows.iter().enumerate().take(body_end).skip(start + 1) {
        let sheet_row = first_row + index;
        match row.get(column).and_then(Cell::as_number) {
            Some(value) => {
                running_total += value;
                let key = spec
                    .key_column
                    .and_then(|key| row.get(key.0))
                    .map(Cell::as_text)
                    .unwrap_or_default();
                report_rows.push(ReconcileRow {
                    row: sheet_row,
                    key,
                    value,
                    running_total,
                });
            }
            None => {
                let blank = row.get(column).map_or(true, |c| c.as_text().is_empty());
                if !blank {
                    tracing::warn!("Row {} has a non-numeric value, skipped", sheet_row);
                    skipped_rows.push(sheet_row);
                }
            }
        }
    }

    let expected = match spec.expected_total {
        Some(value) => Some(value),
        None => match end {
            Some(end_index) => {
                let cell = rows[end_index].get(column).unwrap_or(&Cell::Empty);
                match cell.as_number() {
                    Some(value) => Some(value),
                    None if cell.as_text().is_empty() => None,
                    None => {
                        return Err(EtlError::ValidationError {
                            message: format!(
                                "declared total '{}' on row {} is not a number",
                                cell.as_text(),
                                first_row + end_index
                            ),
                        })
                    }
                }
            }
            None => None,
        },
    };

    Ok(ReconcileReport {
        start_row: first_row + start,
        end_row: end.map(|e| first_row + e),
        rows: report_rows,
        skipped_rows,
        total: running_total,
        expected,
        difference: expected.map(|e| running_total - e),
    })
}

/// Parse amounts written as `1.234.567`, `1,234,567.50`, `1 234,5` or `(1.000)`.
pub fn parse_amount(raw: &str) -> Option<f64> {
    let mut text: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    if text.is_empty() {
        return None;
    }

    let negative = text.starts_with('(') && text.ends_with(')');
    if negative {
        text = text[1..text.len() - 1].to_string();
    }

    let dots = text.matches('.').count();
    let commas = text.matches(',').count();
    let normalized = match (dots, commas) {
        (0, 0) => text,
        (_, 0) if dots > 1 || is_grouped(&text, '.') => text.replace('.', ""),
        (_, 0) => text,
        (0, _) if commas > 1 || is_grouped(&text, ',') => text.replace(',', ""),
        (0, _) => text.replace(',', "."),
        _ => {
            // the separator that comes last is the decimal one
            let last_dot = text.rfind('.');
            let last_comma = text.rfind(',');
            if last_comma > last_dot {
                text.replace('.', "").replace(',', ".")
            } else {
                text.replace(',', "")
            }
        }
    };

    if !normalized
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+'))
    {
        return None;
    }
    let value: f64 = normalized.parse().ok()?;
    Some(if negative { -value } else { value })
}

/// `1.234` style: one separator followed by exactly three digits.
fn is_grouped(text: &str, separator: char) -> bool {
    match text.split_once(separator) {
        Some((head, tail)) => {
            !head.is_empty()
                && head.len() <= 3
                && tail.len() == 3
                && tail.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(value: &str) -> Cell {
        Cell::Text(value.to_string())
    }

    fn sheet() -> Vec<Vec<Cell>> {
        vec![
            vec![text("BẢNG KÊ TỜ KHAI"), Cell::Empty, Cell::Empty],
            vec![text("STT"), text("Số TKHQ"), text("Trị giá")],
            vec![text("Bắt đầu"), Cell::Empty, Cell::Empty],
            vec![Cell::Number(1.0), text("104512345678"), Cell::Number(1_500_000.0)],
            vec![Cell::Number(2.0), text("104512345679"), text("2.250.000")],
            vec![Cell::Number(3.0), text("104512345680"), Cell::Empty],
            vec![Cell::Number(4.0), text("104512345681"), Cell::Number(250_000.0)],
            vec![text("Tổng cộng"), Cell::Empty, Cell::Number(4_000_000.0)],
        ]
    }

    fn spec() -> ReconcileSpec {
        ReconcileSpec {
            value_column: ColumnRef::parse("C").unwrap(),
            key_column: Some(ColumnRef::parse("B").unwrap()),
            start_label: "bat dau".to_string(),
            end_label: Some("Tổng cộng".to_string()),
            expected_total: None,
        }
    }

    #[test]
    fn test_reconcile_balanced_sheet() {
        let report = reconcile(&sheet(), 1, &spec()).unwrap();

        assert_eq!(report.start_row, 3);
        assert_eq!(report.end_row, Some(8));
        assert_eq!(report.rows.len(), 3);
        assert_eq!(report.rows[1].key, "104512345679");
        assert_eq!(report.rows[1].running_total, 3_750_000.0);
        assert_eq!(report.total, 4_000_000.0);
        assert_eq!(report.expected, Some(4_000_000.0));
        assert!(report.is_balanced());
    }

    #[test]
    fn test_reconcile_reports_difference() {
        let mut spec = spec();
        spec.expected_total = Some(4_100_000.0);
        let report = reconcile(&sheet(), 1, &spec).unwrap();

        assert_eq!(report.difference, Some(-100_000.0));
        assert!(!report.is_balanced());
    }

    #[test]
    fn test_reconcile_without_end_label_sums_to_last_row() {
        let mut spec = spec();
        spec.end_label = Some("không có".to_string());
        let report = reconcile(&sheet(), 1, &spec).unwrap();

        assert_eq!(report.end_row, None);
        assert_eq!(report.total, 8_000_000.0);
        assert_eq!(report.expected, None);
        assert!(!report.is_balanced());
    }

    #[test]
    fn test_missing_start_label_is_an_error() {
        let mut spec = spec();
        spec.start_label = "nowhere".to_string();
        assert!(reconcile(&sheet(), 1, &spec).is_err());
    }

    #[test]
    fn test_non_numeric_rows_are_skipped() {
        let mut rows = sheet();
        rows[5][2] = text("n/a");
        let report = reconcile(&rows, 1, &spec()).unwrap();
        assert_eq!(report.skipped_rows, vec![6]);
    }

    #[test]
    fn test_column_ref() {
        assert_eq!(ColumnRef::parse("A").unwrap(), ColumnRef(0));
        assert_eq!(ColumnRef::parse("e").unwrap(), ColumnRef(4));
        assert_eq!(ColumnRef::parse("AB").unwrap(), ColumnRef(27));
        assert_eq!(ColumnRef::parse("3").unwrap(), ColumnRef(2));
        assert!(ColumnRef::parse("0").is_err());
        assert!(ColumnRef::parse("C3").is_err());
        assert_eq!(ColumnRef::parse("XFD").unwrap(), ColumnRef(16383));
    }

    #[test]
    fn test_column_ref_rejects_long_letter_runs() {
        let err = ColumnRef::parse("ZZZZZZZZZZZZZZZZ").unwrap_err();
        assert!(matches!(err, EtlError::InvalidConfigValueError { .. }));
        assert!(ColumnRef::parse("AAAA").is_err());
    }

    #[test]
    fn test_parse_amount() {
        assert_eq!(parse_amount("1.234.567"), Some(1_234_567.0));
        assert_eq!(parse_amount("1,234,567.50"), Some(1_234_567.5));
        assert_eq!(parse_amount("1.234.567,5"), Some(1_234_567.5));
        assert_eq!(parse_amount("1 500"), Some(1500.0));
        assert_eq!(parse_amount("12,5"), Some(12.5));
        assert_eq!(parse_amount("2.5"), Some(2.5));
        assert_eq!(parse_amount("(1.000)"), Some(-1000.0));
        assert_eq!(parse_amount("abc"), None);
        assert_eq!(parse_amount(""), None);
    }
}
