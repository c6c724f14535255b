use cccd_etl::adapters::spreadsheet::read_sheet;
use cccd_etl::core::reconcile::{reconcile, ColumnRef, ReconcileSpec};
use cccd_etl::EtlError;
use tempfile::TempDir;

const DECLARATION: &str = "\
TỜ KHAI HẢI QUAN,,,,
Công ty TNHH Minh Phát,,,,
STT,Số tờ khai,Mã HS,Mô tả,Trị giá
1,104512345610,8471.30,Máy tính xách tay,\"12.500.000\"
2,104512345620,8517.13,Điện thoại,\"8.250.000,50\"
3,104512345630,8528.52,Màn hình,
4,104512345640,8443.32,Máy in,chưa khai
5,104512345650,8504.40,Bộ sạc,(250.000)
TỔNG CỘNG,,,,\"20.500.000,50\"
";

fn write_declaration(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("tkhq.csv");
    std::fs::write(&path, DECLARATION).unwrap();
    path
}

fn spec() -> ReconcileSpec {
    ReconcileSpec {
        value_column: ColumnRef::parse("E").unwrap(),
        key_column: Some(ColumnRef::parse("2").unwrap()),
        start_label: "Số tờ khai".to_string(),
        end_label: Some("Tong cong".to_string()),
        expected_total: None,
    }
}

#[test]
fn test_csv_declaration_balances() {
    let dir = TempDir::new().unwrap();
    let sheet = read_sheet(&write_declaration(&dir), None).unwrap();
    assert_eq!(sheet.name, "tkhq");
    assert_eq!(sheet.first_row, 1);

    let report = reconcile(&sheet.rows, sheet.first_row, &spec()).unwrap();

    assert_eq!(report.start_row, 3);
    assert_eq!(report.end_row, Some(9));
    assert_eq!(report.rows.len(), 3);
    assert_eq!(report.rows[0].row, 4);
    assert_eq!(report.rows[0].key, "104512345610");
    assert_eq!(report.rows[2].value, -250_000.0);
    assert_eq!(report.skipped_rows, vec![7]);
    assert!((report.total - 20_500_000.5).abs() < 1e-6);
    assert_eq!(report.expected, Some(20_500_000.5));
    assert!(report.is_balanced());
}

#[test]
fn test_expected_total_override_reports_difference() {
    let dir = TempDir::new().unwrap();
    let sheet = read_sheet(&write_declaration(&dir), None).unwrap();

    let spec = ReconcileSpec {
        expected_total: Some(21_000_000.0),
        ..spec()
    };
    let report = reconcile(&sheet.rows, sheet.first_row, &spec).unwrap();

    assert!(!report.is_balanced());
    let difference = report.difference.unwrap();
    assert!((difference + 499_999.5).abs() < 1e-6);
}

#[test]
fn test_missing_start_label_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let sheet = read_sheet(&write_declaration(&dir), None).unwrap();

    let spec = ReconcileSpec {
        start_label: "Số hóa đơn".to_string(),
        ..spec()
    };
    let err = reconcile(&sheet.rows, sheet.first_row, &spec).unwrap_err();
    assert!(matches!(err, EtlError::ValidationError { .. }));
}

#[test]
fn test_unreadable_workbook_is_an_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("tkhq.xlsx");
    std::fs::write(&path, b"not a workbook").unwrap();
    assert!(read_sheet(&path, None).is_err());
}
