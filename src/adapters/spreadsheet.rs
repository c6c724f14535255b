use crate::core::reconcile::Cell;
use crate::utils::error::{EtlError, Result};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;

/// Cells of one sheet. `first_row` is the 1-based sheet row of `rows[0]`.
#[derive(Debug, Clone)]
pub struct SheetData {
    pub name: String,
    pub first_row: usize,
    pub rows: Vec<Vec<Cell>>,
}

/// Read a sheet from `.xlsx/.xlsm/.xls/.ods`, or a `.csv` file.
///
/// Without `sheet` the first worksheet is used.
pub fn read_sheet(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    let is_csv = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("csv"))
        .unwrap_or(false);

    if is_csv {
        read_csv(path)
    } else {
        read_workbook(path, sheet)
    }
}

fn read_csv(path: &Path) -> Result<SheetData> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.trim().is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    tracing::debug!("Read {} rows from {}", rows.len(), path.display());
    Ok(SheetData {
        name: path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default(),
        first_row: 1,
        rows,
    })
}

fn read_workbook(path: &Path, sheet: Option<&str>) -> Result<SheetData> {
    let mut workbook = open_workbook_auto(path)?;
    let names = workbook.sheet_names();

    let name = match sheet {
        Some(wanted) => names
            .iter()
            .find(|n| n.as_str() == wanted)
            .cloned()
            .ok_or_else(|| EtlError::ValidationError {
                message: format!(
                    "sheet '{}' not found, available sheets: {}",
                    wanted,
                    names.join(", ")
                ),
            })?,
        None => names.first().cloned().ok_or_else(|| EtlError::ValidationError {
            message: format!("{} has no worksheets", path.display()),
        })?,
    };

    let range = workbook.worksheet_range(&name)?;
    let (start_row, start_col) = range.start().unwrap_or((0, 0));

    let rows: Vec<Vec<Cell>> = range
        .rows()
        .map(|row| {
            // keep absolute column positions so column letters still line up
            let mut cells = vec![Cell::Empty; start_col as usize];
            cells.extend(row.iter().map(to_cell));
            cells
        })
        .collect();

    tracing::debug!("Read {} rows from sheet '{}'", rows.len(), name);
    Ok(SheetData {
        name,
        first_row: start_row as usize + 1,
        rows,
    })
}

fn to_cell(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) => Cell::Number(*value),
        Data::String(text) if text.trim().is_empty() => Cell::Empty,
        Data::String(text) => Cell::Text(text.clone()),
        other => Cell::Text(other.to_string()),
    }
}
