//! Reads bulk-import workbooks (`.xlsx`, `.xls`, `.ods`) into rows keyed by
//! the header row.

use std::collections::HashMap;
use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, DataType, Range, Reader};

pub type Row = HashMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum SpreadsheetError {
    #[error("could not read workbook: {0}")]
    Unreadable(#[from] calamine::Error),

    #[error("workbook has no sheets")]
    NoSheets,

    #[error("first sheet has no header row")]
    MissingHeader,
}

/// Parses the first sheet of a workbook. Fully blank rows are skipped.
pub fn read_rows(bytes: Vec<u8>) -> Result<Vec<Row>, SpreadsheetError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or(SpreadsheetError::NoSheets)??;
    rows_from_range(&range)
}

pub fn rows_from_range(range: &Range<Data>) -> Result<Vec<Row>, SpreadsheetError> {
    let mut rows = range.rows();
    let header: Vec<String> = rows
        .next()
        .ok_or(SpreadsheetError::MissingHeader)?
        .iter()
        .map(cell_text)
        .collect();

    if header.iter().all(String::is_empty) {
        return Err(SpreadsheetError::MissingHeader);
    }

    Ok(rows
        .filter_map(|cells| {
            let row: Row = header
                .iter()
                .zip(cells.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, cell)| (name.clone(), cell_text(cell)))
                .filter(|(_, value)| !value.is_empty())
                .collect();
            (!row.is_empty()).then_some(row)
        })
        .collect())
}

fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(value) => value.trim().to_string(),
        Data::Bool(value) => value.to_string(),
        // whole numbers come back as floats
        Data::Float(value) if value.fract() == 0.0 && value.abs() < 1e15 => format!("{}", *value as i64),
        Data::DateTime(_) | Data::DateTimeIso(_) => cell
            .as_date()
            .map(|date| date.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| cell.to_string()),
        other => other.to_string().trim().to_string(),
    }
}
