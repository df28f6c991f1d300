//! In-memory workbook model
//!
//! Loads XLSX bytes through calamine into a dense grid of tagged cell values.
//! All parser logic downstream operates on [`CellValue`], never on calamine's
//! raw types, and addresses cells by absolute 0-based (row, column).

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx, open_workbook_from_rs};

use crate::error::BomError;

/// A spreadsheet cell at the extraction boundary
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Date(String),
    Blank,
}

const BLANK: CellValue = CellValue::Blank;

impl CellValue {
    pub fn is_blank(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell content as trimmed text; whole numbers render without a fraction
    pub fn to_text(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(f) => {
                if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    (*f as i64).to_string()
                } else {
                    f.to_string()
                }
            }
            CellValue::Date(s) => s.trim().to_string(),
            CellValue::Blank => String::new(),
        }
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Blank,
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::Bool(b) => CellValue::Text(b.to_string()),
            Data::DateTime(dt) => CellValue::Date(format!("{dt}")),
            Data::DateTimeIso(s) => CellValue::Date(s.clone()),
            Data::DurationIso(s) => CellValue::Date(s.clone()),
            Data::Error(_) => CellValue::Blank,
        }
    }
}

/// One sheet's used range, addressable by absolute position
#[derive(Debug, Clone)]
pub struct Sheet {
    name: String,
    start_row: usize,
    start_col: usize,
    cells: Vec<Vec<CellValue>>,
}

impl Sheet {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the sheet has no used cell range at all
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Width of the used column range
    pub fn width(&self) -> usize {
        self.cells.first().map(Vec::len).unwrap_or(0)
    }

    /// Last used row index (absolute)
    pub fn end_row(&self) -> usize {
        self.start_row + self.cells.len().saturating_sub(1)
    }

    /// Cell at an absolute (row, column); Blank outside the used range
    pub fn cell(&self, row: usize, col: usize) -> &CellValue {
        if row < self.start_row || col < self.start_col {
            return &BLANK;
        }
        self.cells
            .get(row - self.start_row)
            .and_then(|r| r.get(col - self.start_col))
            .unwrap_or(&BLANK)
    }

    /// Cell text at an absolute (row, column); empty string when absent
    pub fn text(&self, row: usize, col: usize) -> String {
        self.cell(row, col).to_text()
    }

    /// All cells of one row across the used column range
    pub fn row(&self, row: usize) -> Vec<&CellValue> {
        (self.start_col..self.start_col + self.width())
            .map(|col| self.cell(row, col))
            .collect()
    }

    #[cfg(test)]
    pub fn from_rows(name: &str, rows: Vec<Vec<CellValue>>) -> Self {
        // Test grids start at A1; pad ragged rows to a rectangle.
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let cells = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, CellValue::Blank);
                r
            })
            .collect();
        Sheet {
            name: name.to_string(),
            start_row: 0,
            start_col: 0,
            cells,
        }
    }
}

/// A parsed workbook: named sheets in file order
#[derive(Debug, Clone)]
pub struct Workbook {
    sheets: Vec<Sheet>,
}

impl Workbook {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BomError> {
        let cursor = Cursor::new(bytes);
        let mut workbook: Xlsx<Cursor<&[u8]>> = open_workbook_from_rs(cursor)
            .map_err(|e: calamine::XlsxError| BomError::Read(e.to_string()))?;

        let names = workbook.sheet_names().to_vec();
        let mut sheets = Vec::with_capacity(names.len());
        for name in names {
            let range = workbook
                .worksheet_range(&name)
                .map_err(|e| BomError::Read(format!("sheet {name}: {e}")))?;
            let (start_row, start_col) = range
                .start()
                .map(|(r, c)| (r as usize, c as usize))
                .unwrap_or((0, 0));
            let cells = range
                .rows()
                .map(|row| row.iter().map(CellValue::from).collect())
                .collect();
            sheets.push(Sheet {
                name,
                start_row,
                start_col,
                cells,
            });
        }

        Ok(Workbook { sheets })
    }

    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|s| s.name.as_str()).collect()
    }

    #[cfg(test)]
    pub fn from_sheets(sheets: Vec<Sheet>) -> Self {
        Workbook { sheets }
    }
}
