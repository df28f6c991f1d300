//! BOM layout detection
//!
//! Both recognized layouts are identified by their sheet set plus the cell
//! count of the 5th row. Anything else is `Unknown`, which is a valid result;
//! only a structurally unreadable candidate sheet is an error.

use crate::error::BomError;

use super::workbook::{CellValue, Workbook};

/// Sheets a common BOM workbook must carry
pub const COMMON_SHEETS: [&str; 5] = ["ALL", "SMD", "PTH", "BOTTOM", "MP"];
/// Sheets a matrix BOM workbook must carry
pub const MATRIX_SHEETS: [&str; 2] = ["SMD", "PTH"];

/// Header row inspected by both checks (row 5, 0-indexed)
const HEADER_ROW: usize = 4;
const COMMON_HEADER_CELLS: usize = 13;
const MATRIX_HEADER_CELLS: usize = 17;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BomType {
    Common,
    Matrix,
    Unknown,
}

/// Classify a workbook. The common check wins when both layouts would match.
pub fn detect_bom_type(workbook: &Workbook) -> Result<BomType, BomError> {
    if let Some(rows) = header_rows(workbook, &COMMON_SHEETS)? {
        // Present cells count even when their text is empty
        let all_match = rows.iter().all(|row| {
            row.iter()
                .filter(|c| !matches!(c, CellValue::Blank))
                .count()
                == COMMON_HEADER_CELLS
        });
        if all_match {
            return Ok(BomType::Common);
        }
    }

    if let Some(rows) = header_rows(workbook, &MATRIX_SHEETS)? {
        if rows.iter().all(|row| row.len() == MATRIX_HEADER_CELLS) {
            return Ok(BomType::Matrix);
        }
    }

    Ok(BomType::Unknown)
}

/// Header row of every named sheet, or None when any sheet is absent
fn header_rows<'a>(
    workbook: &'a Workbook,
    names: &[&str],
) -> Result<Option<Vec<Vec<&'a CellValue>>>, BomError> {
    let mut rows = Vec::with_capacity(names.len());
    for name in names {
        let Some(sheet) = workbook.sheet(name) else {
            return Ok(None);
        };
        if sheet.is_empty() {
            return Err(BomError::Classification(format!(
                "sheet {name} has no usable cell range"
            )));
        }
        rows.push(sheet.row(HEADER_ROW));
    }
    Ok(Some(rows))
}
