//! Header metadata extraction
//!
//! Both layouts carry project-identifying metadata in label-prefixed
//! free-text cells at fixed addresses on the SMD sheet.

use super::workbook::Sheet;

/// Fixed header cell addresses, 0-based (row, column)
mod addr {
    pub const PROJECT: (usize, usize) = (2, 1); // B3
    pub const DESCRIPTION: (usize, usize) = (3, 1); // B4
    pub const PCA_PN: (usize, usize) = (3, 5); // F4
    pub const VERSION: (usize, usize) = (2, 7); // H3
    pub const PHASE: (usize, usize) = (2, 9); // J3
    pub const DATE: (usize, usize) = (3, 7); // H4
}

/// Project-identifying metadata shared by both BOM layouts
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HeaderInfo {
    pub project: String,
    pub description: String,
    pub pcapn: String,
    pub version: String,
    pub phase: String,
    pub date: String,
    /// Source filename of the imported workbook
    pub filename: String,
}

impl HeaderInfo {
    pub fn from_sheet(sheet: &Sheet, filename: &str) -> Self {
        HeaderInfo {
            project: extract_labeled(sheet, addr::PROJECT, "Product Code:"),
            description: extract_labeled(sheet, addr::DESCRIPTION, "Description:"),
            pcapn: extract_labeled(sheet, addr::PCA_PN, "PCA PN:"),
            version: extract_labeled(sheet, addr::VERSION, "BOM Version:"),
            phase: extract_labeled(sheet, addr::PHASE, "Phase:"),
            date: extract_labeled(sheet, addr::DATE, "Date:"),
            filename: filename.to_string(),
        }
    }
}

/// Read a label-prefixed cell: the trimmed text after the first occurrence of
/// `prefix`, the trimmed raw text when the prefix is absent, "" when blank.
pub fn extract_labeled(sheet: &Sheet, (row, col): (usize, usize), prefix: &str) -> String {
    let raw = sheet.text(row, col);
    if raw.is_empty() {
        return String::new();
    }
    match raw.find(prefix) {
        Some(idx) => raw[idx + prefix.len()..].trim().to_string(),
        None => raw.trim().to_string(),
    }
}
