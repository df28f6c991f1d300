//! Spreadsheet ingestion: workbook model, layout detection, BOM parsers

pub mod common;
pub mod detect;
pub mod header;
pub mod matrix;
pub mod workbook;

pub use common::{CommonBom, parse_common_bom};
pub use detect::{BomType, detect_bom_type};
pub use header::HeaderInfo;
pub use matrix::{MatrixBom, MatrixGroup, parse_matrix_bom};
pub use workbook::{CellValue, Sheet, Workbook};

/// Process sheets walked by both parsers, in import order
pub const PROCESS_SHEETS: [&str; 3] = ["SMD", "PTH", "BOTTOM"];

/// Data rows start below the 5-row sheet header
pub const DATA_START_ROW: usize = 5;

/// One placed-item slot parsed from a BOM sheet, before persistence
#[derive(Debug, Clone, PartialEq)]
pub struct GroupDraft {
    pub process: String,
    pub item: String,
    pub qty: String,
    pub location: String,
    pub ccl: String,
    pub parts: Vec<PartDraft>,
}

/// One candidate-part row belonging to a group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PartDraft {
    pub hhpn: String,
    pub stdpn: String,
    pub grppn: String,
    pub description: String,
    pub mfg: String,
    pub mfgpn: String,
    pub qty: String,
    pub location: String,
    pub ccl: String,
    pub leadtime: String,
    pub remark: String,
    pub approval: String,
    pub is_main: bool,
}

/// Join key correlating matrix selections back to common-BOM groups
pub fn join_key(mfg: &str, mfgpn: &str) -> String {
    format!("{}_{}", mfg.trim(), mfgpn.trim())
}
