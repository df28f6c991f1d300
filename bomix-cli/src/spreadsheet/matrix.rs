//! Matrix-BOM parsing (8 fixed columns + N matrix columns + remark)
//!
//! A matrix workbook carries per-alternate approval flags for a BOM that was
//! already imported in the common layout. Each matrix column is one approved
//! variant slot; a "V" flag in a part row selects that part for the slot.
//! Merging into stored groups happens in the manager, keyed on
//! `{manufacturer}_{manufacturerPartNumber}`.

use anyhow::{Context, Result};

use super::header::HeaderInfo;
use super::workbook::{Sheet, Workbook};
use super::{DATA_START_ROW, PROCESS_SHEETS, PartDraft, join_key};

/// Column indices of the fixed 8-column prefix (A through H)
mod cols {
    pub const ITEM: usize = 0;
    pub const HOUSE_PN: usize = 1;
    pub const STD_PN: usize = 2;
    pub const DESCRIPTION: usize = 3;
    pub const MFG: usize = 4;
    pub const MFG_PN: usize = 5;
    pub const QTY: usize = 6;
    pub const LOCATION: usize = 7;
    /// First matrix column (K); the remark column trails the matrix block
    pub const MATRIX_START: usize = 10;
}

/// Matrix slot names live on row 4 (0-indexed row 3)
const MATRIX_NAME_ROW: usize = 3;

/// One parsed matrix-BOM workbook
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixBom {
    pub header: HeaderInfo,
    pub matrix_count: usize,
    pub groups: Vec<MatrixGroup>,
}

/// One item slot of the matrix sheet: its parts plus the per-slot selections
#[derive(Debug, Clone, PartialEq)]
pub struct MatrixGroup {
    pub process: String,
    pub item: String,
    pub qty: String,
    pub location: String,
    /// Join key of the representative (first) part row
    pub key: String,
    /// Selected alternate per matrix column; None = no selection
    pub matrix: Vec<Option<String>>,
    pub parts: Vec<PartDraft>,
}

pub fn parse_matrix_bom(workbook: &Workbook, filename: &str) -> Result<MatrixBom> {
    let smd = workbook
        .sheet("SMD")
        .context("matrix BOM workbook has no SMD sheet")?;
    let header = HeaderInfo::from_sheet(smd, filename);
    let matrix_count = matrix_count(smd);

    let mut groups = Vec::new();
    for name in PROCESS_SHEETS {
        // A matrix workbook may legitimately lack a process sheet
        let Some(sheet) = workbook.sheet(name) else {
            continue;
        };
        parse_matrix_sheet(sheet, matrix_count, &mut groups);
    }

    Ok(MatrixBom {
        header,
        matrix_count,
        groups,
    })
}

/// Count of matrix columns: consecutive non-blank name cells on row 4,
/// starting at column K
pub fn matrix_count(sheet: &Sheet) -> usize {
    let mut count = 0;
    while !sheet.cell(MATRIX_NAME_ROW, cols::MATRIX_START + count).is_blank() {
        count += 1;
    }
    count
}

fn parse_matrix_sheet(sheet: &Sheet, matrix_count: usize, groups: &mut Vec<MatrixGroup>) {
    let mut current: Option<MatrixGroup> = None;

    for row in DATA_START_ROW..=sheet.end_row() {
        let item = sheet.text(row, cols::ITEM);
        let hhpn = sheet.text(row, cols::HOUSE_PN);
        let mfg = sheet.text(row, cols::MFG);
        let mfgpn = sheet.text(row, cols::MFG_PN);
        if hhpn.is_empty() || mfgpn.is_empty() {
            continue;
        }

        if !item.is_empty() {
            if let Some(done) = current.take() {
                groups.push(done);
            }
            current = Some(MatrixGroup {
                process: sheet.name().to_string(),
                item,
                qty: sheet.text(row, cols::QTY),
                location: sheet.text(row, cols::LOCATION),
                key: join_key(&mfg, &mfgpn),
                matrix: vec![None; matrix_count],
                parts: Vec::new(),
            });
        }

        let Some(group) = current.as_mut() else {
            continue;
        };

        group.parts.push(PartDraft {
            hhpn,
            stdpn: sheet.text(row, cols::STD_PN),
            description: sheet.text(row, cols::DESCRIPTION),
            mfg: mfg.clone(),
            mfgpn: mfgpn.clone(),
            qty: sheet.text(row, cols::QTY),
            location: sheet.text(row, cols::LOCATION),
            remark: sheet.text(row, cols::MATRIX_START + matrix_count),
            ..PartDraft::default()
        });

        for slot in 0..matrix_count {
            let flag = sheet.text(row, cols::MATRIX_START + slot);
            if flag.eq_ignore_ascii_case("v") {
                group.matrix[slot] = Some(join_key(&mfg, &mfgpn));
            }
        }
    }

    if let Some(done) = current.take() {
        groups.push(done);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spreadsheet::workbook::CellValue;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn cell(s: &str) -> CellValue {
        if s.is_empty() {
            CellValue::Blank
        } else {
            text(s)
        }
    }

    /// Data row: 8 fixed columns, 2 spacer columns, flags, then remark
    fn matrix_row(fixed: [&str; 8], flags: &[&str], remark: &str) -> Vec<CellValue> {
        let mut row: Vec<CellValue> = fixed.iter().map(|s| cell(s)).collect();
        row.push(CellValue::Blank);
        row.push(CellValue::Blank);
        row.extend(flags.iter().map(|s| cell(s)));
        row.push(cell(remark));
        row
    }

    /// Sheet with `slots` matrix columns named on row 4 and the given data
    fn matrix_sheet(name: &str, slots: usize, data: Vec<Vec<CellValue>>) -> Sheet {
        let mut name_row = vec![CellValue::Blank; cols::MATRIX_START];
        for i in 0..slots {
            name_row.push(text(&format!("M{i}")));
        }
        let mut rows = vec![vec![], vec![], vec![], name_row, vec![]];
        rows.extend(data);
        Sheet::from_rows(name, rows)
    }

    #[test]
    fn test_matrix_count_stops_at_first_blank() {
        let sheet = matrix_sheet("SMD", 3, vec![]);
        assert_eq!(matrix_count(&sheet), 3);
        assert_eq!(matrix_count(&Sheet::from_rows("SMD", vec![])), 0);
    }

    #[test]
    fn test_v_flag_selects_row_key_for_slot() {
        let sheet = matrix_sheet(
            "SMD",
            3,
            vec![
                matrix_row(
                    ["C1", "H1", "S1", "Cap", "ACME", "X1", "4", "C101"],
                    &["V", "", ""],
                    "",
                ),
                matrix_row(
                    ["", "H2", "S2", "Cap", "BETA", "Y9", "", ""],
                    &["", "", "V"],
                    "second source",
                ),
            ],
        );
        let workbook = Workbook::from_sheets(vec![sheet]);

        let parsed = parse_matrix_bom(&workbook, "m.xlsx").unwrap();
        assert_eq!(parsed.matrix_count, 3);
        assert_eq!(parsed.groups.len(), 1);

        let group = &parsed.groups[0];
        assert_eq!(group.key, "ACME_X1");
        assert_eq!(group.matrix[0].as_deref(), Some("ACME_X1"));
        assert_eq!(group.matrix[1], None);
        assert_eq!(group.matrix[2].as_deref(), Some("BETA_Y9"));
        assert_eq!(group.parts.len(), 2);
        assert_eq!(group.parts[1].remark, "second source");
    }

    #[test]
    fn test_lowercase_flag_is_accepted() {
        let sheet = matrix_sheet(
            "SMD",
            1,
            vec![matrix_row(
                ["C1", "H1", "", "", "ACME", "X1", "1", ""],
                &["v"],
                "",
            )],
        );
        let parsed =
            parse_matrix_bom(&Workbook::from_sheets(vec![sheet]), "m.xlsx").unwrap();
        assert_eq!(parsed.groups[0].matrix[0].as_deref(), Some("ACME_X1"));
    }

    #[test]
    fn test_non_flag_text_selects_nothing() {
        let sheet = matrix_sheet(
            "SMD",
            2,
            vec![matrix_row(
                ["C1", "H1", "", "", "ACME", "X1", "1", ""],
                &["x", "VV"],
                "",
            )],
        );
        let parsed =
            parse_matrix_bom(&Workbook::from_sheets(vec![sheet]), "m.xlsx").unwrap();
        assert_eq!(parsed.groups[0].matrix, vec![None, None]);
    }

    #[test]
    fn test_groups_flush_per_sheet_and_missing_sheets_are_skipped() {
        let smd = matrix_sheet(
            "SMD",
            1,
            vec![
                matrix_row(["C1", "H1", "", "", "ACME", "X1", "1", ""], &[""], ""),
                matrix_row(["C2", "H2", "", "", "BETA", "Y2", "2", ""], &[""], ""),
            ],
        );
        let pth = matrix_sheet(
            "PTH",
            1,
            vec![matrix_row(
                ["J1", "H3", "", "", "MOLEX", "Z3", "1", ""],
                &[""],
                "",
            )],
        );
        // No BOTTOM sheet
        let parsed =
            parse_matrix_bom(&Workbook::from_sheets(vec![smd, pth]), "m.xlsx").unwrap();

        let keys: Vec<&str> = parsed.groups.iter().map(|g| g.key.as_str()).collect();
        assert_eq!(keys, vec!["ACME_X1", "BETA_Y2", "MOLEX_Z3"]);
        assert_eq!(parsed.groups[2].process, "PTH");
    }

    #[test]
    fn test_rows_missing_part_numbers_are_skipped() {
        let sheet = matrix_sheet(
            "SMD",
            1,
            vec![
                matrix_row(["C1", "H1", "", "", "ACME", "X1", "1", ""], &[""], ""),
                matrix_row(["", "", "", "", "ACME", "X2", "", ""], &["V"], ""),
            ],
        );
        let parsed =
            parse_matrix_bom(&Workbook::from_sheets(vec![sheet]), "m.xlsx").unwrap();
        assert_eq!(parsed.groups[0].parts.len(), 1);
        assert_eq!(parsed.groups[0].matrix[0], None);
    }

    #[test]
    fn test_later_flagged_row_overwrites_slot() {
        let sheet = matrix_sheet(
            "SMD",
            1,
            vec![
                matrix_row(["C1", "H1", "", "", "ACME", "X1", "1", ""], &["V"], ""),
                matrix_row(["", "H2", "", "", "BETA", "Y2", "", ""], &["V"], ""),
            ],
        );
        let parsed =
            parse_matrix_bom(&Workbook::from_sheets(vec![sheet]), "m.xlsx").unwrap();
        assert_eq!(parsed.groups[0].matrix[0].as_deref(), Some("BETA_Y2"));
    }
}
