//! Common-BOM parsing (fixed 13-column layout)
//!
//! Walks the SMD, PTH and BOTTOM sheets row by row. A row with a non-blank
//! item column opens a new group and becomes its main-source part; item-less
//! rows append alternate parts to the open group. A row missing both its
//! house part number or its manufacturer part number carries no usable part
//! and is skipped.

use anyhow::{Context, Result};

use super::header::HeaderInfo;
use super::workbook::{Sheet, Workbook};
use super::{DATA_START_ROW, GroupDraft, PROCESS_SHEETS, PartDraft};

/// Column indices of the 13-column layout (A through M)
mod cols {
    pub const ITEM: usize = 0;
    pub const HOUSE_PN: usize = 1;
    pub const STD_PN: usize = 2;
    pub const GROUP_PN: usize = 3;
    pub const DESCRIPTION: usize = 4;
    pub const MFG: usize = 5;
    pub const MFG_PN: usize = 6;
    pub const QTY: usize = 7;
    pub const LOCATION: usize = 8;
    pub const CCL: usize = 9;
    pub const LEAD_TIME: usize = 10;
    pub const REMARK: usize = 11;
    pub const APPROVAL: usize = 12;
}

/// One parsed common-BOM workbook: header metadata plus its groups in sheet
/// order, imported as a single atomic unit
#[derive(Debug, Clone, PartialEq)]
pub struct CommonBom {
    pub header: HeaderInfo,
    pub groups: Vec<GroupDraft>,
}

pub fn parse_common_bom(workbook: &Workbook, filename: &str) -> Result<CommonBom> {
    let smd = workbook
        .sheet("SMD")
        .context("common BOM workbook has no SMD sheet")?;
    let header = HeaderInfo::from_sheet(smd, filename);

    let mut groups = Vec::new();
    for name in PROCESS_SHEETS {
        let sheet = workbook
            .sheet(name)
            .with_context(|| format!("common BOM workbook has no {name} sheet"))?;
        parse_process_sheet(sheet, &mut groups);
    }

    Ok(CommonBom { header, groups })
}

fn parse_process_sheet(sheet: &Sheet, groups: &mut Vec<GroupDraft>) {
    let mut current: Option<GroupDraft> = None;

    for row in DATA_START_ROW..=sheet.end_row() {
        let record = read_row(sheet, row);
        if record.hhpn.is_empty() || record.mfgpn.is_empty() {
            continue;
        }

        if !record.item.is_empty() {
            if let Some(done) = current.take() {
                groups.push(done);
            }
            current = Some(start_group(sheet.name(), record));
        } else if let Some(group) = current.as_mut() {
            group.parts.push(record.into_part(false));
        }
        // item-less row with no open group: stray continuation, dropped
    }

    if let Some(done) = current.take() {
        groups.push(done);
    }
}

/// The 13 fixed columns of one data row
struct RowRecord {
    item: String,
    hhpn: String,
    stdpn: String,
    grppn: String,
    description: String,
    mfg: String,
    mfgpn: String,
    qty: String,
    location: String,
    ccl: String,
    leadtime: String,
    remark: String,
    approval: String,
}

fn read_row(sheet: &Sheet, row: usize) -> RowRecord {
    RowRecord {
        item: sheet.text(row, cols::ITEM),
        hhpn: sheet.text(row, cols::HOUSE_PN),
        stdpn: sheet.text(row, cols::STD_PN),
        grppn: sheet.text(row, cols::GROUP_PN),
        description: sheet.text(row, cols::DESCRIPTION),
        mfg: sheet.text(row, cols::MFG),
        mfgpn: sheet.text(row, cols::MFG_PN),
        qty: sheet.text(row, cols::QTY),
        location: sheet.text(row, cols::LOCATION),
        ccl: sheet.text(row, cols::CCL),
        leadtime: sheet.text(row, cols::LEAD_TIME),
        remark: sheet.text(row, cols::REMARK),
        approval: sheet.text(row, cols::APPROVAL),
    }
}

/// New group seeded from an item row; the row itself is the main source
fn start_group(process: &str, record: RowRecord) -> GroupDraft {
    GroupDraft {
        process: process.to_string(),
        item: record.item.clone(),
        qty: record.qty.clone(),
        location: record.location.clone(),
        ccl: record.ccl.clone(),
        parts: vec![record.into_part(true)],
    }
}

impl RowRecord {
    fn into_part(self, is_main: bool) -> PartDraft {
        PartDraft {
            hhpn: self.hhpn,
            stdpn: self.stdpn,
            grppn: self.grppn,
            description: self.description,
            mfg: self.mfg,
            mfgpn: self.mfgpn,
            qty: self.qty,
            location: self.location,
            ccl: self.ccl,
            leadtime: self.leadtime,
            remark: self.remark,
            approval: self.approval,
            is_main,
        }
    }
}
