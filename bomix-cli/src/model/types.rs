//! Persisted document types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::spreadsheet::PartDraft;

/// Per-kind lists of the BOM ids chosen for the series
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedBoms {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub common: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<i64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bccl: Option<Vec<i64>>,
}

/// Mutable series-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    #[serde(default)]
    pub selected_boms: SelectedBoms,
}

/// The one series record a store holds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Series {
    pub name: Option<String>,
    pub note: Option<String>,
    /// Path of the store file the series lives in
    pub path: Option<String>,
    /// File stem of `path`
    pub filename: Option<String>,
    pub config: SeriesConfig,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One versioned, phased parts list. Identified by (project, phase, version).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Bom {
    pub id: i64,
    pub project: String,
    pub description: Option<String>,
    pub pcapn: Option<String>,
    pub version: String,
    pub phase: String,
    pub date: Option<String>,
    /// Filename of the workbook the BOM was imported from
    pub filename: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A candidate part embedded in a group. Blank fields are omitted from the
/// stored JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hhpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grppn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mfgpn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ccl: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub leadtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remark: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approval: Option<String>,
    #[serde(default)]
    pub is_main: bool,
}

impl Part {
    pub fn from_draft(draft: &PartDraft) -> Self {
        Part {
            hhpn: normalize(&draft.hhpn),
            stdpn: normalize(&draft.stdpn),
            grppn: normalize(&draft.grppn),
            description: normalize(&draft.description),
            mfg: normalize(&draft.mfg),
            mfgpn: normalize(&draft.mfgpn),
            qty: normalize(&draft.qty),
            location: normalize(&draft.location),
            ccl: normalize(&draft.ccl),
            leadtime: normalize(&draft.leadtime),
            remark: normalize(&draft.remark),
            approval: normalize(&draft.approval),
            is_main: draft.is_main,
        }
    }
}

/// One placed-item slot of a BOM with its candidate parts
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Group {
    pub id: i64,
    pub bom_id: i64,
    pub process: Option<String>,
    pub item: Option<String>,
    pub qty: Option<String>,
    pub location: Option<String>,
    pub ccl: Option<String>,
    /// `{manufacturer}_{manufacturerPartNumber}` of the main part
    pub mfgpn_key: String,
    pub parts: Vec<Part>,
    /// Selected alternate per matrix slot; None when no matrix was imported
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matrix: Option<Vec<Option<String>>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A BOM merged with all of its groups
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FullBom {
    #[serde(flatten)]
    pub bom: Bom,
    pub groups: Vec<Group>,
}

/// Distinct counts across the stored BOMs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Statistics {
    pub project_count: i64,
    pub phase_count: i64,
    pub bom_count: i64,
}

/// Blank-string normalization: trimmed non-empty text or absent. "0" survives.
pub fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
