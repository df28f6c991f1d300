//! Typed errors for import and store operations
//!
//! Most fallible paths use `anyhow`; this enum covers the cases the import
//! batch driver has to tell apart (skip vs. warn vs. error) and the store's
//! contract violations. Recovered with `anyhow::Error::downcast_ref`.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BomError {
    /// Spreadsheet bytes could not be parsed as a workbook
    Read(String),
    /// Structural failure while detecting the BOM layout
    Classification(String),
    /// Group creation without exactly one main-source part
    MissingMainPart { process: String, item: String },
    /// Matrix import found no previously imported common BOM for the triple
    CommonBomNotFound {
        project: String,
        version: String,
        phase: String,
    },
    /// The user declined the duplicate-overwrite prompt
    UserCancelled,
    /// An operation that needs a store ran while none was open
    NoDatabaseOpen,
    /// The store handle was used after `close()`
    StoreClosed,
    /// A series update was missing a mandated field
    MissingRequiredField(&'static str),
}

impl fmt::Display for BomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BomError::Read(msg) => write!(f, "Failed to read workbook: {msg}"),
            BomError::Classification(msg) => {
                write!(f, "Failed to detect BOM layout: {msg}")
            }
            BomError::MissingMainPart { process, item } => write!(
                f,
                "Group {process}/{item} has no single main-source part"
            ),
            BomError::CommonBomNotFound {
                project,
                version,
                phase,
            } => write!(
                f,
                "No common BOM found for {project}_{phase}_{version}"
            ),
            BomError::UserCancelled => write!(f, "Import cancelled by user"),
            BomError::NoDatabaseOpen => write!(f, "No database is open"),
            BomError::StoreClosed => write!(f, "Database handle is closed"),
            BomError::MissingRequiredField(field) => {
                write!(f, "Missing required field: {field}")
            }
        }
    }
}

impl std::error::Error for BomError {}
