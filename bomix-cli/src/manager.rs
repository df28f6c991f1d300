//! Import orchestration and active-store lifecycle
//!
//! `BomManager` owns the single active `BomDatabase` handle. Batch import
//! classifies every file first, then processes all common BOMs before any
//! matrix BOM — a matrix import only annotates groups that a prior common
//! import created. Each file's outcome lands in the session log; one file's
//! failure never aborts its siblings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::error::BomError;
use crate::model::BomDatabase;
use crate::session::{LogEntry, SessionLog};
use crate::spreadsheet::{
    BomType, Workbook, detect_bom_type, parse_common_bom, parse_matrix_bom,
};

/// Identifying details surfaced to the duplicate-overwrite prompt
#[derive(Debug, Clone)]
pub struct DuplicateBom {
    pub project: String,
    pub version: String,
    pub phase: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// External yes/no collaborator deciding duplicate overwrites
#[async_trait]
pub trait OverwriteConfirm: Send + Sync {
    /// true = overwrite the stored BOM, false = keep it
    async fn confirm_overwrite(&self, duplicate: &DuplicateBom) -> Result<bool>;
}

pub struct BomManager {
    current: Option<BomDatabase>,
    confirm: Box<dyn OverwriteConfirm>,
}

impl BomManager {
    pub fn new(confirm: Box<dyn OverwriteConfirm>) -> Self {
        BomManager {
            current: None,
            confirm,
        }
    }

    pub fn current_database(&self) -> Option<&BomDatabase> {
        self.current.as_ref()
    }

    fn require_database(&self) -> Result<&BomDatabase, BomError> {
        self.current.as_ref().ok_or(BomError::NoDatabaseOpen)
    }

    /// Create a fresh series database. Any open store is closed first.
    pub async fn init_database(
        &mut self,
        path: &Path,
        name: &str,
        note: &str,
    ) -> Result<&BomDatabase> {
        self.close_current_database().await?;
        let db = BomDatabase::create(path).await?;
        db.init_series(name, note).await?;
        log::info!("Database initialized: {}", path.display());
        Ok(self.current.insert(db))
    }

    /// Open an existing series database. Any open store is closed first.
    pub async fn open_database(&mut self, path: &Path) -> Result<&BomDatabase> {
        self.close_current_database().await?;
        let db = BomDatabase::open(path).await?;
        if db.series_info().await?.is_none() {
            db.close().await.ok();
            bail!("Invalid database format: {} has no series record", path.display());
        }
        log::info!("Database opened: {}", path.display());
        Ok(self.current.insert(db))
    }

    /// Open `path` when it exists, initialize a new series there otherwise
    pub async fn select_or_create_database(
        &mut self,
        path: &Path,
        name: &str,
        note: &str,
    ) -> Result<&BomDatabase> {
        if path.exists() {
            self.open_database(path).await
        } else {
            self.init_database(path, name, note).await
        }
    }

    pub async fn close_current_database(&mut self) -> Result<()> {
        if let Some(db) = self.current.take() {
            db.close().await?;
        }
        Ok(())
    }

    /// Import a batch of workbook files. Every file is classified up front,
    /// then all common BOMs import before any matrix BOM. Returns one log
    /// entry per file.
    pub async fn import_many(&self, files: &[PathBuf]) -> Result<Vec<LogEntry>> {
        let db = self.require_database()?;
        let mut session = SessionLog::new();

        // Independent reads: classify everything concurrently
        let classified = join_all(files.iter().map(|path| classify_file(path))).await;

        let mut commons = Vec::new();
        let mut matrices = Vec::new();
        for (path, outcome) in files.iter().zip(classified) {
            let filename = display_name(path);
            match outcome {
                Ok((workbook, BomType::Common)) => commons.push((filename, workbook)),
                Ok((workbook, BomType::Matrix)) => matrices.push((filename, workbook)),
                Ok((_, BomType::Unknown)) => {
                    session.warning(format!("Unsupported BOM layout: {filename}"));
                }
                Err(e) => {
                    log::error!("Classification failed for {filename}: {e:#}");
                    session.error(format!("Failed to inspect file type: {filename} - {e:#}"));
                }
            }
        }

        for (filename, workbook) in &commons {
            match self.import_common(db, workbook, filename).await {
                Ok(()) => session.info(format!("Imported common BOM: {filename}")),
                Err(e) => match e.downcast_ref::<BomError>() {
                    Some(BomError::UserCancelled) => {
                        session.warning(format!("Duplicate common BOM skipped: {filename}"));
                    }
                    _ => {
                        log::error!("Common BOM import failed for {filename}: {e:#}");
                        session.error(format!("Failed to import common BOM: {filename} - {e:#}"));
                    }
                },
            }
        }

        for (filename, workbook) in &matrices {
            match self.import_matrix(db, workbook, filename).await {
                Ok(()) => session.info(format!("Imported matrix BOM: {filename}")),
                Err(e) => match e.downcast_ref::<BomError>() {
                    Some(BomError::CommonBomNotFound {
                        project,
                        version,
                        phase,
                    }) => {
                        session.warning(format!(
                            "Failed to import matrix BOM: {filename} - no common BOM for \
                             {project}_{phase}_{version}; import the common BOM first"
                        ));
                    }
                    _ => {
                        log::error!("Matrix BOM import failed for {filename}: {e:#}");
                        session.error(format!("Failed to import matrix BOM: {filename} - {e:#}"));
                    }
                },
            }
        }

        Ok(session.into_entries())
    }

    /// Parse and store one common BOM, prompting before an overwrite
    async fn import_common(
        &self,
        db: &BomDatabase,
        workbook: &Workbook,
        filename: &str,
    ) -> Result<()> {
        let parsed = parse_common_bom(workbook, filename)?;
        let header = &parsed.header;

        if let Some(existing) = db
            .find_existing_bom(&header.project, &header.phase, &header.version)
            .await?
        {
            let duplicate = DuplicateBom {
                project: existing.project.clone(),
                version: existing.version.clone(),
                phase: existing.phase.clone(),
                description: existing.description.clone(),
                created_at: existing.created_at,
                updated_at: existing.updated_at,
            };
            if !self.confirm.confirm_overwrite(&duplicate).await? {
                log::warn!("User declined overwrite of {filename}");
                return Err(BomError::UserCancelled.into());
            }
        }

        let bom = db.create_bom(header).await?;
        for draft in &parsed.groups {
            db.create_group(bom.id, draft).await?;
        }
        Ok(())
    }

    /// Parse one matrix BOM and merge its selections onto the stored groups
    /// of the matching common BOM
    async fn import_matrix(
        &self,
        db: &BomDatabase,
        workbook: &Workbook,
        filename: &str,
    ) -> Result<()> {
        let parsed = parse_matrix_bom(workbook, filename)?;
        let header = &parsed.header;

        let Some(bom) = db
            .find_existing_bom(&header.project, &header.phase, &header.version)
            .await?
        else {
            return Err(BomError::CommonBomNotFound {
                project: header.project.trim().to_string(),
                version: header.version.trim().to_string(),
                phase: header.phase.trim().to_string(),
            }
            .into());
        };

        let existing = db.groups_by_bom(bom.id).await?;
        for matrix_group in &parsed.groups {
            let matching: Vec<_> = existing
                .iter()
                .filter(|g| g.mfgpn_key == matrix_group.key)
                .collect();
            if matching.is_empty() {
                // The part may legitimately be absent from the common import
                log::warn!("No stored group matches matrix key {}", matrix_group.key);
                continue;
            }
            for group in &matching {
                db.update_group_matrix(group.id, &matrix_group.matrix).await?;
            }
            log::debug!(
                "Updated matrix on {} groups with key {}",
                matching.len(),
                matrix_group.key
            );
        }
        Ok(())
    }
}

/// Read and classify one workbook file
async fn classify_file(path: &Path) -> Result<(Workbook, BomType)> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let workbook = Workbook::from_bytes(&bytes)?;
    let bom_type = detect_bom_type(&workbook)?;
    Ok((workbook, bom_type))
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::LogLevel;
    use crate::spreadsheet::workbook::{CellValue, Sheet};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubConfirm {
        answer: bool,
        asked: Arc<AtomicUsize>,
    }

    impl StubConfirm {
        fn new(answer: bool) -> Self {
            StubConfirm {
                answer,
                asked: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl OverwriteConfirm for StubConfirm {
        async fn confirm_overwrite(&self, _duplicate: &DuplicateBom) -> Result<bool> {
            self.asked.fetch_add(1, Ordering::Relaxed);
            Ok(self.answer)
        }
    }

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

    fn header_rows() -> Vec<Vec<CellValue>> {
        vec![
            vec![],
            vec![],
            vec![
                CellValue::Blank,
                text("Product Code: PRJX"),
                CellValue::Blank,
                CellValue::Blank,
                CellValue::Blank,
                CellValue::Blank,
                CellValue::Blank,
                text("BOM Version: A1"),
                CellValue::Blank,
                text("Phase: EVT"),
            ],
            vec![
                CellValue::Blank,
                text("Description: Mainboard"),
                CellValue::Blank,
                CellValue::Blank,
                CellValue::Blank,
                text("PCA PN: 715-00021"),
                CellValue::Blank,
                text("Date: 2025-03-14"),
            ],
            vec![],
        ]
    }

    fn common_sheet(name: &str, data: Vec<[&str; 13]>) -> Sheet {
        let mut rows = header_rows();
        for record in data {
            rows.push(record.iter().map(|s| cell(s)).collect());
        }
        Sheet::from_rows(name, rows)
    }

    fn common_workbook() -> Workbook {
        Workbook::from_sheets(vec![
            common_sheet(
                "SMD",
                vec![
                    [
                        "R1", "H1", "", "", "Res", "ACME", "X1", "2", "R101", "A", "", "",
                        "",
                    ],
                    ["", "H2", "", "", "Res", "BETA", "Y9", "", "", "", "", "", ""],
                ],
            ),
            common_sheet(
                "PTH",
                vec![[
                    "J1", "H3", "", "", "Conn", "MOLEX", "Z3", "1", "J7", "B", "", "", "",
                ]],
            ),
            common_sheet("BOTTOM", vec![]),
        ])
    }

    /// Matrix workbook flagging slot 2 for BETA/Y9 under item C1 (key ACME_X1)
    fn matrix_workbook() -> Workbook {
        let mut rows = header_rows();
        // Matrix slot names share row 4 with the description header cells
        rows[3].resize(10, CellValue::Blank);
        rows[3].extend([text("M0"), text("M1"), text("M2")]);
        let data = [
            ["C1", "H1", "", "Res", "ACME", "X1", "2", "R101"],
            ["", "H2", "", "Res", "BETA", "Y9", "", ""],
            // An item the common import never carried
            ["C2", "H9", "", "Res", "NOPE", "Q9", "1", ""],
        ];
        let flags = [["", "", ""], ["", "", "V"], ["V", "", ""]];
        for (fixed, flag_row) in data.iter().zip(flags) {
            let mut row: Vec<CellValue> = fixed.iter().map(|s| cell(s)).collect();
            row.push(CellValue::Blank);
            row.push(CellValue::Blank);
            row.extend(flag_row.iter().map(|s| cell(s)));
            row.push(CellValue::Blank); // remark
            rows.push(row);
        }
        Workbook::from_sheets(vec![Sheet::from_rows("SMD", rows)])
    }

    async fn manager_with_db(tag: &str, answer: bool) -> BomManager {
        let mut manager = BomManager::new(Box::new(StubConfirm::new(answer)));
        let path = crate::model::testutil::scratch_path(tag);
        manager.init_database(&path, "test series", "").await.unwrap();
        manager
    }

    #[tokio::test]
    async fn test_import_requires_open_database() {
        let manager = BomManager::new(Box::new(StubConfirm::new(true)));
        let err = manager.import_many(&[]).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<BomError>(),
            Some(&BomError::NoDatabaseOpen)
        );
    }

    #[tokio::test]
    async fn test_unreadable_file_yields_error_entry_not_failure() {
        let mut manager = manager_with_db("mgr-unreadable", true).await;
        let missing = crate::model::testutil::scratch_path("no-such-workbook");
        let entries = manager.import_many(&[missing]).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].level, LogLevel::Error);
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_import_common_stores_bom_and_groups() {
        let mut manager = manager_with_db("mgr-common", true).await;
        let db = manager.current_database().unwrap();

        manager
            .import_common(db, &common_workbook(), "board.xlsx")
            .await
            .unwrap();

        let boms = db.all_boms().await.unwrap();
        assert_eq!(boms.len(), 1);
        assert_eq!(boms[0].project, "PRJX");
        assert_eq!(boms[0].phase, "EVT");
        assert_eq!(boms[0].version, "A1");

        let groups = db.groups_by_bom(boms[0].id).await.unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].mfgpn_key, "ACME_X1");
        assert_eq!(groups[0].parts.len(), 2);
        assert_eq!(groups[1].mfgpn_key, "MOLEX_Z3");
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_declined_overwrite_leaves_stored_bom_untouched() {
        let confirm = StubConfirm::new(false);
        let asked = confirm.asked.clone();
        let mut manager = BomManager::new(Box::new(confirm));
        let path = crate::model::testutil::scratch_path("mgr-cancel");
        manager.init_database(&path, "test series", "").await.unwrap();
        let db = manager.current_database().unwrap();

        manager
            .import_common(db, &common_workbook(), "board.xlsx")
            .await
            .unwrap();
        let before = db.all_boms().await.unwrap();
        let groups_before = db.groups_by_bom(before[0].id).await.unwrap();

        let err = manager
            .import_common(db, &common_workbook(), "board-v2.xlsx")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BomError>(),
            Some(&BomError::UserCancelled)
        );

        let after = db.all_boms().await.unwrap();
        assert_eq!(after, before);
        assert_eq!(
            db.groups_by_bom(after[0].id).await.unwrap(),
            groups_before
        );
        // First import saw no duplicate, second one prompted exactly once
        assert_eq!(asked.load(Ordering::Relaxed), 1);
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_confirmed_overwrite_replaces_bom() {
        let mut manager = manager_with_db("mgr-overwrite", true).await;
        let db = manager.current_database().unwrap();

        manager
            .import_common(db, &common_workbook(), "board.xlsx")
            .await
            .unwrap();
        manager
            .import_common(db, &common_workbook(), "board-v2.xlsx")
            .await
            .unwrap();

        let boms = db.all_boms().await.unwrap();
        assert_eq!(boms.len(), 1);
        assert_eq!(boms[0].filename.as_deref(), Some("board-v2.xlsx"));
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_matrix_without_common_fails_with_triple_and_writes_nothing() {
        let mut manager = manager_with_db("mgr-nocommon", true).await;
        let db = manager.current_database().unwrap();

        let err = manager
            .import_matrix(db, &matrix_workbook(), "matrix.xlsx")
            .await
            .unwrap_err();
        assert_eq!(
            err.downcast_ref::<BomError>(),
            Some(&BomError::CommonBomNotFound {
                project: "PRJX".to_string(),
                version: "A1".to_string(),
                phase: "EVT".to_string(),
            })
        );
        assert!(db.all_boms().await.unwrap().is_empty());
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_matrix_merge_updates_matching_groups_only() {
        let mut manager = manager_with_db("mgr-merge", true).await;
        let db = manager.current_database().unwrap();

        manager
            .import_common(db, &common_workbook(), "board.xlsx")
            .await
            .unwrap();
        manager
            .import_matrix(db, &matrix_workbook(), "matrix.xlsx")
            .await
            .unwrap();

        let boms = db.all_boms().await.unwrap();
        let groups = db.groups_by_bom(boms[0].id).await.unwrap();

        // ACME_X1 matched the matrix group: slot 2 selects BETA_Y9
        let updated = groups.iter().find(|g| g.mfgpn_key == "ACME_X1").unwrap();
        let matrix = updated.matrix.as_ref().expect("matrix stored");
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix[2].as_deref(), Some("BETA_Y9"));

        // MOLEX_Z3 had no matrix counterpart and stays untouched; the matrix
        // group NOPE_Q9 matched no stored group and raised no error
        let untouched = groups.iter().find(|g| g.mfgpn_key == "MOLEX_Z3").unwrap();
        assert_eq!(untouched.matrix, None);
        assert!(groups.iter().all(|g| g.mfgpn_key != "NOPE_Q9"));
        manager.close_current_database().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_database_validates_series_record() {
        let path = crate::model::testutil::scratch_path("mgr-invalid");
        // A store file with schema but no series row
        let db = BomDatabase::create(&path).await.unwrap();
        db.close().await.unwrap();

        let mut manager = BomManager::new(Box::new(StubConfirm::new(true)));
        assert!(manager.open_database(&path).await.is_err());
        assert!(manager.current_database().is_none());
    }

    #[tokio::test]
    async fn test_reopening_closes_previous_store() {
        let mut manager = BomManager::new(Box::new(StubConfirm::new(true)));
        let first = crate::model::testutil::scratch_path("mgr-first");
        let second = crate::model::testutil::scratch_path("mgr-second");

        manager.init_database(&first, "one", "").await.unwrap();
        manager.init_database(&second, "two", "").await.unwrap();

        let series = manager
            .current_database()
            .unwrap()
            .series_info()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(series.name.as_deref(), Some("two"));

        // select-or-create on an existing file opens it
        manager
            .select_or_create_database(&first, "ignored", "")
            .await
            .unwrap();
        let series = manager
            .current_database()
            .unwrap()
            .series_info()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(series.name.as_deref(), Some("one"));
        manager.close_current_database().await.unwrap();
    }
}
