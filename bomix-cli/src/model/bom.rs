//! BOM operations: upsert-by-triple, queries, statistics, deletion

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::spreadsheet::HeaderInfo;

use super::types::{Bom, FullBom, Statistics, normalize};
use super::BomDatabase;

impl BomDatabase {
    /// Look up a BOM by its identifying triple
    pub async fn find_existing_bom(
        &self,
        project: &str,
        phase: &str,
        version: &str,
    ) -> Result<Option<Bom>> {
        let pool = self.pool()?;
        let row = sqlx::query(BOM_SELECT_WHERE_TRIPLE)
            .bind(project.trim())
            .bind(phase.trim())
            .bind(version.trim())
            .fetch_optional(pool)
            .await
            .context("Failed to find existing BOM")?;
        row.map(|r| bom_from_row(&r)).transpose()
    }

    /// Create a BOM from parsed header metadata, or replace the one already
    /// stored under the same triple. Replacement keeps the row (and its
    /// creation time) but drops every group of the old BOM.
    pub async fn create_bom(&self, header: &HeaderInfo) -> Result<Bom> {
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;

        let project = header.project.trim();
        let phase = header.phase.trim();
        let version = header.version.trim();
        let now = Utc::now();
        // A BOM always carries a date; default to the import day
        let date = normalize(&header.date)
            .unwrap_or_else(|| now.format("%Y-%m-%d").to_string());

        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        let existing: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM boms WHERE project = ? AND phase = ? AND version = ?")
                .bind(project)
                .bind(phase)
                .bind(version)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to check for existing BOM")?;

        let id = match existing {
            Some((id,)) => {
                sqlx::query(
                    "UPDATE boms SET description = ?, pcapn = ?, date = ?, filename = ?,
                         updated_at = ?
                     WHERE id = ?",
                )
                .bind(normalize(&header.description))
                .bind(normalize(&header.pcapn))
                .bind(&date)
                .bind(normalize(&header.filename))
                .bind(now)
                .bind(id)
                .execute(&mut *tx)
                .await
                .context("Failed to update BOM")?;

                sqlx::query("DELETE FROM groups WHERE bom_id = ?")
                    .bind(id)
                    .execute(&mut *tx)
                    .await
                    .context("Failed to delete old groups")?;

                log::info!("BOM replaced: {project} {phase} {version}");
                id
            }
            None => {
                let result = sqlx::query(
                    "INSERT INTO boms (project, description, pcapn, version, phase, date,
                         filename, created_at, updated_at)
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(project)
                .bind(normalize(&header.description))
                .bind(normalize(&header.pcapn))
                .bind(version)
                .bind(phase)
                .bind(&date)
                .bind(normalize(&header.filename))
                .bind(now)
                .bind(now)
                .execute(&mut *tx)
                .await
                .context("Failed to create BOM")?;

                log::info!("BOM created: {project} {phase} {version}");
                result.last_insert_rowid()
            }
        };

        tx.commit().await.context("Failed to commit BOM write")?;

        self.bom_by_id(id)
            .await?
            .context("BOM row missing after write")
    }

    pub async fn bom_by_id(&self, id: i64) -> Result<Option<Bom>> {
        let pool = self.pool()?;
        let row = sqlx::query(BOM_SELECT_WHERE_ID)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to read BOM")?;
        row.map(|r| bom_from_row(&r)).transpose()
    }

    /// All stored BOMs, newest first
    pub async fn all_boms(&self) -> Result<Vec<Bom>> {
        let pool = self.pool()?;
        let rows = sqlx::query(BOM_SELECT_ALL)
            .fetch_all(pool)
            .await
            .context("Failed to list BOMs")?;
        rows.iter().map(bom_from_row).collect()
    }

    /// A BOM merged with all of its groups, order-independent
    pub async fn get_full_bom(&self, id: i64) -> Result<Option<FullBom>> {
        let Some(bom) = self.bom_by_id(id).await? else {
            return Ok(None);
        };
        let groups = self.groups_by_bom(id).await?;
        Ok(Some(FullBom { bom, groups }))
    }

    /// Distinct counts of projects, phases and identity triples
    pub async fn get_statistics(&self) -> Result<Statistics> {
        let pool = self.pool()?;
        let (project_count, phase_count, bom_count): (i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(DISTINCT project),
                    COUNT(DISTINCT phase),
                    COUNT(DISTINCT project || '_' || phase || '_' || version)
             FROM boms",
        )
        .fetch_one(pool)
        .await
        .context("Failed to compute statistics")?;

        Ok(Statistics {
            project_count,
            phase_count,
            bom_count,
        })
    }

    /// Delete BOMs and every group referencing them; returns the BOM count
    pub async fn delete_boms(&self, ids: &[i64]) -> Result<u64> {
        if ids.is_empty() {
            return Ok(0);
        }
        let pool = self.pool()?;
        let _guard = self.write_lock.lock().await;

        let placeholders = vec!["?"; ids.len()].join(", ");
        let groups_sql = format!("DELETE FROM groups WHERE bom_id IN ({placeholders})");
        let boms_sql = format!("DELETE FROM boms WHERE id IN ({placeholders})");
        let mut tx = pool.begin().await.context("Failed to begin transaction")?;

        let mut delete_groups = sqlx::query(&groups_sql);
        for id in ids {
            delete_groups = delete_groups.bind(id);
        }
        delete_groups
            .execute(&mut *tx)
            .await
            .context("Failed to delete groups")?;

        let mut delete_boms = sqlx::query(&boms_sql);
        for id in ids {
            delete_boms = delete_boms.bind(id);
        }
        let result = delete_boms
            .execute(&mut *tx)
            .await
            .context("Failed to delete BOMs")?;

        tx.commit().await.context("Failed to commit delete")?;

        let deleted = result.rows_affected();
        log::info!("Deleted {deleted} BOMs and their groups");
        Ok(deleted)
    }
}

const BOM_SELECT_WHERE_TRIPLE: &str =
    "SELECT id, project, description, pcapn, version, phase, date, filename, created_at, updated_at
     FROM boms WHERE project = ? AND phase = ? AND version = ?";

const BOM_SELECT_WHERE_ID: &str =
    "SELECT id, project, description, pcapn, version, phase, date, filename, created_at, updated_at
     FROM boms WHERE id = ?";

const BOM_SELECT_ALL: &str =
    "SELECT id, project, description, pcapn, version, phase, date, filename, created_at, updated_at
     FROM boms ORDER BY created_at DESC, id DESC";

fn bom_from_row(row: &SqliteRow) -> Result<Bom> {
    Ok(Bom {
        id: row.try_get("id")?,
        project: row.try_get("project")?,
        description: row.try_get("description")?,
        pcapn: row.try_get("pcapn")?,
        version: row.try_get("version")?,
        phase: row.try_get("phase")?,
        date: row.try_get("date")?,
        filename: row.try_get("filename")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
        updated_at: row.try_get::<DateTime<Utc>, _>("updated_at")?,
    })
}
